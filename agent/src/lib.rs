pub mod callbacks;
mod error;
pub mod llm;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
