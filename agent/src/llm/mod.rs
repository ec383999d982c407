use crate::Result;
use async_trait::async_trait;
use schemars::{JsonSchema, schema_for};

mod openai;
pub use openai::OpenAI;

#[derive(Clone)]
pub enum Message {
    System(String),
    User(String),
    Assistant(String),
}

impl Message {
    pub fn role(&self) -> &'static str {
        match self {
            Message::System(_) => "system",
            Message::User(_) => "user",
            Message::Assistant(_) => "assistant",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::System(content) => content,
            Message::User(content) => content,
            Message::Assistant(content) => content,
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "**{}**:\n\n{}\n\n", self.role(), self.content())
    }
}

/// A json schema the model's response must conform to, generated from a rust
/// type via schemars.
pub struct OutputSchema {
    pub name: String,
    pub desc: String,
    pub schema: serde_json::Value,
}

impl OutputSchema {
    pub fn new<P: JsonSchema>(name: &str, desc: &str) -> Result<Self> {
        let schema = schema_for!(P);
        let schema = serde_json::to_value(&schema.schema)?;
        Ok(Self {
            name: name.to_string(),
            desc: desc.to_string(),
            schema,
        })
    }
}

pub struct CompletionRequest<'a> {
    pub messages: &'a [Message],
    pub schema: Option<&'a OutputSchema>,
    pub temperature: Option<f32>,
}

pub struct CompletionResponse {
    pub content: String,
}

#[async_trait]
pub trait LLM {
    async fn completion<'a>(&self, request: CompletionRequest<'a>) -> Result<CompletionResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(schemars::JsonSchema)]
    #[allow(dead_code)]
    struct Shape {
        sides: Vec<String>,
    }

    #[test]
    fn test_output_schema() -> Result<()> {
        let schema = OutputSchema::new::<Shape>("shape", "a shape")?;

        assert_eq!(schema.name, "shape");
        assert_eq!(schema.schema["properties"]["sides"]["type"], "array");

        Ok(())
    }

    #[test]
    fn test_message_display() {
        let msg = Message::User("what is a monad".to_string());
        assert_eq!(msg.to_string(), "**user**:\n\nwhat is a monad\n\n");
    }
}
