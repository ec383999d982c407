mod pipeline;
mod state;

use agent::Result;
use agent::callbacks::TranscriptLogger;
use clap::Parser;

#[derive(Parser)]
#[command(about = "Answer a question by planning, researching, drafting, and critiquing with an llm")]
struct Args {
    /// The question to answer.
    question: String,

    /// Chat completion model to use.
    #[arg(long, default_value = "gpt-4o")]
    model: String,

    /// Cap on writer passes before the current draft is accepted as-is.
    #[arg(long, default_value_t = 3)]
    max_iterations: u32,

    /// Critique score (0-100) at which the draft is accepted.
    #[arg(long, default_value_t = 80)]
    score_threshold: u8,

    /// Write a markdown transcript of every llm exchange to this file.
    #[arg(long)]
    log: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let llm = agent::llm::OpenAI::new(args.model);

    let mut builder = pipeline::PipelineBuilder::new()
        .llm(llm)
        .max_iterations(args.max_iterations)
        .score_threshold(args.score_threshold);

    if let Some(path) = &args.log {
        let file = std::fs::File::create(path)?;
        builder = builder.callback(TranscriptLogger::new(&args.question, file)?);
    }

    let state = builder.build()?.run(args.question).await?;

    if let Some(answer) = &state.final_answer {
        println!("{}", answer);
    }

    Ok(())
}
