use crate::Result;
use crate::callbacks::Callback;
use crate::llm::Message;
use async_trait::async_trait;
use std::io::Write;

/// Renders each stage's exchange with the llm as a markdown transcript.
pub struct TranscriptLogger<W: Write + Send> {
    writer: W,
    step: u32,
}

impl<W: Write + Send> TranscriptLogger<W> {
    pub fn new(name: &str, mut writer: W) -> Result<Box<Self>> {
        write!(writer, "## {}\n\n", name)?;

        Ok(Box::new(Self { writer, step: 0 }))
    }

    fn display_messages(&mut self, stage: &str, messages: &[Message]) -> Result<()> {
        write!(self.writer, "### Step {}: {}\n\n", self.step, stage)?;

        messages
            .iter()
            .try_for_each(|m| write!(self.writer, "{}", m))?;

        write!(self.writer, "---\n")?;

        Ok(())
    }
}

#[async_trait]
impl<W: Write + Send> Callback for TranscriptLogger<W> {
    async fn call(&mut self, stage: &str, messages: &[Message]) -> Result<()> {
        self.display_messages(stage, messages)?;

        self.writer.flush()?;

        self.step += 1;

        Ok(())
    }
}
