use crate::state::{Critique, PipelineState, Plan};
use agent::callbacks::Callback;
use agent::llm::{CompletionRequest, LLM, Message, OutputSchema};
use agent::{Error, Result};
use std::sync::Arc;

const PLANNER_PROMPT: &str = include_str!("prompts/planner.md");
const RESEARCHER_PROMPT: &str = include_str!("prompts/researcher.md");
const WRITER_PROMPT: &str = include_str!("prompts/writer.md");
const CRITIC_PROMPT: &str = include_str!("prompts/critic.md");
const FINALIZER_PROMPT: &str = include_str!("prompts/finalizer.md");

type Callbacks = Vec<Box<dyn Callback + Send>>;

pub struct Pipeline {
    llm: Arc<dyn LLM + Send + Sync>,
    callbacks: Callbacks,
    score_threshold: u8,
    max_iterations: u32,
}

impl Pipeline {
    /// Runs plan, research, then write/critique until the critique score
    /// clears the threshold or the iteration cap is hit, then finalize.
    pub async fn run(mut self, question: String) -> Result<PipelineState> {
        let mut state = PipelineState::new(question, self.max_iterations);

        self.plan(&mut state).await?;
        self.research(&mut state).await?;

        loop {
            self.write(&mut state).await?;
            let score = self.critique(&mut state).await?;

            if score >= self.score_threshold || state.iteration >= state.max_iterations {
                break;
            }
        }

        self.finalize(&mut state).await?;

        Ok(state)
    }

    async fn plan(&mut self, state: &mut PipelineState) -> Result<()> {
        let schema = OutputSchema::new::<Plan>(
            "plan",
            "Ordered steps, key risks, and output headings for answering the question",
        )?;

        let response = self
            .completion(
                "planner",
                PLANNER_PROMPT,
                state.question.clone(),
                Some(&schema),
                0.2,
            )
            .await?;

        state.plan = Some(serde_json::from_str(&response)?);

        Ok(())
    }

    async fn research(&mut self, state: &mut PipelineState) -> Result<()> {
        let plan = state.plan.as_ref().ok_or(Error::WorkflowError(
            "researcher ran before planner".to_string(),
        ))?;

        let user = format!(
            "Question: {}\n\nPlan steps:\n{}\nKnown risks:\n{}",
            state.question,
            bullet_list(&plan.steps),
            bullet_list(&plan.key_risks),
        );

        let response = self
            .completion("researcher", RESEARCHER_PROMPT, user, None, 0.3)
            .await?;

        state.research_notes = split_notes(&response);

        Ok(())
    }

    async fn write(&mut self, state: &mut PipelineState) -> Result<()> {
        let plan = state
            .plan
            .as_ref()
            .ok_or(Error::WorkflowError("writer ran before planner".to_string()))?;

        let mut user = format!(
            "Question: {}\n\nDesired structure:\n{}\nResearch notes:\n{}",
            state.question,
            bullet_list(&plan.desired_output_structure),
            bullet_list(&state.research_notes),
        );

        // a previous critique makes this a revision pass
        if let (Some(draft), Some(critique)) = (&state.draft, &state.critique) {
            user.push_str(&format!(
                "\nPrevious draft:\n{}\n\nFix instructions:\n{}",
                draft,
                bullet_list(&critique.fix_instructions),
            ));
        }

        let response = self
            .completion("writer", WRITER_PROMPT, user, None, 0.7)
            .await?;

        state.draft = Some(response);
        state.iteration += 1;

        Ok(())
    }

    async fn critique(&mut self, state: &mut PipelineState) -> Result<u8> {
        let plan = state
            .plan
            .as_ref()
            .ok_or(Error::WorkflowError("critic ran before planner".to_string()))?;
        let draft = state
            .draft
            .as_ref()
            .ok_or(Error::WorkflowError("critic ran before writer".to_string()))?;

        let user = format!(
            "Question: {}\n\nPlan steps:\n{}\nResearch notes:\n{}\nDraft:\n{}",
            state.question,
            bullet_list(&plan.steps),
            bullet_list(&state.research_notes),
            draft,
        );

        let schema = OutputSchema::new::<Critique>(
            "critique",
            "Issues, missing points, hallucination risks, a 0-100 score, and fix instructions",
        )?;

        let response = self
            .completion("critic", CRITIC_PROMPT, user, Some(&schema), 0.0)
            .await?;

        let mut critique: Critique = serde_json::from_str(&response)?;
        critique.score = critique.score.min(100);

        let score = critique.score;
        state.critique = Some(critique);

        Ok(score)
    }

    async fn finalize(&mut self, state: &mut PipelineState) -> Result<()> {
        let draft = state.draft.as_ref().ok_or(Error::WorkflowError(
            "finalizer ran before writer".to_string(),
        ))?;

        let fixes = state
            .critique
            .as_ref()
            .map(|critique| bullet_list(&critique.fix_instructions))
            .unwrap_or_default();

        let user = format!(
            "Question: {}\n\nAccepted draft:\n{}\n\nRemaining fix instructions:\n{}",
            state.question, draft, fixes,
        );

        let response = self
            .completion("finalizer", FINALIZER_PROMPT, user, None, 0.4)
            .await?;

        state.final_answer = Some(response);

        Ok(())
    }

    async fn completion(
        &mut self,
        stage: &str,
        system: &str,
        user: String,
        schema: Option<&OutputSchema>,
        temperature: f32,
    ) -> Result<String> {
        let messages = vec![Message::System(system.to_string()), Message::User(user)];

        let response = self
            .llm
            .completion(CompletionRequest {
                messages: &messages,
                schema,
                temperature: Some(temperature),
            })
            .await?;

        let mut transcript = messages;
        transcript.push(Message::Assistant(response.content.clone()));

        for callback in &mut self.callbacks {
            callback.call(stage, &transcript).await?;
        }

        Ok(response.content)
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}\n", item))
        .collect::<String>()
}

/// One note per non-empty line, leading bullet markers stripped.
fn split_notes(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_bullet)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_bullet(line: &str) -> &str {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return rest.trim_start();
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return rest.trim_start();
        }
    }

    line
}

pub struct PipelineBuilder {
    llm: Option<Arc<dyn LLM + Send + Sync>>,
    callbacks: Callbacks,
    score_threshold: u8,
    max_iterations: u32,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            llm: None,
            callbacks: Vec::new(),
            score_threshold: 80,
            max_iterations: 3,
        }
    }

    pub fn llm(mut self, llm: Arc<dyn LLM + Send + Sync>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn callback(mut self, callback: Box<dyn Callback + Send>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn score_threshold(mut self, score_threshold: u8) -> Self {
        self.score_threshold = score_threshold;
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        Ok(Pipeline {
            llm: self
                .llm
                .ok_or(Error::MissingArg("llm is required for pipeline".to_string()))?,
            callbacks: self.callbacks,
            score_threshold: self.score_threshold,
            max_iterations: self.max_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent::llm::{CompletionRequest, CompletionResponse, LLM};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct MockLLM {
        responses: Mutex<VecDeque<String>>,
        // (schema present, user message content) per call
        calls: Mutex<Vec<(bool, String)>>,
    }

    impl MockLLM {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(bool, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LLM for MockLLM {
        async fn completion<'a>(
            &self,
            request: CompletionRequest<'a>,
        ) -> Result<CompletionResponse> {
            let user = request
                .messages
                .iter()
                .find(|m| matches!(m, Message::User(_)))
                .map(|m| m.content().to_string())
                .unwrap_or_default();

            self.calls
                .lock()
                .unwrap()
                .push((request.schema.is_some(), user));

            let content = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(Error::LLMResponseError("script exhausted".to_string()))?;

            Ok(CompletionResponse { content })
        }
    }

    const PLAN: &str = r#"{"steps":["define the terms","compare the options"],"key_risks":["ambiguous question"],"desired_output_structure":["Overview","Details"]}"#;

    fn critique_json(score: u32) -> String {
        format!(
            r#"{{"issues":["too vague"],"missing_points":[],"hallucination_risks":[],"score":{},"fix_instructions":["be specific"]}}"#,
            score
        )
    }

    #[tokio::test]
    async fn test_accepts_first_draft() -> Result<()> {
        let critique = critique_json(90);
        let llm = MockLLM::new(&[
            PLAN,
            "- note one\n- note two\n\n3. note three",
            "draft one",
            critique.as_str(),
            "final answer",
        ]);

        let state = PipelineBuilder::new()
            .llm(llm.clone())
            .build()?
            .run("what is a monad".to_string())
            .await?;

        let plan = state.plan.unwrap();
        assert_eq!(plan.steps, vec!["define the terms", "compare the options"]);
        assert_eq!(plan.desired_output_structure, vec!["Overview", "Details"]);

        assert_eq!(
            state.research_notes,
            vec!["note one", "note two", "note three"]
        );
        assert_eq!(state.draft.as_deref(), Some("draft one"));
        assert_eq!(state.critique.unwrap().score, 90);
        assert_eq!(state.iteration, 1);
        assert_eq!(state.final_answer.as_deref(), Some("final answer"));

        // planner and critic are schema-constrained, the rest are free text
        let schema_flags = llm.calls().iter().map(|(s, _)| *s).collect::<Vec<_>>();
        assert_eq!(schema_flags, vec![true, false, false, true, false]);

        Ok(())
    }

    #[tokio::test]
    async fn test_revises_until_threshold() -> Result<()> {
        let rejected = critique_json(40);
        let accepted = critique_json(85);
        let llm = MockLLM::new(&[
            PLAN,
            "- a note",
            "draft one",
            rejected.as_str(),
            "draft two",
            accepted.as_str(),
            "final answer",
        ]);

        let state = PipelineBuilder::new()
            .llm(llm.clone())
            .build()?
            .run("what is a monad".to_string())
            .await?;

        assert_eq!(state.iteration, 2);
        assert_eq!(state.draft.as_deref(), Some("draft two"));
        assert_eq!(state.critique.unwrap().score, 85);
        assert_eq!(state.final_answer.as_deref(), Some("final answer"));

        // the revision pass sees the previous draft and the fix instructions
        let calls = llm.calls();
        assert_eq!(calls.len(), 7);
        assert!(calls[4].1.contains("Previous draft:\ndraft one"));
        assert!(calls[4].1.contains("- be specific"));

        Ok(())
    }

    #[tokio::test]
    async fn test_stops_at_iteration_cap() -> Result<()> {
        let first = critique_json(10);
        let second = critique_json(20);
        let llm = MockLLM::new(&[
            PLAN,
            "- a note",
            "draft one",
            first.as_str(),
            "draft two",
            second.as_str(),
            "final answer",
        ]);

        let state = PipelineBuilder::new()
            .llm(llm.clone())
            .max_iterations(2)
            .build()?
            .run("what is a monad".to_string())
            .await?;

        assert_eq!(state.iteration, 2);
        assert_eq!(state.critique.unwrap().score, 20);
        assert_eq!(state.final_answer.as_deref(), Some("final answer"));
        assert_eq!(llm.calls().len(), 7);

        Ok(())
    }

    #[tokio::test]
    async fn test_score_clamped_to_100() -> Result<()> {
        let critique = critique_json(200);
        let llm = MockLLM::new(&[PLAN, "- a note", "draft one", critique.as_str(), "final"]);

        let state = PipelineBuilder::new()
            .llm(llm)
            .build()?
            .run("what is a monad".to_string())
            .await?;

        assert_eq!(state.critique.unwrap().score, 100);
        assert_eq!(state.iteration, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_empty_research_output() -> Result<()> {
        let critique = critique_json(90);
        let llm = MockLLM::new(&[PLAN, "", "draft one", critique.as_str(), "final"]);

        let state = PipelineBuilder::new()
            .llm(llm)
            .build()?
            .run("what is a monad".to_string())
            .await?;

        assert!(state.research_notes.is_empty());
        assert_eq!(state.draft.as_deref(), Some("draft one"));

        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_plan_aborts() {
        let llm = MockLLM::new(&["not json"]);

        let result = PipelineBuilder::new()
            .llm(llm)
            .build()
            .unwrap()
            .run("what is a monad".to_string())
            .await;

        assert!(matches!(result, Err(Error::JsonError(_))));
    }

    #[test]
    fn test_builder_requires_llm() {
        assert!(matches!(
            PipelineBuilder::new().build(),
            Err(Error::MissingArg(_))
        ));
    }

    #[test]
    fn test_split_notes() {
        let notes = split_notes("- first\n* second\n\n10. third\n   - indented\nplain\n");
        assert_eq!(notes, vec!["first", "second", "third", "indented", "plain"]);
    }
}
