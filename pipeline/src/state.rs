use schemars::JsonSchema;
use serde::Deserialize;

/// Produced by the planner stage as a schema-constrained response.
#[derive(Clone, Debug, Deserialize, JsonSchema)]
pub struct Plan {
    /// Short ordered steps for solving the task.
    pub steps: Vec<String>,
    /// Major risks/unknowns that should be addressed.
    pub key_risks: Vec<String>,
    /// Headings to include in final answer.
    pub desired_output_structure: Vec<String>,
}

/// Produced by the critic stage as a schema-constrained response.
#[derive(Clone, Debug, Deserialize, JsonSchema)]
pub struct Critique {
    /// Concrete problems with the draft.
    pub issues: Vec<String>,
    /// Points the draft should cover but does not.
    pub missing_points: Vec<String>,
    /// Claims in the draft that may be fabricated or unverifiable.
    pub hallucination_risks: Vec<String>,
    /// Overall quality score between 0 and 100.
    pub score: u8,
    /// Instructions for the next revision of the draft.
    pub fix_instructions: Vec<String>,
}

/// Threaded through the stages sequentially, each stage writes one field.
pub struct PipelineState {
    pub question: String,
    pub plan: Option<Plan>,
    pub research_notes: Vec<String>,
    pub draft: Option<String>,
    pub critique: Option<Critique>,
    pub final_answer: Option<String>,
    pub iteration: u32,
    pub max_iterations: u32,
}

impl PipelineState {
    pub fn new(question: String, max_iterations: u32) -> Self {
        Self {
            question,
            plan: None,
            research_notes: Vec::new(),
            draft: None,
            critique: None,
            final_answer: None,
            iteration: 0,
            max_iterations,
        }
    }
}
