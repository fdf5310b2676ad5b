use crucible_common::types::{Language, QuestionMetadata};
use serde_json::Value;

/// One test-case input with its origin flag. Officials come first in the
/// merged sequence, customs follow; index order is preserved end-to-end.
#[derive(Debug, Clone)]
pub struct CaseInput {
    pub input: Value,
    pub is_custom: bool,
}

/// The internal, validated form a worker hands to the orchestrator.
#[derive(Debug, Clone)]
pub struct CodeSubmission {
    pub id: String,
    pub language: Language,
    pub source_code: String,
    pub metadata: QuestionMetadata,
    pub cases: Vec<CaseInput>,
}
