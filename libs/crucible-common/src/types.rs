use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Languages the engine accepts. Adding a language requires a container
/// image and a harness generator, so the set is closed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    Python,
}

impl Language {
    pub fn from_str(s: &str) -> Option<Language> {
        match s.to_lowercase().as_str() {
            "java" => Some(Language::Java),
            "python" => Some(Language::Python),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::Python => "python",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "FUNCTION_CALL")]
    FunctionCall,
    #[serde(rename = "DESIGN_CLASS")]
    DesignClass,
}

impl Default for QuestionType {
    fn default() -> Self {
        QuestionType::FunctionCall
    }
}

/// Hint for rendering the mutation target of a `void` function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SerializationStrategy {
    Array,
    LevelOrder,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Problem signature the harness generator works from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionMetadata {
    pub package_name: String,
    pub function_name: String,
    pub return_type: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub custom_data_structures: Vec<String>,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default)]
    pub mutation_target: Option<usize>,
    #[serde(default)]
    pub serialization_strategy: Option<SerializationStrategy>,
}

/// A submission as it travels through the queue. Test-case inputs are kept
/// as raw JSON: a `{param: value}` object for function-call questions, a
/// `[[opNames],[opArgs]]` pair for design-class questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    #[serde(default)]
    pub submission_id: Option<String>,
    pub language: Language,
    pub source_code: String,
    #[serde(default)]
    pub metadata: Option<QuestionMetadata>,
    #[serde(default)]
    pub test_cases: Vec<Value>,
    #[serde(default)]
    pub custom_test_cases: Vec<Value>,
}

impl SubmissionRequest {
    pub fn total_cases(&self) -> usize {
        self.test_cases.len() + self.custom_test_cases.len()
    }
}

/// Lifecycle states. `QUEUED → COMPILING → RUNNING → {COMPLETED | FAILED}`,
/// with `CANCELLED` reachable only from `QUEUED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    Queued,
    Compiling,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SubmissionState {
    /// Position in the lifecycle chain, used to assert monotonicity.
    pub fn rank(&self) -> u8 {
        match self {
            SubmissionState::Queued => 0,
            SubmissionState::Compiling => 1,
            SubmissionState::Running => 2,
            SubmissionState::Completed | SubmissionState::Failed | SubmissionState::Cancelled => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::Completed | SubmissionState::Failed | SubmissionState::Cancelled
        )
    }
}

/// One per-input record in the caller-visible status. `passed` is always
/// null: the engine never judges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub index: usize,
    pub passed: Option<bool>,
    pub actual_output: Option<String>,
    pub execution_time_ms: u64,
    pub memory_bytes: Option<u64>,
    pub error: Option<String>,
    pub error_type: Option<String>,
    pub is_custom: bool,
}

/// The caller-visible record stored under `execution:status:{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionStatus {
    pub submission_id: String,
    pub status: SubmissionState,
    pub verdict: Option<String>,
    pub runtime_ms: Option<u64>,
    pub memory_kb: Option<u64>,
    pub error_message: Option<String>,
    pub compilation_output: Option<String>,
    #[serde(default)]
    pub test_case_results: Vec<TestCaseResult>,
    pub queued_at: Option<i64>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub worker_id: Option<String>,
}

impl SubmissionStatus {
    pub fn queued(submission_id: String) -> Self {
        SubmissionStatus {
            submission_id,
            status: SubmissionState::Queued,
            verdict: None,
            runtime_ms: None,
            memory_kb: None,
            error_message: None,
            compilation_output: None,
            test_case_results: Vec::new(),
            queued_at: Some(chrono::Utc::now().timestamp_millis()),
            started_at: None,
            completed_at: None,
            worker_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_round_trip() {
        assert_eq!(Language::from_str("Java"), Some(Language::Java));
        assert_eq!(Language::from_str("PYTHON"), Some(Language::Python));
        assert_eq!(Language::from_str("cobol"), None);
        assert_eq!(Language::Java.to_string(), "java");
    }

    #[test]
    fn state_ranks_are_monotonic() {
        assert!(SubmissionState::Queued.rank() < SubmissionState::Compiling.rank());
        assert!(SubmissionState::Compiling.rank() < SubmissionState::Running.rank());
        assert!(SubmissionState::Running.rank() < SubmissionState::Completed.rank());
        assert!(SubmissionState::Completed.is_terminal());
        assert!(!SubmissionState::Running.is_terminal());
    }

    #[test]
    fn request_deserializes_camel_case() {
        let raw = r#"{
            "language": "java",
            "sourceCode": "class Solution {}",
            "metadata": {
                "packageName": "com.example",
                "functionName": "twoSum",
                "returnType": "int[]",
                "parameters": [
                    {"name": "nums", "type": "int[]"},
                    {"name": "target", "type": "int"}
                ]
            },
            "testCases": [{"nums": [2, 7, 11, 15], "target": 9}]
        }"#;
        let req: SubmissionRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.language, Language::Java);
        assert!(req.submission_id.is_none());
        let meta = req.metadata.as_ref().unwrap();
        assert_eq!(meta.function_name, "twoSum");
        assert_eq!(meta.question_type, QuestionType::FunctionCall);
        assert_eq!(meta.parameters.len(), 2);
        assert_eq!(req.test_cases.len(), 1);
        assert_eq!(req.custom_test_cases.len(), 0);
        assert_eq!(req.total_cases(), 1);
    }

    #[test]
    fn status_serializes_null_verdict() {
        let status = SubmissionStatus::queued("abc".to_string());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "QUEUED");
        assert!(json["verdict"].is_null());
        assert!(json["queuedAt"].is_i64());
    }

    #[test]
    fn design_class_metadata() {
        let raw = r#"{
            "packageName": "com.example",
            "functionName": "LRUCache",
            "returnType": "void",
            "questionType": "DESIGN_CLASS"
        }"#;
        let meta: QuestionMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(meta.question_type, QuestionType::DesignClass);
        assert!(meta.parameters.is_empty());
    }
}
