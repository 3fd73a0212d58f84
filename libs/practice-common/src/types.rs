use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::text::{coerce_text, decode_display_escapes};

/// Supported submission languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Language {
    #[default]
    Python,
    Java,
    C,
    #[serde(rename = "C++")]
    Cpp,
    JavaScript,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Python,
        Language::Java,
        Language::C,
        Language::Cpp,
        Language::JavaScript,
    ];
}

/// A language name no variant answers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLanguage(pub String);

impl fmt::Display for UnknownLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let valid: Vec<String> = Language::ALL.iter().map(|l| l.to_string()).collect();
        write!(
            f,
            "Unknown language '{}'. Valid options: {}",
            self.0,
            valid.join(", ")
        )
    }
}

impl std::error::Error for UnknownLanguage {}

impl FromStr for Language {
    type Err = UnknownLanguage;

    /// Case-insensitive, with the usual short names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            "c" => Ok(Language::C),
            "c++" | "cpp" => Ok(Language::Cpp),
            "javascript" | "js" => Ok(Language::JavaScript),
            _ => Err(UnknownLanguage(s.to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::Python => "Python",
            Language::Java => "Java",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::JavaScript => "JavaScript",
        };
        write!(f, "{}", name)
    }
}

/// Origin of a test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseKind {
    /// Learner-supplied custom input, generated by the grading service
    Normal,
    /// Server-only case, input never displayed
    Hidden,
    /// The single public example pair
    Sample,
}

impl CaseKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(CaseKind::Normal),
            "hidden" => Some(CaseKind::Hidden),
            "sample" => Some(CaseKind::Sample),
            _ => None,
        }
    }
}

/// A test case as sent to the grading service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(rename = "Input")]
    pub input: String,
    #[serde(rename = "Output")]
    pub output: String,
    #[serde(rename = "type")]
    pub kind: CaseKind,
}

/// Hidden input/output pair as stored on a question (not yet normalized)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenCase {
    #[serde(rename = "Input")]
    pub input: String,
    #[serde(rename = "Output")]
    pub output: String,
}

/// A practice question
///
/// Decoded from loosely-typed store payloads through `From<Value>`: every
/// field has a default, numbers are coerced to text, and a `Hidden_Test_Cases`
/// value that is not an array is treated as an empty list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "Value")]
pub struct Question {
    #[serde(rename = "questionId", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "Question_No", skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Tags")]
    pub tags: String,
    #[serde(rename = "Question", skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(rename = "Constraints")]
    pub constraints: String,
    #[serde(rename = "Difficulty")]
    pub difficulty: String,
    #[serde(rename = "Score")]
    pub max_score: f64,
    #[serde(rename = "Sample_Input")]
    pub sample_input: String,
    #[serde(rename = "Sample_Output")]
    pub sample_output: String,
    #[serde(rename = "Hidden_Test_Cases")]
    pub hidden_cases: Vec<HiddenCase>,
    #[serde(rename = "Question_Type")]
    pub question_type: String,
}

pub const DEFAULT_QUESTION_TYPE: &str = "code_test";

impl Question {
    /// Tags split on commas, trimmed, empties dropped
    pub fn tag_set(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Whether the prompt body still has to be fetched from the store
    pub fn needs_fetch(&self) -> bool {
        self.id.is_some() && self.prompt.is_none()
    }

    /// One sample case plus every hidden case
    pub fn total_cases(&self) -> usize {
        1 + self.hidden_cases.len()
    }
}

fn optional_text(value: Option<&Value>) -> Option<String> {
    value
        .map(coerce_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn text_or_default(value: Option<&Value>) -> String {
    value.map(coerce_text).unwrap_or_default()
}

fn number_or_zero(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

impl From<Value> for Question {
    fn from(value: Value) -> Self {
        let field = |name: &str| value.get(name);

        let hidden_cases = match field("Hidden_Test_Cases") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|tc| HiddenCase {
                    input: text_or_default(tc.get("Input")),
                    output: text_or_default(tc.get("Output")),
                })
                .collect(),
            None | Some(Value::Null) => Vec::new(),
            Some(other) => {
                tracing::warn!(
                    question_id = ?optional_text(field("questionId")),
                    found = %other,
                    "Malformed Hidden_Test_Cases; treating as empty"
                );
                Vec::new()
            }
        };

        let tags = match field("Tags") {
            Some(Value::Array(items)) => items
                .iter()
                .map(coerce_text)
                .collect::<Vec<_>>()
                .join(","),
            other => text_or_default(other),
        };

        Question {
            id: optional_text(field("questionId")),
            number: optional_text(field("Question_No")),
            subject: text_or_default(field("Subject")),
            tags,
            prompt: optional_text(field("Question")),
            constraints: text_or_default(field("Constraints")),
            difficulty: text_or_default(field("Difficulty")),
            max_score: number_or_zero(field("Score")),
            sample_input: text_or_default(field("Sample_Input")),
            sample_output: text_or_default(field("Sample_Output")),
            hidden_cases,
            question_type: optional_text(field("Question_Type"))
                .unwrap_or_else(|| DEFAULT_QUESTION_TYPE.to_string()),
        }
    }
}

/// Payload sent to the grading service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingRequest {
    pub student_id: String,
    pub question_id: String,
    pub source_code: String,
    pub language: Language,
    pub custom_input_enabled: bool,
    pub custom_input: String,
    pub description: String,
    pub constraints: String,
    pub difficulty: String,
    pub hidden_test_cases: Vec<TestCase>,
    pub sample_input: String,
    pub sample_output: String,
    #[serde(rename = "Score")]
    pub score: f64,
    #[serde(rename = "type")]
    pub question_type: String,
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(coerce_text(&value))
}

fn lenient_optional_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Null => None,
        other => Some(coerce_text(&other)),
    })
}

fn lenient_kind<'de, D: Deserializer<'de>>(d: D) -> Result<Option<CaseKind>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value.as_str().and_then(CaseKind::parse))
}

/// One per-case result as returned by the grading service
///
/// Results whose `type` is missing or unrecognized keep `kind: None` and
/// belong to neither result group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingResult {
    #[serde(default, deserialize_with = "lenient_optional_text", skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub expected_output: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub actual_output: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_kind")]
    pub kind: Option<CaseKind>,
}

/// Response body of the grading service
#[derive(Debug, Clone, Deserialize)]
pub struct GradingResponse {
    pub results: Vec<GradingResult>,
    #[serde(default)]
    pub awarded_score: Option<f64>,
}

/// Local verdict for a single case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseStatus {
    Passed,
    Failed,
}

/// A grading result enriched with its local verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseResult {
    #[serde(flatten)]
    pub result: GradingResult,
    pub status: CaseStatus,
}

impl CaseResult {
    pub fn is_hidden(&self) -> bool {
        self.result.kind == Some(CaseKind::Hidden)
    }

    /// Input to show the learner; always `None` for hidden cases
    pub fn display_input(&self) -> Option<&str> {
        if self.is_hidden() {
            None
        } else {
            self.result.input.as_deref()
        }
    }

    /// Tab label for the case at 1-based position `n`
    pub fn label(&self, n: usize) -> String {
        if self.is_hidden() {
            format!("Hidden Test Case {}", n)
        } else {
            format!("Test Case {}", n)
        }
    }

    pub fn display_expected(&self) -> String {
        decode_display_escapes(&self.result.expected_output)
    }

    pub fn display_actual(&self) -> String {
        decode_display_escapes(&self.result.actual_output)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }
}

/// Scored results of one group plus their reduction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResultGroup {
    pub results: Vec<CaseResult>,
    pub summary: Summary,
}

/// Per-case status as persisted in a submission record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedCase {
    #[serde(default, deserialize_with = "lenient_text")]
    pub status: String,
}

impl RecordedCase {
    pub fn passed(&self) -> bool {
        self.status == "Passed"
    }
}

/// A learner's last persisted submission for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    #[serde(rename = "questionId", deserialize_with = "lenient_text")]
    pub question_id: String,
    #[serde(default)]
    pub results: Vec<RecordedCase>,
    #[serde(default)]
    pub awarded_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl SubmissionRecord {
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }
}

/// List-view status of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    NotAttempted,
    InProgress,
    Solved,
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProgressStatus::NotAttempted => "NOT ATTEMPTED",
            ProgressStatus::InProgress => "IN PROGRESS",
            ProgressStatus::Solved => "SOLVED",
        };
        write!(f, "{}", label)
    }
}

/// Display progress for one question in the list view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub passed_count: usize,
    pub total_cases: usize,
    pub awarded_score: f64,
    pub max_score: f64,
    pub status: ProgressStatus,
}

impl ProgressSummary {
    /// "passed/total", e.g. `3/4`
    pub fn passed_str(&self) -> String {
        format!("{}/{}", self.passed_count, self.total_cases)
    }

    /// "awarded/max", e.g. `8/10`
    pub fn score_str(&self) -> String {
        format!("{}/{}", self.awarded_score, self.max_score)
    }

    pub fn passed_pct(&self) -> f64 {
        if self.total_cases == 0 {
            return 0.0;
        }
        self.passed_count as f64 / self.total_cases as f64 * 100.0
    }

    pub fn score_pct(&self) -> f64 {
        if self.max_score <= 0.0 {
            return 0.0;
        }
        self.awarded_score / self.max_score * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_question_from_full_payload() {
        let q: Question = serde_json::from_value(json!({
            "questionId": "q-1",
            "Subject": "Python",
            "Tags": "day-1:1",
            "Question": "Add two numbers",
            "Constraints": "1 <= a, b <= 100",
            "Difficulty": "Easy",
            "Score": 10,
            "Sample_Input": "1 2",
            "Sample_Output": "3",
            "Hidden_Test_Cases": [{"Input": "2 2", "Output": "4"}],
            "Question_Type": "code_test"
        }))
        .unwrap();

        assert_eq!(q.id.as_deref(), Some("q-1"));
        assert_eq!(q.max_score, 10.0);
        assert_eq!(q.hidden_cases.len(), 1);
        assert_eq!(q.total_cases(), 2);
        assert!(!q.needs_fetch());
    }

    #[test]
    fn test_question_tolerates_malformed_fields() {
        let q: Question = serde_json::from_value(json!({
            "questionId": 17,
            "Sample_Input": 5,
            "Score": "7.5",
            "Hidden_Test_Cases": "oops"
        }))
        .unwrap();

        assert_eq!(q.id.as_deref(), Some("17"));
        assert_eq!(q.sample_input, "5");
        assert_eq!(q.sample_output, "");
        assert_eq!(q.max_score, 7.5);
        assert!(q.hidden_cases.is_empty());
        assert_eq!(q.question_type, DEFAULT_QUESTION_TYPE);
        assert!(q.needs_fetch());
    }

    #[test]
    fn test_question_blank_id_is_absent() {
        let q = Question::from(json!({ "questionId": "  ", "Question": "x" }));
        assert_eq!(q.id, None);
        assert!(!q.needs_fetch());
    }

    #[test]
    fn test_tag_set() {
        let q = Question::from(json!({ "Tags": "loops, day-1:1,," }));
        assert_eq!(q.tag_set(), vec!["loops", "day-1:1"]);
        let q = Question::from(json!({ "Tags": ["a", "b"] }));
        assert_eq!(q.tag_set(), vec!["a", "b"]);
    }

    #[test]
    fn test_grading_result_lenient_decoding() {
        let results: Vec<GradingResult> = serde_json::from_value(json!([
            {"type": "hidden", "expected_output": 2, "actual_output": "2"},
            {"type": "weird", "expected_output": null},
            {"expected_output": "x", "actual_output": "x", "input": "1"}
        ]))
        .unwrap();

        assert_eq!(results[0].kind, Some(CaseKind::Hidden));
        assert_eq!(results[0].expected_output, "2");
        assert_eq!(results[1].kind, None);
        assert_eq!(results[1].expected_output, "");
        assert_eq!(results[2].kind, None);
        assert_eq!(results[2].input.as_deref(), Some("1"));
    }

    #[test]
    fn test_hidden_input_is_suppressed() {
        let hidden = CaseResult {
            result: GradingResult {
                input: Some("secret".to_string()),
                expected_output: "1".to_string(),
                actual_output: "1".to_string(),
                kind: Some(CaseKind::Hidden),
            },
            status: CaseStatus::Passed,
        };
        assert_eq!(hidden.display_input(), None);
        assert_eq!(hidden.label(2), "Hidden Test Case 2");

        let sample = CaseResult {
            result: GradingResult {
                kind: Some(CaseKind::Sample),
                ..hidden.result.clone()
            },
            status: CaseStatus::Passed,
        };
        assert_eq!(sample.display_input(), Some("secret"));
        assert_eq!(sample.label(1), "Test Case 1");
    }

    #[test]
    fn test_language_names() {
        assert_eq!("c++".parse::<Language>(), Ok(Language::Cpp));
        assert_eq!(" JS ".parse::<Language>(), Ok(Language::JavaScript));
        assert_eq!(Language::Cpp.to_string(), "C++");
        assert_eq!(serde_json::to_value(Language::Cpp).unwrap(), json!("C++"));
        let err = "cobol".parse::<Language>().unwrap_err();
        assert_eq!(err, UnknownLanguage("cobol".to_string()));
        assert!(err.to_string().contains("Python, Java, C, C++, JavaScript"));
    }

    #[test]
    fn test_progress_strings() {
        let p = ProgressSummary {
            passed_count: 3,
            total_cases: 4,
            awarded_score: 8.0,
            max_score: 10.0,
            status: ProgressStatus::InProgress,
        };
        assert_eq!(p.passed_str(), "3/4");
        assert_eq!(p.score_str(), "8/10");
        assert_eq!(p.passed_pct(), 75.0);
        assert_eq!(p.score_pct(), 80.0);
        assert_eq!(p.status.to_string(), "IN PROGRESS");
    }

    #[test]
    fn test_submission_record_counts_passed() {
        let record: SubmissionRecord = serde_json::from_value(json!({
            "questionId": "q",
            "results": [{"status": "Passed"}, {"status": "Failed"}, {"status": "Passed"}],
            "awarded_score": 5
        }))
        .unwrap();
        assert_eq!(record.passed_count(), 2);
        assert_eq!(record.awarded_score, Some(5.0));
    }
}
