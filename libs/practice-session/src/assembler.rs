/// Test-Case Assembler
///
/// **Core Responsibility:**
/// Turn a question into the ordered case list the grader runs, and wrap it
/// into a complete grading request.
///
/// **Ordering Rules:**
/// - Every hidden case, normalized, in stored order, tagged `hidden`
/// - Then exactly one sample case, normalized, tagged `sample`
///
/// Custom input never becomes a local case: it rides along as raw request
/// fields and the grading service generates and runs the `normal` case.

use practice_common::text::{normalize, LineTrim};
use practice_common::types::{CaseKind, GradingRequest, Language, Question, TestCase};

/// Learner-supplied ad hoc input for one submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomInput {
    pub enabled: bool,
    pub input: String,
}

impl CustomInput {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn enabled(input: impl Into<String>) -> Self {
        Self {
            enabled: true,
            input: input.into(),
        }
    }
}

/// The synthesized sample case; a missing pair yields empty strings
pub fn sample_case(question: &Question) -> TestCase {
    TestCase {
        input: normalize(&question.sample_input, LineTrim::Full),
        output: normalize(&question.sample_output, LineTrim::Trailing),
        kind: CaseKind::Sample,
    }
}

/// Hidden cases followed by the sample case
///
/// Always `1 + question.hidden_cases.len()` long.
pub fn assemble(question: &Question) -> Vec<TestCase> {
    question
        .hidden_cases
        .iter()
        .map(|tc| TestCase {
            input: normalize(&tc.input, LineTrim::Full),
            output: normalize(&tc.output, LineTrim::Trailing),
            kind: CaseKind::Hidden,
        })
        .chain(std::iter::once(sample_case(question)))
        .collect()
}

/// Build the full grading payload for one submission
///
/// `question_id` is passed separately because the caller has already proven
/// it present; descriptive question fields are echoed back verbatim.
pub fn build_request(
    question: &Question,
    question_id: &str,
    student_id: &str,
    source_code: &str,
    language: Language,
    custom: &CustomInput,
) -> GradingRequest {
    GradingRequest {
        student_id: student_id.to_string(),
        question_id: question_id.to_string(),
        source_code: source_code.to_string(),
        language,
        custom_input_enabled: custom.enabled,
        custom_input: custom.input.clone(),
        description: question.prompt.clone().unwrap_or_default(),
        constraints: question.constraints.clone(),
        difficulty: question.difficulty.clone(),
        hidden_test_cases: assemble(question),
        sample_input: question.sample_input.clone(),
        sample_output: question.sample_output.clone(),
        score: question.max_score,
        question_type: question.question_type.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use practice_common::types::HiddenCase;

    fn question(hidden: usize) -> Question {
        Question {
            id: Some("q-1".to_string()),
            prompt: Some("Double it".to_string()),
            sample_input: " 3 \r\n".to_string(),
            sample_output: "  6  ".to_string(),
            max_score: 10.0,
            hidden_cases: (0..hidden)
                .map(|i| HiddenCase {
                    input: format!("{}\r\n", i),
                    output: format!("{}  ", i * 2),
                })
                .collect(),
            question_type: "code_test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_sample_always_present_once() {
        for hidden in [0, 1, 5] {
            let cases = assemble(&question(hidden));
            assert_eq!(cases.len(), 1 + hidden);
            assert_eq!(
                cases.iter().filter(|c| c.kind == CaseKind::Sample).count(),
                1
            );
            assert_eq!(cases.last().unwrap().kind, CaseKind::Sample);
        }
    }

    #[test]
    fn test_cases_are_normalized() {
        let cases = assemble(&question(1));
        assert_eq!(cases[0].input, "0\n");
        assert_eq!(cases[0].output, "0");
        assert_eq!(cases[0].kind, CaseKind::Hidden);
        assert_eq!(cases[1].input, "3\n");
        // right-trim only keeps leading indentation
        assert_eq!(cases[1].output, "  6");
    }

    #[test]
    fn test_missing_sample_yields_empty_case() {
        let q = Question::default();
        let cases = assemble(&q);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].input, "");
        assert_eq!(cases[0].output, "");
    }

    #[test]
    fn test_build_request_carries_custom_input() {
        let q = question(2);
        let req = build_request(
            &q,
            "q-1",
            "stu-1",
            "print(int(input())*2)",
            Language::Python,
            &CustomInput::enabled("21"),
        );

        assert_eq!(req.question_id, "q-1");
        assert!(req.custom_input_enabled);
        assert_eq!(req.custom_input, "21");
        assert_eq!(req.hidden_test_cases.len(), 3);
        assert_eq!(req.description, "Double it");
        // raw sample echoed, normalized copy lives in the case list
        assert_eq!(req.sample_input, " 3 \r\n");

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["Score"], 10.0);
        assert_eq!(json["type"], "code_test");
        assert_eq!(json["hidden_test_cases"][2]["type"], "sample");
        assert_eq!(json["hidden_test_cases"][0]["Input"], "0\n");
    }
}
