/// Result Classifier & Scorer
///
/// **Core Responsibility:**
/// Partition the grader's flat result list into independent groups and score
/// every case locally.
///
/// **Critical Properties:**
/// - Knows nothing about HTTP
/// - Knows nothing about session state
/// - Pure function: (raw results, custom flag) → scored groups
///
/// **Grouping Rules:**
/// - custom: kind `normal`, only when custom input was enabled
/// - graded: kind `hidden` or `sample`
/// - anything else belongs to neither group
///
/// **Comparison Rules:**
/// - Trim leading and trailing whitespace: YES
/// - Case sensitivity: YES (exact match required)
/// - Numeric or whitespace-insensitive tolerance: NO

use practice_common::types::{CaseKind, CaseResult, CaseStatus, GradingResult, ResultGroup, Summary};
use serde::Serialize;
use std::fmt;

/// Both scored groups of one grading run, next to the results they came from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Classified {
    #[serde(skip)]
    pub raw: Vec<GradingResult>,
    pub custom: ResultGroup,
    pub graded: ResultGroup,
}

/// Overall outcome of the graded group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    AllPassed,
    SomeFailed,
}

impl Verdict {
    pub fn message(&self) -> &'static str {
        match self {
            Verdict::AllPassed => "All test cases passed!",
            Verdict::SomeFailed => "Some test cases failed.",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl Classified {
    pub fn verdict(&self) -> Verdict {
        if self.graded.summary.failed == 0 {
            Verdict::AllPassed
        } else {
            Verdict::SomeFailed
        }
    }
}

/// Verdict for a single result: trimmed exact equality
pub fn case_status(result: &GradingResult) -> CaseStatus {
    if result.expected_output.trim() == result.actual_output.trim() {
        CaseStatus::Passed
    } else {
        CaseStatus::Failed
    }
}

/// Score a group of results and reduce it to a summary
pub fn score_group<'a, I>(results: I) -> ResultGroup
where
    I: IntoIterator<Item = &'a GradingResult>,
{
    let mut summary = Summary::default();
    let results = results
        .into_iter()
        .map(|result| {
            let status = case_status(result);
            match status {
                CaseStatus::Passed => summary.passed += 1,
                CaseStatus::Failed => summary.failed += 1,
            }
            CaseResult {
                result: result.clone(),
                status,
            }
        })
        .collect();

    ResultGroup { results, summary }
}

/// Partition and score a grading response
///
/// With `custom_enabled == false` the custom group is forced empty even if
/// the service echoed `normal` results.
pub fn classify(raw: &[GradingResult], custom_enabled: bool) -> Classified {
    let custom = if custom_enabled {
        score_group(raw.iter().filter(|r| r.kind == Some(CaseKind::Normal)))
    } else {
        ResultGroup::default()
    };

    let graded = score_group(
        raw.iter()
            .filter(|r| matches!(r.kind, Some(CaseKind::Hidden) | Some(CaseKind::Sample))),
    );

    let ignored = raw.len() - custom.results.len() - graded.results.len();
    if ignored > 0 {
        tracing::debug!(ignored, custom_enabled, "Results outside both groups were ignored");
    }

    Classified {
        raw: raw.to_vec(),
        custom,
        graded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(kind: Option<CaseKind>, expected: &str, actual: &str) -> GradingResult {
        GradingResult {
            input: None,
            expected_output: expected.to_string(),
            actual_output: actual.to_string(),
            kind,
        }
    }

    #[test]
    fn test_case_status_trims() {
        assert_eq!(case_status(&result(None, "hello", "  hello  \n")), CaseStatus::Passed);
        assert_eq!(case_status(&result(None, "", "   \n")), CaseStatus::Passed);
        assert_eq!(case_status(&result(None, "1\n2", "1\n2\n")), CaseStatus::Passed);
    }

    #[test]
    fn test_case_sensitivity() {
        assert_eq!(case_status(&result(None, "Hello", "hello")), CaseStatus::Failed);
    }

    #[test]
    fn test_no_numeric_tolerance() {
        assert_eq!(case_status(&result(None, "1.0", "1")), CaseStatus::Failed);
        // inner whitespace is content
        assert_eq!(case_status(&result(None, "1 2", "1  2")), CaseStatus::Failed);
    }

    #[test]
    fn test_partial_failure_scenario() {
        let raw = vec![
            result(Some(CaseKind::Hidden), "2", "2"),
            result(Some(CaseKind::Sample), "4", "5"),
        ];
        let classified = classify(&raw, false);

        assert_eq!(classified.graded.summary, Summary { passed: 1, failed: 1 });
        assert_eq!(classified.graded.results[0].status, CaseStatus::Passed);
        assert_eq!(classified.graded.results[1].status, CaseStatus::Failed);
        assert_eq!(classified.verdict(), Verdict::SomeFailed);
        assert_eq!(classified.verdict().message(), "Some test cases failed.");
        assert_eq!(classified.raw, raw);
    }

    #[test]
    fn test_custom_forced_empty_when_disabled() {
        let raw = vec![
            result(Some(CaseKind::Normal), "x", "x"),
            result(Some(CaseKind::Sample), "4", "4"),
        ];
        let classified = classify(&raw, false);

        assert!(classified.custom.results.is_empty());
        assert_eq!(classified.custom.summary, Summary { passed: 0, failed: 0 });
        assert_eq!(classified.graded.summary, Summary { passed: 1, failed: 0 });
        assert_eq!(classified.verdict(), Verdict::AllPassed);
    }

    #[test]
    fn test_custom_group_when_enabled() {
        let raw = vec![
            result(Some(CaseKind::Normal), "x", "y"),
            result(Some(CaseKind::Hidden), "1", "1"),
        ];
        let classified = classify(&raw, true);

        assert_eq!(classified.custom.summary, Summary { passed: 0, failed: 1 });
        assert_eq!(classified.graded.summary, Summary { passed: 1, failed: 0 });
        // custom failures never affect the graded verdict
        assert_eq!(classified.verdict(), Verdict::AllPassed);
    }

    #[test]
    fn test_graded_summary_counts_hidden_and_sample_only() {
        let raw = vec![
            result(Some(CaseKind::Hidden), "1", "1"),
            result(Some(CaseKind::Hidden), "1", "0"),
            result(Some(CaseKind::Sample), "a", "a"),
            result(Some(CaseKind::Normal), "a", "a"),
            result(None, "a", "a"),
        ];
        for custom_enabled in [true, false] {
            let classified = classify(&raw, custom_enabled);
            assert_eq!(classified.graded.summary.total(), 3);
            assert_eq!(classified.graded.summary.passed, 2);
        }
    }

    #[test]
    fn test_empty_results() {
        let classified = classify(&[], true);
        assert_eq!(classified, Classified::default());
    }
}
