//! List-view progress aggregation.
//!
//! Pure functions over already-persisted data; nothing here talks to the
//! grader or touches a session.

use chrono::{DateTime, Utc};
use practice_common::types::{
    CaseStatus, ProgressStatus, ProgressSummary, Question, RecordedCase, ResultGroup,
    SubmissionRecord,
};
use serde::Serialize;
use std::collections::HashMap;

/// Progress of one question, as rendered in a list row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionProgress {
    pub question_id: Option<String>,
    pub prompt: Option<String>,
    pub difficulty: String,
    #[serde(flatten)]
    pub progress: ProgressSummary,
    pub passed_str: String,
    pub score_str: String,
    pub passed_pct: f64,
    pub score_pct: f64,
}

/// Progress tuple for one question and its last submission, if any
pub fn progress_for(question: &Question, record: Option<&SubmissionRecord>) -> ProgressSummary {
    let total_cases = question.total_cases();
    let max_score = question.max_score;

    let Some(record) = record else {
        return ProgressSummary {
            passed_count: 0,
            total_cases,
            awarded_score: 0.0,
            max_score,
            status: ProgressStatus::NotAttempted,
        };
    };

    let passed_count = record.passed_count();
    let status = if passed_count == total_cases {
        ProgressStatus::Solved
    } else {
        ProgressStatus::InProgress
    };

    ProgressSummary {
        passed_count,
        total_cases,
        awarded_score: record.awarded_score.unwrap_or(0.0),
        max_score,
        status,
    }
}

/// One row per question, in list order; records are matched by question id
pub fn progress_for_list(
    questions: &[Question],
    records: &[SubmissionRecord],
) -> Vec<QuestionProgress> {
    let by_id: HashMap<&str, &SubmissionRecord> = records
        .iter()
        .map(|r| (r.question_id.as_str(), r))
        .collect();

    questions
        .iter()
        .map(|q| {
            let record = q.id.as_deref().and_then(|id| by_id.get(id).copied());
            let progress = progress_for(q, record);
            QuestionProgress {
                question_id: q.id.clone(),
                prompt: q.prompt.clone(),
                difficulty: q.difficulty.clone(),
                passed_str: progress.passed_str(),
                score_str: progress.score_str(),
                passed_pct: progress.passed_pct(),
                score_pct: progress.score_pct(),
                progress,
            }
        })
        .collect()
}

/// Score to persist for a graded run
///
/// The service's own figure wins; otherwise the max score is scaled by the
/// graded pass fraction.
pub fn awarded_score(question: &Question, graded: &ResultGroup, service_awarded: Option<f64>) -> f64 {
    if let Some(score) = service_awarded {
        return score;
    }
    let total = graded.summary.total();
    if total == 0 {
        return 0.0;
    }
    question.max_score * graded.summary.passed as f64 / total as f64
}

/// Build the record persisted after an applied grade
pub fn submission_record(
    question_id: &str,
    graded: &ResultGroup,
    awarded: f64,
    submitted_at: DateTime<Utc>,
) -> SubmissionRecord {
    SubmissionRecord {
        question_id: question_id.to_string(),
        results: graded
            .results
            .iter()
            .map(|r| RecordedCase {
                status: match r.status {
                    CaseStatus::Passed => "Passed".to_string(),
                    CaseStatus::Failed => "Failed".to_string(),
                },
            })
            .collect(),
        awarded_score: Some(awarded),
        submitted_at: Some(submitted_at),
    }
}
