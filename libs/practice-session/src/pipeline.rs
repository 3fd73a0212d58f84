/// Grading Pipeline - Submit Orchestration
///
/// **Responsibility:**
/// Drive one submission end to end against a shared session:
/// 1. Check the question has an identifier (no network call otherwise)
/// 2. Snapshot question and code, take a fencing ticket
/// 3. Call the grading service with the session unlocked
/// 4. Classify the results and hand them back to the issuing question
///
/// The session lock is never held across the network call, so the learner
/// can keep navigating and editing while a grade is pending.

use practice_common::types::{Language, Question};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::assembler::{build_request, CustomInput};
use crate::classifier::{classify, Classified};
use crate::error::PracticeError;
use crate::grading::GradingService;
use crate::session::{ApplyResult, PracticeSession, SubmissionTicket};
use crate::store::QuestionStore;

/// Everything the caller needs after a grade came back
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub ticket: SubmissionTicket,
    pub question: Question,
    pub classified: Classified,
    pub awarded_score: Option<f64>,
    pub applied: ApplyResult,
}

pub struct GradingPipeline<G> {
    grader: G,
    student_id: String,
}

impl<G: GradingService> GradingPipeline<G> {
    pub fn new(grader: G, student_id: impl Into<String>) -> Self {
        Self {
            grader,
            student_id: student_id.into(),
        }
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    /// Grade the code buffer of the question at `index`
    ///
    /// ## Errors
    /// * `MissingQuestionId` - no question or no identifier at `index`; the
    ///   session is left untouched
    /// * `GradingService` - the call failed; displayed results are cleared if
    ///   the question is on screen, cached results are kept
    #[instrument(skip(self, session, custom), fields(custom_input = custom.enabled))]
    pub async fn submit(
        &self,
        session: &Mutex<PracticeSession>,
        index: usize,
        language: Language,
        custom: &CustomInput,
    ) -> Result<SubmitOutcome, PracticeError> {
        let (question, question_id, code, ticket) = {
            let mut guard = session.lock().await;
            let question = guard.question(index).cloned();
            let Some((question, question_id)) =
                question.and_then(|q| q.id.clone().map(|id| (q, id)))
            else {
                warn!(index, "Submit refused: question has no identifier");
                return Err(PracticeError::MissingQuestionId);
            };
            let code = guard.code_for(index);
            let Some(ticket) = guard.issue_ticket(index) else {
                return Err(PracticeError::MissingQuestionId);
            };
            (question, question_id, code, ticket)
        };

        let request = build_request(
            &question,
            &question_id,
            &self.student_id,
            &code,
            language,
            custom,
        );

        info!(
            question_id = %question_id,
            token = ticket.token,
            cases = request.hidden_test_cases.len(),
            "Submitting for grading"
        );

        let response = match self.grader.grade(&request).await {
            Ok(response) => response,
            Err(e) => {
                let outcome = session.lock().await.fail_submission(&ticket);
                warn!(question_id = %question_id, token = ticket.token, outcome = ?outcome, error = %e, "Grading failed");
                return Err(e);
            }
        };

        let classified = classify(&response.results, custom.enabled);
        let applied = session
            .lock()
            .await
            .complete_submission(&ticket, classified.clone());

        info!(
            question_id = %question_id,
            token = ticket.token,
            passed = classified.graded.summary.passed,
            failed = classified.graded.summary.failed,
            applied = ?applied,
            "Grading complete"
        );

        Ok(SubmitOutcome {
            ticket,
            question,
            classified,
            awarded_score: response.awarded_score,
            applied,
        })
    }
}

/// Fetch the full question at `index` when only its identifier was embedded
///
/// Returns `Ok(true)` when the question was replaced. On failure the question
/// stays as it was; retrying is up to the caller. A result that arrives after
/// the list was replaced is dropped.
pub async fn ensure_question_loaded<S>(
    session: &Mutex<PracticeSession>,
    index: usize,
    store: &S,
) -> Result<bool, PracticeError>
where
    S: QuestionStore + ?Sized,
{
    let question = match session.lock().await.question(index) {
        Some(q) if q.needs_fetch() => q.clone(),
        _ => return Ok(false),
    };
    let Some(question_id) = question.id.clone() else {
        return Ok(false);
    };

    let subject = match question.subject.trim() {
        "" => "python".to_string(),
        s => s.to_lowercase(),
    };

    let mut fetched = store
        .fetch_question(&subject, &question_id, &question.question_type)
        .await
        .map_err(|e| {
            warn!(question_id = %question_id, error = %e, "Question fetch failed");
            e
        })?;

    // the requested identifier stays authoritative
    match fetched.id.as_deref() {
        None => fetched.id = Some(question_id.clone()),
        Some(id) if id != question_id => {
            warn!(question_id = %question_id, returned = id, "Store returned a different question");
            return Err(PracticeError::QuestionNotFound);
        }
        Some(_) => {}
    }

    let mut guard = session.lock().await;
    let still_there = guard
        .question(index)
        .map(|q| q.id.as_deref() == Some(question_id.as_str()))
        .unwrap_or(false);
    if !still_there {
        info!(question_id = %question_id, index, "Question list changed during fetch; dropping result");
        return Ok(false);
    }
    Ok(guard.replace_question(index, fetched))
}
