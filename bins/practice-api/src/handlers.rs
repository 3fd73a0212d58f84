// HTTP route handlers for the Practice API

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use practice_common::types::{GradingResult, Language, Question};
use practice_session::{
    awarded_score, ensure_question_loaded, progress_for_list, submission_record, ActiveView,
    ApplyResult, Classified, CustomInput, GradingPipeline, PracticeError, PracticeSession,
    ProgressStore, QuestionProgress, QuestionStore, SubmitOutcome,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{AppState, SessionEntry};

/// Error body returned by every failing handler
#[derive(Debug)]
pub enum ApiError {
    SessionNotFound(Uuid),
    BadRequest(String),
    Practice(PracticeError),
    Internal(String),
}

impl From<PracticeError> for ApiError {
    fn from(e: PracticeError) -> Self {
        ApiError::Practice(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::SessionNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("Session {} not found", id))
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            ApiError::Practice(e) => {
                let status = match &e {
                    PracticeError::MissingQuestionId => StatusCode::UNPROCESSABLE_ENTITY,
                    PracticeError::QuestionNotFound => StatusCode::NOT_FOUND,
                    PracticeError::QuestionFetch(_)
                    | PracticeError::QuestionListFetch(_)
                    | PracticeError::ProgressFetch(_)
                    | PracticeError::GradingService { .. } => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.user_message())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

async fn lookup(state: &AppState, session_id: Uuid) -> Result<Arc<SessionEntry>, ApiError> {
    let entry = state
        .sessions
        .read()
        .await
        .get(&session_id)
        .cloned()
        .ok_or(ApiError::SessionNotFound(session_id))?;
    entry.touch();
    Ok(entry)
}

#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub student_id: String,
    pub len: usize,
    pub question: Option<Question>,
    pub view: ActiveView,
}

fn snapshot(session_id: Uuid, entry: &SessionEntry, session: &PracticeSession) -> SessionSnapshot {
    SessionSnapshot {
        session_id,
        student_id: entry.student_id.clone(),
        len: session.len(),
        question: session.current_question().cloned(),
        view: session.view().clone(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub student_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub tags: String,
    /// Questions handed over by the caller; fetched from the backend when absent
    pub questions: Option<Vec<Question>>,
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub code_map: HashMap<usize, String>,
    pub initial_source: Option<String>,
}

/// POST /sessions - Start a practice run
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    if payload.student_id.trim().is_empty() {
        return Err(ApiError::BadRequest("student_id is required".to_string()));
    }

    let questions = match payload.questions {
        Some(questions) => questions,
        None => {
            state
                .backend
                .list_questions(&payload.subject, &payload.tags)
                .await?
        }
    };

    let session = PracticeSession::new(questions, payload.index, payload.code_map)
        .with_initial_source(payload.initial_source);

    let session_id = Uuid::new_v4();
    let entry = Arc::new(SessionEntry::new(
        payload.student_id.clone(),
        payload.subject,
        payload.tags,
        GradingPipeline::new(state.grader.clone(), payload.student_id),
        session,
    ));

    let body = {
        let session = entry.session.lock().await;
        info!(
            session_id = %session_id,
            student_id = %entry.student_id,
            questions = session.len(),
            "Session created"
        );
        snapshot(session_id, &entry, &session)
    };

    state.sessions.write().await.insert(session_id, entry);
    Ok((StatusCode::CREATED, Json(body)))
}

/// GET /sessions/{session_id} - Current question and view
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let entry = lookup(&state, session_id).await?;
    let session = entry.session.lock().await;
    Ok(Json(snapshot(session_id, &entry, &session)))
}

/// DELETE /sessions/{session_id}
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    match state.sessions.write().await.remove(&session_id) {
        Some(_) => {
            info!(session_id = %session_id, "Session closed");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::SessionNotFound(session_id)),
    }
}

#[derive(Debug, Deserialize)]
pub struct SetIndexRequest {
    pub index: usize,
}

/// PUT /sessions/{session_id}/index - Navigate; out-of-range indices are ignored
pub async fn set_index(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SetIndexRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let entry = lookup(&state, session_id).await?;
    let mut session = entry.session.lock().await;
    if !session.set_index(payload.index) {
        warn!(session_id = %session_id, index = payload.index, "Index out of range, ignored");
    }
    Ok(Json(snapshot(session_id, &entry, &session)))
}

#[derive(Debug, Deserialize)]
pub struct EditCodeRequest {
    pub index: Option<usize>,
    pub code: String,
}

/// PUT /sessions/{session_id}/code - Replace a code buffer (current question by default)
pub async fn edit_code(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<EditCodeRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let entry = lookup(&state, session_id).await?;
    let mut session = entry.session.lock().await;
    let index = payload.index.unwrap_or_else(|| session.current_index());
    session.edit_code(index, payload.code);
    Ok(Json(snapshot(session_id, &entry, &session)))
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub index: Option<usize>,
    #[serde(default)]
    pub language: Language,
    /// Custom stdin; custom input is disabled when absent
    pub custom_input: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub index: usize,
    pub token: u64,
    pub applied: ApplyResult,
    pub message: &'static str,
    pub raw_results: Vec<GradingResult>,
    pub results: Classified,
    pub awarded_score: Option<f64>,
    pub recorded: bool,
    pub view: ActiveView,
}

fn outcome_label(applied: ApplyResult) -> &'static str {
    match applied {
        ApplyResult::Applied => "applied",
        ApplyResult::Superseded => "superseded",
        ApplyResult::Discarded => "discarded",
    }
}

/// Persist an applied grade for the list view; returns whether it was stored
async fn record_outcome(state: &AppState, entry: &SessionEntry, outcome: &SubmitOutcome) -> bool {
    let Some(recorder) = &state.recorder else {
        return false;
    };
    let Some(question_id) = outcome.question.id.as_deref() else {
        return false;
    };

    let graded = &outcome.classified.graded;
    let awarded = awarded_score(&outcome.question, graded, outcome.awarded_score);
    let record = submission_record(question_id, graded, awarded, Utc::now());

    match recorder
        .record(&entry.subject, &entry.tags, &entry.student_id, &record)
        .await
    {
        Ok(()) => true,
        Err(e) => {
            error!(question_id, error = %e, "Failed to record submission");
            false
        }
    }
}

/// POST /sessions/{session_id}/submit - Grade a code buffer
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let entry = lookup(&state, session_id).await?;
    let index = match payload.index {
        Some(index) => index,
        None => entry.session.lock().await.current_index(),
    };
    let custom = match payload.custom_input {
        Some(input) => CustomInput::enabled(input),
        None => CustomInput::disabled(),
    };

    let started = Instant::now();
    let result = entry
        .pipeline
        .submit(&entry.session, index, payload.language, &custom)
        .await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(PracticeError::MissingQuestionId) => {
            state.metrics.record_submission("refused");
            return Err(PracticeError::MissingQuestionId.into());
        }
        Err(e) => {
            state.metrics.observe_grading(started.elapsed().as_secs_f64());
            state.metrics.record_submission("failed");
            return Err(e.into());
        }
    };
    state.metrics.observe_grading(started.elapsed().as_secs_f64());
    state.metrics.record_submission(outcome_label(outcome.applied));

    let recorded = if outcome.applied == ApplyResult::Applied {
        record_outcome(&state, &entry, &outcome).await
    } else {
        false
    };

    let view = entry.session.lock().await.view().clone();
    Ok(Json(SubmitResponse {
        index: outcome.ticket.index,
        token: outcome.ticket.token,
        applied: outcome.applied,
        message: outcome.classified.verdict().message(),
        raw_results: outcome.classified.raw.clone(),
        results: outcome.classified,
        awarded_score: outcome.awarded_score,
        recorded,
        view,
    }))
}

#[derive(Debug, Serialize)]
pub struct LoadResponse {
    pub loaded: bool,
    pub question: Option<Question>,
}

/// POST /sessions/{session_id}/questions/{index}/load - Fetch a stub question's body
pub async fn load_question(
    State(state): State<Arc<AppState>>,
    Path((session_id, index)): Path<(Uuid, usize)>,
) -> Result<Json<LoadResponse>, ApiError> {
    let entry = lookup(&state, session_id).await?;
    let loaded = ensure_question_loaded(&entry.session, index, &state.backend).await?;
    let question = entry.session.lock().await.question(index).cloned();
    Ok(Json(LoadResponse { loaded, question }))
}

async fn recorded_progress(
    state: &AppState,
    subject: &str,
    tags: &str,
    student_id: &str,
) -> Result<Vec<practice_common::types::SubmissionRecord>, PracticeError> {
    match &state.recorder {
        Some(recorder) => recorder.fetch_progress(subject, tags, student_id).await,
        None => state.backend.fetch_progress(subject, tags, student_id).await,
    }
}

/// GET /sessions/{session_id}/progress - List-view progress of the session's questions
pub async fn session_progress(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<QuestionProgress>>, ApiError> {
    let entry = lookup(&state, session_id).await?;
    let records = recorded_progress(&state, &entry.subject, &entry.tags, &entry.student_id).await?;
    let session = entry.session.lock().await;
    Ok(Json(progress_for_list(session.questions(), &records)))
}

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    pub subject: String,
    #[serde(default)]
    pub tags: String,
    #[serde(rename = "studentId")]
    pub student_id: String,
}

/// GET /progress?subject&tags&studentId - List-view progress straight from the stores
pub async fn list_progress(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProgressQuery>,
) -> Result<Json<Vec<QuestionProgress>>, ApiError> {
    let questions = state.backend.list_questions(&query.subject, &query.tags).await?;
    let records = recorded_progress(&state, &query.subject, &query.tags, &query.student_id).await?;
    Ok(Json(progress_for_list(&questions, &records)))
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus exposition
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| ApiError::Internal(format!("Failed to encode metrics: {}", e)))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}
