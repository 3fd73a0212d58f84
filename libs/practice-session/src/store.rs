//! Question and progress stores.
//!
//! The practice core only consumes these; the backend that owns questions and
//! submission history is an external collaborator. Payloads are decoded into
//! validated types here, at the boundary, so nothing downstream has to guess
//! at their shape.

use async_trait::async_trait;
use practice_common::config::{PracticeConfig, PROGRESS_PATH, QUESTION_LIST_PATH, QUESTION_PATH};
use practice_common::redis as progress_keys;
use practice_common::types::{Question, SubmissionRecord};
use redis::aio::ConnectionManager;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::PracticeError;

#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Fetch one full question by identifier
    async fn fetch_question(
        &self,
        subject: &str,
        question_id: &str,
        question_type: &str,
    ) -> Result<Question, PracticeError>;

    /// All questions of a subject/tag list, in list order
    async fn list_questions(&self, subject: &str, tags: &str) -> Result<Vec<Question>, PracticeError>;
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Last submission per question for one learner; empty when none
    async fn fetch_progress(
        &self,
        subject: &str,
        tags: &str,
        student_id: &str,
    ) -> Result<Vec<SubmissionRecord>, PracticeError>;
}

#[derive(Debug, Deserialize)]
struct QuestionsEnvelope {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(rename = "codeQuestions", default)]
    code_questions: Vec<Question>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ProgressEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Value,
}

/// Accept `null`, a single record, or an array of records; records that do
/// not decode are skipped
fn decode_progress_data(data: Value) -> Vec<SubmissionRecord> {
    let items = match data {
        Value::Null => return Vec::new(),
        Value::Array(items) => items,
        single => vec![single],
    };
    items
        .into_iter()
        .enumerate()
        .filter_map(|(position, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(position, error = %e, "Skipping undecodable progress record");
                None
            }
        })
        .collect()
}

/// HTTP client for the practice backend
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &PracticeConfig) -> Self {
        Self::new(Client::new(), config.backend_url.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl QuestionStore for HttpBackend {
    async fn fetch_question(
        &self,
        subject: &str,
        question_id: &str,
        question_type: &str,
    ) -> Result<Question, PracticeError> {
        let response = self
            .client
            .get(self.url(QUESTION_PATH))
            .query(&[
                ("subject", subject),
                ("questionId", question_id),
                ("questionType", question_type),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PracticeError::QuestionFetch(e.to_string()))?;

        let envelope: QuestionsEnvelope = response
            .json()
            .await
            .map_err(|e| PracticeError::QuestionFetch(e.to_string()))?;

        debug!(question_id, found = envelope.code_questions.len(), "Question fetched");
        envelope
            .code_questions
            .into_iter()
            .next()
            .ok_or(PracticeError::QuestionNotFound)
    }

    async fn list_questions(&self, subject: &str, tags: &str) -> Result<Vec<Question>, PracticeError> {
        let response = self
            .client
            .get(self.url(QUESTION_LIST_PATH))
            .query(&[("subject", subject), ("tags", tags)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PracticeError::QuestionListFetch(e.to_string()))?;

        let envelope: QuestionsEnvelope = response
            .json()
            .await
            .map_err(|e| PracticeError::QuestionListFetch(e.to_string()))?;

        if !envelope.success {
            warn!(subject, tags, "Question list request reported failure");
            return Ok(Vec::new());
        }
        Ok(envelope.code_questions)
    }
}

#[async_trait]
impl ProgressStore for HttpBackend {
    async fn fetch_progress(
        &self,
        subject: &str,
        tags: &str,
        student_id: &str,
    ) -> Result<Vec<SubmissionRecord>, PracticeError> {
        let response = self
            .client
            .get(self.url(PROGRESS_PATH))
            .query(&[("subject", subject), ("tags", tags), ("studentId", student_id)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PracticeError::ProgressFetch(e.to_string()))?;

        let envelope: ProgressEnvelope = response
            .json()
            .await
            .map_err(|e| PracticeError::ProgressFetch(e.to_string()))?;

        if !envelope.success {
            return Ok(Vec::new());
        }
        Ok(decode_progress_data(envelope.data))
    }
}

/// Progress kept in Redis by the practice API
#[derive(Clone)]
pub struct RedisProgressStore {
    conn: ConnectionManager,
}

impl RedisProgressStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Persist (or replace) a learner's record for one question
    pub async fn record(
        &self,
        subject: &str,
        tags: &str,
        student_id: &str,
        record: &SubmissionRecord,
    ) -> Result<(), PracticeError> {
        let mut conn = self.conn.clone();
        progress_keys::store_submission(&mut conn, subject, tags, student_id, record).await?;
        debug!(question_id = %record.question_id, student_id, "Submission recorded");
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for RedisProgressStore {
    async fn fetch_progress(
        &self,
        subject: &str,
        tags: &str,
        student_id: &str,
    ) -> Result<Vec<SubmissionRecord>, PracticeError> {
        let mut conn = self.conn.clone();
        Ok(progress_keys::fetch_submissions(&mut conn, subject, tags, student_id).await?)
    }
}

/// Store backed by data already in memory, such as a question file
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    questions: Vec<Question>,
    records: Vec<SubmissionRecord>,
}

impl MemoryStore {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            records: Vec::new(),
        }
    }

    pub fn with_records(mut self, records: Vec<SubmissionRecord>) -> Self {
        self.records = records;
        self
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn fetch_question(
        &self,
        _subject: &str,
        question_id: &str,
        _question_type: &str,
    ) -> Result<Question, PracticeError> {
        self.questions
            .iter()
            .find(|q| q.id.as_deref() == Some(question_id) && !q.needs_fetch())
            .cloned()
            .ok_or(PracticeError::QuestionNotFound)
    }

    async fn list_questions(&self, _subject: &str, tags: &str) -> Result<Vec<Question>, PracticeError> {
        if tags.is_empty() {
            return Ok(self.questions.clone());
        }
        Ok(self
            .questions
            .iter()
            .filter(|q| q.tag_set().contains(&tags))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn fetch_progress(
        &self,
        _subject: &str,
        _tags: &str,
        _student_id: &str,
    ) -> Result<Vec<SubmissionRecord>, PracticeError> {
        Ok(self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> HttpBackend {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        HttpBackend::new(Client::new(), format!("http://{}/", addr))
    }

    #[test]
    fn test_progress_data_shapes() {
        assert!(decode_progress_data(Value::Null).is_empty());

        let single = decode_progress_data(json!({"questionId": "q", "results": []}));
        assert_eq!(single.len(), 1);

        let many = decode_progress_data(json!([
            {"questionId": "a"},
            {"questionId": "b", "awarded_score": 3}
        ]));
        assert_eq!(many.len(), 2);
        assert_eq!(many[1].awarded_score, Some(3.0));
    }

    #[test]
    fn test_bad_progress_record_keeps_the_rest() {
        let records = decode_progress_data(json!([
            {"questionId": "a", "results": [{"status": "Passed"}], "awarded_score": 2},
            {"results": []},
            "garbage"
        ]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question_id, "a");
        assert_eq!(records[0].passed_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_question_passes_query() {
        let router = Router::new().route(
            QUESTION_PATH,
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params["subject"], "python");
                assert_eq!(params["questionType"], "code_test");
                Json(json!({
                    "codeQuestions": [{
                        "questionId": params["questionId"],
                        "Question": "Reverse a string",
                        "Hidden_Test_Cases": null
                    }]
                }))
            }),
        );
        let backend = serve(router).await;

        let q = backend.fetch_question("python", "q-7", "code_test").await.unwrap();
        assert_eq!(q.id.as_deref(), Some("q-7"));
        assert_eq!(q.prompt.as_deref(), Some("Reverse a string"));
        assert!(q.hidden_cases.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_question_not_found() {
        let router = Router::new().route(
            QUESTION_PATH,
            get(|| async { Json(json!({"codeQuestions": []})) }),
        );
        let backend = serve(router).await;

        let err = backend.fetch_question("python", "missing", "code_test").await.unwrap_err();
        assert!(matches!(err, PracticeError::QuestionNotFound));
    }

    #[tokio::test]
    async fn test_list_and_progress() {
        let router = Router::new()
            .route(
                QUESTION_LIST_PATH,
                get(|| async {
                    Json(json!({
                        "success": true,
                        "codeQuestions": [{"questionId": "a"}, {"questionId": "b"}]
                    }))
                }),
            )
            .route(
                PROGRESS_PATH,
                get(|| async {
                    Json(json!({
                        "success": true,
                        "data": {"questionId": "b", "results": [{"status": "Passed"}], "awarded_score": 4}
                    }))
                }),
            );
        let backend = serve(router).await;

        let questions = backend.list_questions("python", "day-1:1").await.unwrap();
        assert_eq!(questions.len(), 2);

        let records = backend.fetch_progress("python", "day-1:1", "stu").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].passed_count(), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_fetch_error() {
        let router = Router::new()
            .route(
                QUESTION_PATH,
                get(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
            )
            .route(
                QUESTION_LIST_PATH,
                get(|| async { axum::http::StatusCode::BAD_GATEWAY }),
            );
        let backend = serve(router).await;

        let err = backend.fetch_question("python", "q", "code_test").await.unwrap_err();
        assert!(matches!(err, PracticeError::QuestionFetch(_)));

        let err = backend.list_questions("python", "day-1:1").await.unwrap_err();
        assert!(matches!(err, PracticeError::QuestionListFetch(_)));
        assert_eq!(err.user_message(), "Failed to fetch questions.");
    }

    #[tokio::test]
    async fn test_memory_store() {
        let full = Question {
            id: Some("a".to_string()),
            prompt: Some("Sum two numbers".to_string()),
            tags: "day-1:1, arrays".to_string(),
            ..Default::default()
        };
        let stub = Question {
            id: Some("b".to_string()),
            tags: "day-2:1".to_string(),
            ..Default::default()
        };
        let store = MemoryStore::new(vec![full.clone(), stub]);

        assert_eq!(store.fetch_question("python", "a", "code_test").await.unwrap(), full);
        // a stub cannot satisfy its own fetch
        assert!(matches!(
            store.fetch_question("python", "b", "code_test").await,
            Err(PracticeError::QuestionNotFound)
        ));

        assert_eq!(store.list_questions("python", "arrays").await.unwrap().len(), 1);
        assert_eq!(store.list_questions("python", "").await.unwrap().len(), 2);
        assert!(store.fetch_progress("python", "", "stu").await.unwrap().is_empty());
    }
}
