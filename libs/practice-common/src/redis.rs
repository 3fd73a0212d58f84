use crate::types::SubmissionRecord;
use redis::{AsyncCommands, RedisResult};
use std::collections::HashMap;

/// Redis key semantics for persisted practice progress
/// Keeps the API and any other reader agreeing on where records live

pub const PROGRESS_PREFIX: &str = "practice:progress";

/// Records are kept for 90 days after the last submission in a list
pub const PROGRESS_TTL_SECONDS: i64 = 90 * 24 * 60 * 60;

/// Hash key holding one learner's records for a subject/tag list
/// Subject is lowercased so `Python` and `python` share a list
pub fn progress_key(subject: &str, tags: &str, student_id: &str) -> String {
    format!(
        "{}:{}:{}:{}",
        PROGRESS_PREFIX,
        subject.trim().to_lowercase(),
        tags.trim(),
        student_id.trim()
    )
}

fn serialization_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string()))
}

/// Store (or replace) the record for one question
/// HSET keyed by question id, so a newer submission overwrites the older one
pub async fn store_submission(
    conn: &mut redis::aio::ConnectionManager,
    subject: &str,
    tags: &str,
    student_id: &str,
    record: &SubmissionRecord,
) -> RedisResult<()> {
    let key = progress_key(subject, tags, student_id);
    let payload = serde_json::to_string(record).map_err(serialization_error)?;

    let _: () = conn.hset(&key, &record.question_id, payload).await?;
    let _: () = conn.expire(&key, PROGRESS_TTL_SECONDS).await?;

    Ok(())
}

/// Fetch every record of a list, ordered by question id
/// Entries that no longer decode are skipped with a warning
pub async fn fetch_submissions(
    conn: &mut redis::aio::ConnectionManager,
    subject: &str,
    tags: &str,
    student_id: &str,
) -> RedisResult<Vec<SubmissionRecord>> {
    let key = progress_key(subject, tags, student_id);
    let entries: HashMap<String, String> = conn.hgetall(&key).await?;

    Ok(decode_records(entries))
}

fn decode_records<I>(entries: I) -> Vec<SubmissionRecord>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut records: Vec<SubmissionRecord> = entries
        .into_iter()
        .filter_map(|(question_id, payload)| {
            match serde_json::from_str::<SubmissionRecord>(&payload) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(question_id = %question_id, error = %e, "Skipping undecodable progress record");
                    None
                }
            }
        })
        .collect();
    records.sort_by(|a, b| a.question_id.cmp(&b.question_id));
    records
}
