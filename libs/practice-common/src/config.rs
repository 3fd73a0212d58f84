// Application configuration
// Every setting comes from the environment with a local-development default

use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_API_ADDR: &str = "0.0.0.0:3000";
/// Hosted sessions untouched for this long are dropped
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 2 * 60 * 60;

/// Backend endpoint paths, relative to `backend_url`
pub const QUESTION_PATH: &str = "/api/v1/question-crud";
pub const QUESTION_LIST_PATH: &str = "/api/v1/get-cpquestions";
pub const GRADING_PATH: &str = "/api/v1/test-cpsubmissions";
pub const PROGRESS_PATH: &str = "/api/v1/cp-progress";

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeConfig {
    pub backend_url: String,
    pub redis_url: String,
    pub api_addr: String,
    /// No timeout when unset; a pending grade waits for the service
    pub grading_timeout: Option<Duration>,
    pub student_id: Option<String>,
    pub session_idle_ttl: Duration,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            api_addr: DEFAULT_API_ADDR.to_string(),
            grading_timeout: None,
            student_id: None,
            session_idle_ttl: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
        }
    }
}

impl PracticeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let grading_timeout = non_empty("GRADING_TIMEOUT_SECS").and_then(|raw| {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    tracing::warn!(value = %raw, "Ignoring invalid GRADING_TIMEOUT_SECS");
                    None
                }
            }
        });

        let session_idle_ttl = non_empty("SESSION_IDLE_TTL_SECS")
            .and_then(|raw| match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    tracing::warn!(value = %raw, "Ignoring invalid SESSION_IDLE_TTL_SECS");
                    None
                }
            })
            .unwrap_or(defaults.session_idle_ttl);

        Self {
            backend_url: non_empty("PRACTICE_BACKEND_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.backend_url),
            redis_url: non_empty("REDIS_URL").unwrap_or(defaults.redis_url),
            api_addr: non_empty("PRACTICE_API_ADDR").unwrap_or(defaults.api_addr),
            grading_timeout,
            student_id: non_empty("PRACTICE_STUDENT_ID"),
            session_idle_ttl,
        }
    }

    /// Absolute URL for one of the backend paths
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.backend_url.trim_end_matches('/'), path)
    }
}
