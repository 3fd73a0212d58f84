mod handlers;
mod metrics;
mod routes;

use axum::Router;
use chrono::Utc;
use metrics::Metrics;
use practice_common::config::PracticeConfig;
use practice_session::{
    GradingPipeline, HttpBackend, HttpGradingService, PracticeSession, RedisProgressStore,
};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

/// One learner's practice run hosted by the API
pub struct SessionEntry {
    pub student_id: String,
    pub subject: String,
    pub tags: String,
    pub pipeline: GradingPipeline<HttpGradingService>,
    pub session: Mutex<PracticeSession>,
    /// Unix seconds of the last request that touched this session
    last_seen: AtomicI64,
}

impl SessionEntry {
    pub fn new(
        student_id: String,
        subject: String,
        tags: String,
        pipeline: GradingPipeline<HttpGradingService>,
        session: PracticeSession,
    ) -> Self {
        Self {
            student_id,
            subject,
            tags,
            pipeline,
            session: Mutex::new(session),
            last_seen: AtomicI64::new(Utc::now().timestamp()),
        }
    }

    pub fn touch(&self) {
        self.last_seen.store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn last_seen(&self) -> i64 {
        self.last_seen.load(Ordering::Relaxed)
    }
}

pub struct AppState {
    pub backend: HttpBackend,
    pub grader: HttpGradingService,
    /// Submission history; absent when the API runs without Redis
    pub recorder: Option<RedisProgressStore>,
    pub metrics: Metrics,
    pub sessions: RwLock<HashMap<Uuid, Arc<SessionEntry>>>,
}

impl AppState {
    /// Drop sessions idle for longer than `ttl`; returns how many went
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        self.evict_seen_before(Utc::now().timestamp() - ttl.as_secs() as i64)
            .await
    }

    /// Drop sessions last touched before `cutoff` (unix seconds)
    pub async fn evict_seen_before(&self, cutoff: i64) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen() >= cutoff);
        before - sessions.len()
    }
}

/// Periodically evict idle sessions
fn spawn_session_sweeper(state: Arc<AppState>, ttl: Duration) {
    let period = (ttl / 4).clamp(Duration::from_secs(1), Duration::from_secs(300));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = state.evict_idle(ttl).await;
            if evicted > 0 {
                info!(evicted, "Evicted idle sessions");
            }
        }
    });
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Practice API booting...");

    let config = PracticeConfig::from_env();

    // Connect to Redis
    let client = redis::Client::open(config.redis_url.as_str())?;
    let redis_conn = ConnectionManager::new(client).await?;

    info!("Connected to Redis: {}", config.redis_url);

    let state = Arc::new(AppState {
        backend: HttpBackend::from_config(&config),
        grader: HttpGradingService::from_config(&config)?,
        recorder: Some(RedisProgressStore::new(redis_conn)),
        metrics: Metrics::new()?,
        sessions: RwLock::new(HashMap::new()),
    });

    info!(backend = %config.backend_url, timeout = ?config.grading_timeout, "Grading backend configured");

    spawn_session_sweeper(state.clone(), config.session_idle_ttl);

    // Build router
    let app = Router::new()
        .merge(routes::routes())
        .with_state(state);

    // Start server
    let listener = TcpListener::bind(&config.api_addr).await?;

    info!("HTTP server listening on {}", config.api_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
