// Prometheus metrics for grading submissions

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    submissions: IntCounterVec,
    grading_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let submissions = IntCounterVec::new(
            Opts::new("practice_submissions_total", "Grading submissions by outcome"),
            &["outcome"],
        )?;
        let grading_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "practice_grading_seconds",
                "Round trip to the grading service",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(grading_seconds.clone()))?;

        Ok(Self {
            registry,
            submissions,
            grading_seconds,
        })
    }

    /// Count one submission; `outcome` is applied, superseded, discarded,
    /// failed or refused
    pub fn record_submission(&self, outcome: &str) {
        self.submissions.with_label_values(&[outcome]).inc();
    }

    pub fn observe_grading(&self, seconds: f64) {
        self.grading_seconds.observe(seconds);
    }

    pub fn submissions(&self, outcome: &str) -> u64 {
        self.submissions.with_label_values(&[outcome]).get()
    }

    /// Text exposition format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
