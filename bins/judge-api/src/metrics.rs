// Prometheus counters exposed on GET /metrics

use judge_common::types::{ExecutionBackend, ExecutionMode, Verdict};
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}

pub struct Metrics {
    judgements: IntCounterVec,
    fallbacks: IntCounterVec,
    rejections: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::register(&REGISTRY)
    }

    fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let judgements = IntCounterVec::new(
            Opts::new("judge_judgements_total", "Completed judgements by mode and verdict"),
            &["mode", "verdict"],
        )?;
        let fallbacks = IntCounterVec::new(
            Opts::new("judge_fallback_total", "Judgements not served by the remote sandbox"),
            &["mode", "backend"],
        )?;
        let rejections = IntCounterVec::new(
            Opts::new("judge_rejections_total", "Requests rejected before execution"),
            &["mode", "reason"],
        )?;

        registry.register(Box::new(judgements.clone()))?;
        registry.register(Box::new(fallbacks.clone()))?;
        registry.register(Box::new(rejections.clone()))?;

        Ok(Self { judgements, fallbacks, rejections })
    }

    pub fn record_judgement(&self, mode: ExecutionMode, verdict: Verdict, backend: ExecutionBackend) {
        let mode = mode.to_string();
        self.judgements.with_label_values(&[mode.as_str(), verdict.as_str()]).inc();
        if backend != ExecutionBackend::Remote {
            let backend = backend.to_string();
            self.fallbacks.with_label_values(&[mode.as_str(), backend.as_str()]).inc();
        }
    }

    pub fn record_rejection(&self, mode: ExecutionMode, reason: &str) {
        let mode = mode.to_string();
        self.rejections.with_label_values(&[mode.as_str(), reason]).inc();
    }
}

/// Text exposition of every registered metric
pub fn gather() -> Result<String, prometheus::Error> {
    encode(&REGISTRY)
}

fn encode(registry: &Registry) -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
impl Metrics {
    /// Metrics on a private registry so tests do not collide
    pub fn isolated() -> (Self, Registry) {
        let registry = Registry::new();
        let metrics = Self::register(&registry).unwrap();
        (metrics, registry)
    }
}
