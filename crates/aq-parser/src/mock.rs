//! Test parsers for exercising the orchestrator and workflow without a
//! live inference service.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use aq_protocol::{Entities, Intent, ParsedQuery};
use tokio::sync::Notify;

use crate::QueryParser;

/// Returns a fixed intent/entities/confidence for every input.
pub struct StaticParser {
    intent: Intent,
    entities: Entities,
    confidence: f64,
    calls: AtomicUsize,
}

impl StaticParser {
    pub fn new(intent: Intent, entities: Entities, confidence: f64) -> Self {
        Self {
            intent,
            entities,
            confidence,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answers `unknown` at 0.0.
    pub fn unknown() -> Self {
        Self::new(Intent::Unknown, Entities::new(), 0.0)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryParser for StaticParser {
    async fn parse(&self, text: &str) -> ParsedQuery {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ParsedQuery::new(self.intent, self.entities.clone(), self.confidence, text)
    }

    fn tier_name(&self) -> &str {
        "static"
    }
}

/// Blocks every parse until `release` is called, then delegates.
pub struct GatedParser<P> {
    inner: P,
    gate: Notify,
    released: AtomicBool,
}

impl<P: QueryParser> GatedParser<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            gate: Notify::new(),
            released: AtomicBool::new(false),
        }
    }

    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: QueryParser> QueryParser for GatedParser<P> {
    async fn parse(&self, text: &str) -> ParsedQuery {
        let notified = self.gate.notified();
        if !self.released.load(Ordering::SeqCst) {
            notified.await;
        }
        self.inner.parse(text).await
    }

    fn tier_name(&self) -> &str {
        "gated"
    }
}

/// Panics on every call; for checking that shadow failures stay contained.
pub struct PanickingParser;

#[async_trait]
impl QueryParser for PanickingParser {
    async fn parse(&self, text: &str) -> ParsedQuery {
        panic!("parser exploded on {text:?}");
    }

    fn tier_name(&self) -> &str {
        "panicking"
    }
}
