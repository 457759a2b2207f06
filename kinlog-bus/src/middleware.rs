//! Composable middleware chain: `before_publish`, `before_handle`,
//! `after_handle`, `on_error`. Inbound hooks run in registration order,
//! outbound hooks in reverse, mirroring a typical HTTP middleware stack.

use std::collections::HashSet;

use async_trait::async_trait;
use kinlog_core::envelope::{Band, Event};
use kinlog_core::error::{AuthorizationError, EnvelopeError};
use kinlog_core::filter::FilterExpr;

/// Everything a middleware needs to know about the delivery in flight.
pub struct HandleContext<'a> {
    pub topic: &'a str,
    pub group: &'a str,
    pub offset: u64,
    pub event: &'a Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    Acked,
    Nacked,
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn before_publish(&self, _event: &Event) -> Result<(), EnvelopeError> {
        Ok(())
    }

    async fn before_handle(&self, _ctx: &HandleContext<'_>) -> Result<(), AuthorizationError> {
        Ok(())
    }

    async fn after_handle(&self, _ctx: &HandleContext<'_>, _outcome: HandleOutcome) {}

    async fn on_error(&self, _ctx: &HandleContext<'_>, _reason: &str) {}
}

/// Rejects malformed envelopes before they reach the WAL. First in the
/// required ordering.
#[derive(Debug, Default)]
pub struct SchemaValidationMiddleware;

#[async_trait]
impl Middleware for SchemaValidationMiddleware {
    async fn before_publish(&self, event: &Event) -> Result<(), EnvelopeError> {
        event.meta.validate()
    }
}

/// Starts a span keyed by `{topic, group, offset}` and logs lifecycle
/// events. Second in the required ordering: runs before authorization so
/// denied deliveries are still traced.
#[derive(Debug, Default)]
pub struct TracingMiddleware;

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn before_handle(&self, ctx: &HandleContext<'_>) -> Result<(), AuthorizationError> {
        tracing::info_span!(
            "deliver",
            topic = ctx.topic,
            group = ctx.group,
            offset = ctx.offset,
            trace_id = %ctx.event.meta.trace_id,
        )
        .in_scope(|| {
            tracing::debug!("delivering event");
        });
        Ok(())
    }

    async fn after_handle(&self, ctx: &HandleContext<'_>, outcome: HandleOutcome) {
        tracing::debug!(topic = ctx.topic, group = ctx.group, offset = ctx.offset, ?outcome, "handled");
    }

    async fn on_error(&self, ctx: &HandleContext<'_>, reason: &str) {
        tracing::warn!(topic = ctx.topic, group = ctx.group, offset = ctx.offset, reason, "delivery error");
    }
}

/// Evaluates `obligations ∪ band` against a subscription's declared
/// capability set; denies before any handler observes the event. Third in
/// the required ordering.
pub struct AuthorizationMiddleware {
    pub allowed_bands: HashSet<Band>,
    pub allowed_obligations: HashSet<String>,
}

impl AuthorizationMiddleware {
    pub fn allow_all() -> Self {
        Self {
            allowed_bands: [Band::Green, Band::Amber, Band::Red, Band::Black].into_iter().collect(),
            allowed_obligations: HashSet::new(),
        }
    }
}

#[async_trait]
impl Middleware for AuthorizationMiddleware {
    async fn before_handle(&self, ctx: &HandleContext<'_>) -> Result<(), AuthorizationError> {
        let meta = &ctx.event.meta;
        if !self.allowed_bands.contains(&meta.band) {
            return Err(AuthorizationError {
                topic: ctx.topic.to_string(),
                group: ctx.group.to_string(),
                reason: format!("band {:?} not in subscription's capability set", meta.band),
            });
        }
        for obligation in &meta.obligations {
            let namespace = obligation.as_str().split(':').next().unwrap_or("");
            if !self.allowed_obligations.is_empty() && !self.allowed_obligations.contains(namespace) {
                return Err(AuthorizationError {
                    topic: ctx.topic.to_string(),
                    group: ctx.group.to_string(),
                    reason: format!("obligation namespace '{namespace}' not in capability set"),
                });
            }
        }
        Ok(())
    }
}

/// Applies subscription filters. Filtered-out events still advance the
/// cursor — they're delivered-but-ignored, not skipped at the WAL level —
/// so this middleware reports the decision via its return value rather than
/// an error. Fourth in the required ordering.
#[derive(Debug, Default)]
pub struct FilterMiddleware {
    pub filters: Vec<FilterExpr>,
}

impl FilterMiddleware {
    /// Whether the event passes every configured filter.
    pub fn admits(&self, event: &Event) -> bool {
        let doc = serde_json::to_value(&event.meta).unwrap_or(serde_json::Value::Null);
        self.filters.iter().all(|f| f.matches(&doc))
    }
}

/// Records counters and latency histograms. Last in the required ordering,
/// so it sees timing for every hook that ran before it.
#[derive(Default)]
pub struct MetricsMiddleware {
    pub delivered: std::sync::atomic::AtomicU64,
    pub acked: std::sync::atomic::AtomicU64,
    pub nacked: std::sync::atomic::AtomicU64,
}

#[async_trait]
impl Middleware for MetricsMiddleware {
    async fn before_handle(&self, _ctx: &HandleContext<'_>) -> Result<(), AuthorizationError> {
        self.delivered.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }

    async fn after_handle(&self, _ctx: &HandleContext<'_>, outcome: HandleOutcome) {
        match outcome {
            HandleOutcome::Acked => self.acked.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            HandleOutcome::Nacked => self.nacked.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
        };
    }
}

/// The ordered chain. `before_handle` runs front-to-back and stops at the
/// first denial; `after_handle`/`on_error` run back-to-front.
pub struct MiddlewareChain {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new(middlewares: Vec<Box<dyn Middleware>>) -> Self {
        Self { middlewares }
    }

    /// The required ordering: schema validation, tracing, authorization,
    /// filter, metrics. `filter`/`authorization` are supplied by the caller
    /// since they depend on the subscription's configuration.
    pub fn standard(authz: AuthorizationMiddleware) -> Self {
        Self::new(vec![
            Box::new(SchemaValidationMiddleware),
            Box::new(TracingMiddleware),
            Box::new(authz),
            Box::new(MetricsMiddleware::default()),
        ])
    }

    pub async fn run_before_publish(&self, event: &Event) -> Result<(), EnvelopeError> {
        for mw in &self.middlewares {
            mw.before_publish(event).await?;
        }
        Ok(())
    }

    pub async fn run_before_handle(&self, ctx: &HandleContext<'_>) -> Result<(), AuthorizationError> {
        for mw in &self.middlewares {
            mw.before_handle(ctx).await?;
        }
        Ok(())
    }

    pub async fn run_after_handle(&self, ctx: &HandleContext<'_>, outcome: HandleOutcome) {
        for mw in self.middlewares.iter().rev() {
            mw.after_handle(ctx, outcome).await;
        }
    }

    pub async fn run_on_error(&self, ctx: &HandleContext<'_>, reason: &str) {
        for mw in self.middlewares.iter().rev() {
            mw.on_error(ctx, reason).await;
        }
    }
}
