//! The event bus core: `publish`, `subscribe`, `unsubscribe`, `replay`,
//! `start`/`stop`, and the per-subscription delivery loop.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kinlog_core::envelope::Event;
use kinlog_core::error::{BackpressureError, EnvelopeError, PublishError, StorageError, SubscribeError};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::dlq::{self, DeadLetterRecord};
use crate::middleware::{AuthorizationMiddleware, FilterMiddleware, HandleContext, HandleOutcome, MiddlewareChain};
use crate::offsets::OffsetStore;
use crate::subscription::{StartPosition, SubscriptionHandle, SubscriptionOptions};
use crate::wal::{self, WalRecord, WalWriter};

/// Per-topic knobs the bus cares about at publish time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    Block,
    Shed,
}

#[derive(Debug, Clone, Copy)]
pub struct TopicPolicy {
    pub fsync: bool,
    pub backpressure: BackpressurePolicy,
    pub rotate_bytes: u64,
}

impl Default for TopicPolicy {
    fn default() -> Self {
        Self {
            fsync: true,
            backpressure: BackpressurePolicy::Block,
            rotate_bytes: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Ack,
    Nack,
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, event: &Event) -> Ack;
}

struct Subscription {
    tx: mpsc::Sender<WalRecord>,
    open: Arc<AtomicBool>,
}

/// Tracks offsets dispatched to a subscription's workers but not yet
/// resolved (acked, nacked-to-DLQ, denied, or filtered out), so a commit
/// never advances past one still being handled: with `workers > 1`, two
/// offsets can finish out of order, and the higher one finishing first must
/// not commit past the lower one still in flight.
#[derive(Default)]
struct InflightOffsets {
    pending: BTreeSet<u64>,
    max_dispatched: Option<u64>,
}

impl InflightOffsets {
    fn dispatch(&mut self, offset: u64) {
        self.pending.insert(offset);
        self.max_dispatched = Some(self.max_dispatched.map_or(offset, |m| m.max(offset)));
    }

    /// Marks `offset` resolved and returns the new safe commit point, if
    /// any offset is now safe to commit past.
    fn complete(&mut self, offset: u64) -> Option<u64> {
        self.pending.remove(&offset);
        match self.pending.iter().next() {
            Some(&lowest) => lowest.checked_sub(1),
            None => self.max_dispatched,
        }
    }
}

pub struct EventBusCore {
    wal_root: PathBuf,
    offset_store: Arc<OffsetStore>,
    dlq_root: PathBuf,
    policies: AsyncMutex<HashMap<String, TopicPolicy>>,
    writers: AsyncMutex<HashMap<String, WalWriter>>,
    subscriptions: AsyncMutex<HashMap<(String, String), Subscription>>,
    running: AtomicBool,
}

impl EventBusCore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            wal_root: root.join(".bus/wal"),
            offset_store: Arc::new(OffsetStore::new(root.join(".bus/offsets"))),
            dlq_root: root.join(".bus/dlq"),
            policies: AsyncMutex::new(HashMap::new()),
            writers: AsyncMutex::new(HashMap::new()),
            subscriptions: AsyncMutex::new(HashMap::new()),
            running: AtomicBool::new(true),
        }
    }

    /// Resume accepting publishes after a `stop`. A freshly constructed bus
    /// is already running, so `start` only matters after `stop` force-closed
    /// it.
    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Stop accepting new publishes, then give every open subscription up to
    /// `deadline_ms` to drain its inflight queue before force-closing it.
    /// Subscriptions that still have undelivered events in their queue past
    /// the deadline are closed anyway; those events remain in the WAL at
    /// their committed offset and are redelivered on the next `subscribe`
    /// catch-up scan.
    pub async fn stop(&self, deadline_ms: u64) {
        self.running.store(false, Ordering::Release);
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(deadline_ms);
        loop {
            let drained = {
                let subs = self.subscriptions.lock().await;
                subs.values().all(|sub| sub.tx.capacity() == sub.tx.max_capacity())
            };
            if drained || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let subs = self.subscriptions.lock().await;
        for sub in subs.values() {
            sub.open.store(false, Ordering::Release);
        }
    }

    pub async fn declare_topic(&self, topic: impl Into<String>, policy: TopicPolicy) {
        self.policies.lock().await.insert(topic.into(), policy);
    }

    /// The committed cursor for `(topic, group)`, if the group has ever
    /// acked or skipped an event. Exposed for callers (tests, operational
    /// tooling) that need to observe delivery progress without reaching
    /// into the bus's internals.
    pub fn committed_offset(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Option<crate::offsets::OffsetRecord>, StorageError> {
        self.offset_store.load(topic, group)
    }

    /// Roll up bus health from whether it is accepting publishes and how
    /// much dead-letter backlog has accumulated across every topic.
    pub fn health(&self) -> kinlog_core::health::HealthCheck {
        use kinlog_core::health::HealthCheck;
        if !self.running.load(Ordering::Acquire) {
            return HealthCheck::degraded("event_bus", "stopped");
        }
        match dlq::count_all(&self.dlq_root) {
            Ok(0) => HealthCheck::healthy("event_bus"),
            Ok(n) => HealthCheck::degraded("event_bus", format!("{n} events in dead-letter queues"))
                .with_metadata("dlq_count", serde_json::json!(n)),
            Err(e) => HealthCheck::unhealthy("event_bus", e.to_string()),
        }
    }

    async fn policy_for(&self, topic: &str) -> TopicPolicy {
        self.policies
            .lock()
            .await
            .get(topic)
            .copied()
            .unwrap_or_default()
    }

    /// Validate, append to the WAL, and fan out to every live subscription
    /// on the event's topic. Returns the committed offset.
    pub async fn publish(&self, event: Event) -> Result<u64, PublishError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(PublishError::Stopped);
        }
        event.meta.validate().map_err(PublishError::Envelope)?;
        if !event.hash_matches_payload() {
            return Err(PublishError::Envelope(EnvelopeError::HashMismatch));
        }
        let policy = self.policy_for(&event.meta.topic).await;
        let offset = {
            let mut writers = self.writers.lock().await;
            let writer = match writers.get_mut(&event.meta.topic) {
                Some(w) => w,
                None => {
                    let w = WalWriter::open(&self.wal_root, &event.meta.topic, policy.rotate_bytes)
                        .map_err(PublishError::Storage)?;
                    writers.insert(event.meta.topic.clone(), w);
                    writers.get_mut(&event.meta.topic).expect("just inserted")
                }
            };
            writer
                .append(event.meta.clone(), event.payload.clone(), policy.fsync)
                .map_err(PublishError::Storage)?
        };

        let record = WalRecord {
            offset,
            meta: event.meta.clone(),
            payload: event.payload.clone(),
        };
        let subs = self.subscriptions.lock().await;
        for ((topic, _group), sub) in subs.iter() {
            if topic != &event.meta.topic || !sub.open.load(Ordering::Acquire) {
                continue;
            }
            match policy.backpressure {
                BackpressurePolicy::Block => {
                    if sub.tx.send(record.clone()).await.is_err() {
                        return Err(PublishError::Backpressure(BackpressureError::QueueFull {
                            topic: topic.clone(),
                            group: _group.clone(),
                        }));
                    }
                }
                BackpressurePolicy::Shed => {
                    if sub.tx.try_send(record.clone()).is_err() {
                        tracing::warn!(topic = %topic, "shedding event: subscription queue full");
                    }
                }
            }
        }
        Ok(offset)
    }

    /// Register a durable consumer group. Catches up from WAL segments
    /// starting at the group's committed offset (or `opts.start`), then
    /// attaches to the live fanout for subsequent publishes.
    pub async fn subscribe(
        &self,
        topic: impl Into<String>,
        group: impl Into<String>,
        handler: Arc<dyn Handler>,
        opts: SubscriptionOptions,
    ) -> Result<SubscriptionHandle, SubscribeError> {
        let topic = topic.into();
        let group = group.into();
        let key = (topic.clone(), group.clone());
        {
            let subs = self.subscriptions.lock().await;
            if subs.contains_key(&key) {
                return Err(SubscribeError::DuplicateGroup { topic, group });
            }
        }

        let committed = self
            .offset_store
            .load(&topic, &group)
            .ok()
            .flatten()
            .map(|r| r.committed + 1)
            .unwrap_or(0);
        let from_offset = match opts.start {
            StartPosition::Earliest => 0,
            StartPosition::Latest => committed,
            StartPosition::Offset(k) => k,
        };

        let catch_up = read_from_offset(&self.wal_root, &topic, from_offset)
            .map_err(|e| SubscribeError::InvalidOptions { reason: e.to_string() })?;

        let (tx, rx) = mpsc::channel::<WalRecord>(opts.max_inflight.max(1));

        let open = Arc::new(AtomicBool::new(true));
        let rx = Arc::new(AsyncMutex::new(rx));
        let authz = AuthorizationMiddleware {
            allowed_bands: opts.allowed_bands.clone(),
            allowed_obligations: opts.allowed_obligations.clone(),
        };
        let chain = Arc::new(MiddlewareChain::standard(authz));
        let filter_mw = Arc::new(FilterMiddleware {
            filters: opts.filters.clone(),
        });
        let offset_store = self.offset_store.clone();
        let dlq_root = self.dlq_root.clone();
        let wal_root = self.wal_root.clone();
        let inflight = Arc::new(Mutex::new(InflightOffsets::default()));
        let opts = Arc::new(opts);

        for _ in 0..opts.workers.max(1) {
            let rx = rx.clone();
            let handler = handler.clone();
            let chain = chain.clone();
            let filter_mw = filter_mw.clone();
            let offset_store = offset_store.clone();
            let dlq_root = dlq_root.clone();
            let wal_root = wal_root.clone();
            let inflight = inflight.clone();
            let opts = opts.clone();
            let topic = topic.clone();
            let group = group.clone();
            let open = open.clone();
            tokio::spawn(async move {
                loop {
                    let record = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    let Some(record) = record else { break };
                    if !open.load(Ordering::Acquire) {
                        break;
                    }
                    inflight.lock().expect("inflight offsets poisoned").dispatch(record.offset);
                    deliver_one(
                        &topic,
                        &group,
                        record,
                        &handler,
                        &chain,
                        &filter_mw,
                        &offset_store,
                        &wal_root,
                        &dlq_root,
                        &inflight,
                        &opts,
                    )
                    .await;
                }
            });
        }

        // Fed after the workers are already polling, and awaited rather than
        // `try_send`, so a backed-up group's catch-up scan applies
        // backpressure on this call instead of silently dropping records
        // once the channel fills past `max_inflight`.
        for record in catch_up {
            if tx.send(record).await.is_err() {
                break;
            }
        }

        self.subscriptions
            .lock()
            .await
            .insert(key, Subscription { tx, open });

        Ok(SubscriptionHandle { topic, group })
    }

    /// Detach a subscription. Workers finish their current delivery, then
    /// exit once the channel drains (no further events are enqueued).
    pub async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), SubscribeError> {
        let key = (handle.topic, handle.group);
        let mut subs = self.subscriptions.lock().await;
        match subs.remove(&key) {
            Some(sub) => {
                sub.open.store(false, Ordering::Release);
                Ok(())
            }
            None => Err(SubscribeError::UnknownHandle),
        }
    }

    /// Reposition `(topic, group)`'s cursor. Takes effect the next time the
    /// group is subscribed (the catch-up scan reads from the new offset).
    pub async fn replay(&self, topic: &str, group: &str, from_offset: u64) -> Result<(), SubscribeError> {
        let segment = wal::list_segments(&self.wal_root, topic)
            .map_err(|e| SubscribeError::InvalidOptions { reason: e.to_string() })?
            .last()
            .copied()
            .unwrap_or(0);
        let prior = from_offset.saturating_sub(1);
        self.offset_store
            .commit(topic, group, prior, segment)
            .map_err(|e| SubscribeError::InvalidOptions { reason: e.to_string() })?;
        Ok(())
    }
}

fn read_from_offset(root: &std::path::Path, topic: &str, from_offset: u64) -> Result<Vec<WalRecord>, StorageError> {
    let mut out = Vec::new();
    for seq in wal::list_segments(root, topic)? {
        let path = root.join(format!("{topic}.{seq:08}.jsonl"));
        for record in wal::read_segment(&path)? {
            if record.offset >= from_offset {
                out.push(record);
            }
        }
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
async fn deliver_one(
    topic: &str,
    group: &str,
    record: WalRecord,
    handler: &Arc<dyn Handler>,
    chain: &Arc<MiddlewareChain>,
    filter_mw: &Arc<FilterMiddleware>,
    offset_store: &Arc<OffsetStore>,
    wal_root: &Path,
    dlq_root: &Path,
    inflight: &Arc<Mutex<InflightOffsets>>,
    opts: &Arc<SubscriptionOptions>,
) {
    let event = Event::new(record.meta, record.payload);
    let ctx = HandleContext {
        topic,
        group,
        offset: record.offset,
        event: &event,
    };

    if chain.run_before_handle(&ctx).await.is_err() {
        chain.run_on_error(&ctx, "authorization denied").await;
        resolve(inflight, offset_store, wal_root, topic, group, record.offset);
        return;
    }

    if !filter_mw.admits(&event) {
        // Filtered-out events still advance the cursor: delivered-but-ignored.
        resolve(inflight, offset_store, wal_root, topic, group, record.offset);
        return;
    }

    let mut rng = rand::thread_rng();
    let mut attempt = 0u32;
    loop {
        let deadline = opts
            .ack_deadline_ms
            .map(std::time::Duration::from_millis)
            .unwrap_or(std::time::Duration::from_secs(3600));
        let outcome = tokio::time::timeout(deadline, handler.handle(&event)).await;
        match outcome {
            Ok(Ack::Ack) => {
                chain.run_after_handle(&ctx, HandleOutcome::Acked).await;
                resolve(inflight, offset_store, wal_root, topic, group, record.offset);
                return;
            }
            Ok(Ack::Nack) | Err(_) => {
                if attempt >= opts.max_retries {
                    let now = chrono::Utc::now();
                    let _ = dlq::append(
                        dlq_root,
                        &DeadLetterRecord {
                            topic: topic.to_string(),
                            original_offset: record.offset,
                            event: event.clone(),
                            first_error_ts: now,
                            last_error_ts: now,
                            retries: attempt,
                            final_error: "max_retries exceeded".to_string(),
                        },
                    );
                    chain.run_after_handle(&ctx, HandleOutcome::Nacked).await;
                    resolve(inflight, offset_store, wal_root, topic, group, record.offset);
                    return;
                }
                chain.run_on_error(&ctx, "handler nack or timeout").await;
                let sleep_ms = opts.backoff.sleep_ms(attempt, &mut rng);
                tokio::time::sleep(std::time::Duration::from_millis(sleep_ms)).await;
                attempt += 1;
            }
        }
    }
}

/// Marks `offset` resolved in `inflight` and commits only as far as that
/// leaves safe, per `InflightOffsets::complete`.
fn resolve(
    inflight: &Arc<Mutex<InflightOffsets>>,
    offset_store: &Arc<OffsetStore>,
    wal_root: &Path,
    topic: &str,
    group: &str,
    offset: u64,
) {
    let safe = inflight.lock().expect("inflight offsets poisoned").complete(offset);
    if let Some(safe) = safe {
        commit(offset_store, wal_root, topic, group, safe);
    }
}

fn commit(offset_store: &Arc<OffsetStore>, wal_root: &Path, topic: &str, group: &str, offset: u64) {
    let segment = wal::list_segments(wal_root, topic)
        .ok()
        .and_then(|segs| segs.last().copied())
        .unwrap_or(0);
    if let Err(err) = offset_store.commit(topic, group, offset, segment) {
        tracing::error!(topic, group, offset, %err, "offset commit failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinlog_core::envelope::{Actor, Band, EventMeta, EventType, Hashes, Qos};
    use kinlog_core::ids::{ActorDeviceId, ActorPersonId, EntityIdType, EventId, SpaceId, TraceId};
    use std::sync::atomic::AtomicUsize;

    fn sample_event(topic: &str) -> Event {
        let meta = EventMeta {
            event_id: EventId::generate(),
            topic: topic.to_string(),
            event_type: EventType::new("HIPPO_ENCODE"),
            space_id: SpaceId::now_v7(),
            ts: 0,
            actor: Actor::new(ActorPersonId::now_v7(), ActorDeviceId::now_v7()),
            band: Band::Green,
            obligations: vec![],
            policy_version: "v1".to_string(),
            qos: Qos::new(0.5),
            hashes: Hashes { payload_sha256: [0u8; 32] },
            signature: None,
            trace_id: TraceId::now_v7(),
            idempotency_key: None,
            ttl_ms: None,
            mls_group: None,
        };
        Event::new(meta, serde_json::json!({"n": 1})).with_computed_hash()
    }

    fn sample_event_payload(topic: &str, n: u32) -> Event {
        let mut event = sample_event(topic);
        event.payload = serde_json::json!({"n": n});
        event.with_computed_hash()
    }

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl Handler for CountingHandler {
        async fn handle(&self, _event: &Event) -> Ack {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ack::Ack
        }
    }

    struct AlwaysNack;

    #[async_trait]
    impl Handler for AlwaysNack {
        async fn handle(&self, _event: &Event) -> Ack {
            Ack::Nack
        }
    }

    #[tokio::test]
    async fn publish_then_subscribe_delivers_and_commits() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBusCore::new(dir.path());
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(CountingHandler(count.clone()));
        let mut opts = SubscriptionOptions::default();
        opts.start = StartPosition::Earliest;
        bus.subscribe("topic.a", "group-1", handler, opts).await.unwrap();
        bus.publish(sample_event("topic.a")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn publish_after_stop_is_rejected_until_restarted() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBusCore::new(dir.path());
        bus.stop(50).await;
        let err = bus.publish(sample_event("topic.a")).await.unwrap_err();
        assert!(matches!(err, PublishError::Stopped));
        bus.start();
        assert!(bus.publish(sample_event("topic.a")).await.is_ok());
    }

    #[tokio::test]
    async fn health_is_healthy_when_running_with_no_dlq_backlog() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBusCore::new(dir.path());
        assert_eq!(bus.health().status, kinlog_core::health::HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn health_is_degraded_once_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBusCore::new(dir.path());
        bus.stop(10).await;
        assert_eq!(bus.health().status, kinlog_core::health::HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn duplicate_subscription_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBusCore::new(dir.path());
        let handler = Arc::new(CountingHandler(Arc::new(AtomicUsize::new(0))));
        bus.subscribe("topic.a", "group-1", handler.clone(), SubscriptionOptions::default())
            .await
            .unwrap();
        let err = bus
            .subscribe("topic.a", "group-1", handler, SubscriptionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SubscribeError::DuplicateGroup { .. }));
    }

    #[tokio::test]
    async fn exhausted_retries_go_to_dlq_and_offset_still_advances() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBusCore::new(dir.path());
        let mut opts = SubscriptionOptions::default();
        opts.start = StartPosition::Earliest;
        opts.max_retries = 1;
        opts.backoff.base_ms = 1;
        opts.backoff.max_ms = 1;
        bus.subscribe("topic.a", "group-1", Arc::new(AlwaysNack), opts)
            .await
            .unwrap();
        bus.publish(sample_event("topic.a")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let dlq_records = dlq::read_all(&dir.path().join(".bus/dlq"), "topic.a").unwrap();
        assert_eq!(dlq_records.len(), 1);
        let offset = bus.offset_store.load("topic.a", "group-1").unwrap().unwrap();
        assert_eq!(offset.committed, 0);
    }

    #[tokio::test]
    async fn subscription_denies_a_band_on_the_real_delivery_path() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBusCore::new(dir.path());
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(CountingHandler(count.clone()));
        let mut opts = SubscriptionOptions::default();
        opts.start = StartPosition::Earliest;
        opts.allowed_bands = [Band::Amber].into_iter().collect();
        bus.subscribe("topic.a", "group-1", handler, opts).await.unwrap();
        bus.publish(sample_event("topic.a")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0, "a Green event is denied before the handler runs");
        let offset = bus.offset_store.load("topic.a", "group-1").unwrap().unwrap();
        assert_eq!(offset.committed, 0, "a denied event still advances the cursor");
    }

    struct DelayedThenAck {
        delay_ms: u64,
        acked: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler for DelayedThenAck {
        async fn handle(&self, event: &Event) -> Ack {
            let n = event.payload.get("n").and_then(|v| v.as_u64()).unwrap_or(0);
            if n == 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            }
            self.acked.fetch_add(1, Ordering::SeqCst);
            Ack::Ack
        }
    }

    #[tokio::test]
    async fn commit_never_advances_past_an_unacked_lower_offset_with_multiple_workers() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBusCore::new(dir.path());
        let acked = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(DelayedThenAck {
            delay_ms: 150,
            acked: acked.clone(),
        });
        let mut opts = SubscriptionOptions::default();
        opts.start = StartPosition::Earliest;
        opts.workers = 2;
        opts.max_inflight = 8;
        bus.subscribe("topic.a", "group-1", handler, opts).await.unwrap();
        bus.publish(sample_event_payload("topic.a", 0)).await.unwrap();
        bus.publish(sample_event_payload("topic.a", 1)).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        assert_eq!(acked.load(Ordering::SeqCst), 1, "only the fast offset has acked so far");
        assert!(
            bus.offset_store.load("topic.a", "group-1").unwrap().is_none(),
            "nothing commits while the lower offset is still in flight"
        );

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(acked.load(Ordering::SeqCst), 2);
        let offset = bus.offset_store.load("topic.a", "group-1").unwrap().unwrap();
        assert_eq!(offset.committed, 1, "both offsets are resolved, so the cursor advances past the higher one");
    }
}
