//! Append-only WAL, offset store, middleware chain, and delivery loop for
//! the kinlog event fabric's Event Bus Core.

pub mod dispatch;
pub mod dlq;
pub mod middleware;
pub mod offsets;
pub mod subscription;
pub mod wal;

pub use dispatch::{Ack, BackpressurePolicy, EventBusCore, Handler, TopicPolicy};
pub use subscription::{Backoff, Jitter, StartPosition, SubscriptionHandle, SubscriptionOptions};
