//! Event backbone for a vehicle test-fleet platform.
//!
//! Three concerns live here:
//!
//! - **Reliable consumption** ([`broker`]): keyed producers plus a subscriber
//!   wrapper giving every message bounded retries and a `<topic>.dlq`
//!   dead-letter fallback, with per-partition ordering and at-least-once
//!   delivery.
//! - **Issue workflow** ([`workflow`]): a static lifecycle state machine over
//!   issue records, every committed transition backed by an immutable audit
//!   record and serialized per issue via optimistic concurrency.
//! - **Live fan-out** ([`stream`] + the SSE endpoint in [`api`]): one shared
//!   subscription on the broadcast topic replicated to many
//!   independently-filtered viewer streams.

pub mod api;
pub mod broker;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod stream;
pub mod workflow;

pub use config::Config;
pub use error::{AppError, Result};
