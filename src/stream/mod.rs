//! Live fan-out: one upstream broadcast topic replicated to many
//! independently-filtered client streams.

mod bridge;
mod metrics;
mod registry;

pub use bridge::{FanOutBridge, StreamingConfig};
pub use metrics::STREAM_METRICS;
pub use registry::ClientRegistry;
