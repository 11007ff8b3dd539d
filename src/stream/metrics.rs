//! Prometheus metrics for the live-stream fan-out

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, CounterVec, Gauge};

pub struct StreamMetrics {
    /// Currently registered live clients
    pub connected_clients: Gauge,

    /// Frames delivered to client sinks
    pub frames_delivered: CounterVec,

    /// Frames withheld by a client filter
    pub frames_filtered: CounterVec,

    /// Frames not delivered to a client (sink full or closed)
    pub frames_dropped: CounterVec,
}

lazy_static! {
    pub static ref STREAM_METRICS: StreamMetrics = StreamMetrics {
        connected_clients: register_gauge!(
            "stream_connected_clients",
            "Number of currently registered live-stream clients"
        )
        .unwrap(),

        frames_delivered: register_counter_vec!(
            "stream_frames_delivered_total",
            "Broadcast frames delivered to client sinks",
            &["topic"]
        )
        .unwrap(),

        frames_filtered: register_counter_vec!(
            "stream_frames_filtered_total",
            "Broadcast frames withheld by client filters",
            &["topic"]
        )
        .unwrap(),

        frames_dropped: register_counter_vec!(
            "stream_frames_dropped_total",
            "Broadcast frames dropped for a client",
            &["topic", "reason"]
        )
        .unwrap(),
    };
}
