//! Process metrics endpoint support

use prometheus::{Encoder, TextEncoder};

use crate::error::{AppError, Result};

/// Render the default registry in the prometheus text format
pub fn render() -> Result<String> {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(format!("Metrics encoding failed: {}", e)))?;
    String::from_utf8(buffer).map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_produces_text() {
        // Touch a metric so the registry is non-empty
        crate::broker::BROKER_METRICS
            .messages_consumed
            .with_label_values(&["test"])
            .inc();

        let body = render().unwrap();
        assert!(body.contains("broker_messages_consumed_total"));
    }
}
