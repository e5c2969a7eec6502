//! Prometheus exposition for a finished run.

use prometheus::{Encoder, Registry, TextEncoder};

/// Registry holding every core metric.
pub fn registry() -> prometheus::Result<Registry> {
    let registry = Registry::new();
    for metric in batchconv_core::metrics::all_metrics() {
        registry.register(metric)?;
    }
    Ok(registry)
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics(registry: &Registry) -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
