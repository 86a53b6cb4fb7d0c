//! Metric instrument factories.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without an exporter these are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("transcribeq")
}

/// Counter: prompt allocations.
/// Labels: `language`, `result` ("assigned" | "exhausted" | "error").
pub fn prompts_allocated() -> Counter<u64> {
    meter()
        .u64_counter("transcribeq.prompts.allocated")
        .with_description("Prompt allocation requests by outcome")
        .build()
}

/// Counter: completion attempts.
/// Labels: `language`, `result` ("ok" | "quota_exceeded" | "not_found" | "error").
pub fn transcriptions_recorded() -> Counter<u64> {
    meter()
        .u64_counter("transcribeq.transcriptions.recorded")
        .with_description("Transcription completions by outcome")
        .build()
}

/// Counter: completion transactions retried after a transient failure.
pub fn store_retries() -> Counter<u64> {
    meter()
        .u64_counter("transcribeq.store.retries")
        .with_description("Completion transactions retried after a transient failure")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation` ("prompt.allocate" | "transcription.record").
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("transcribeq.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
