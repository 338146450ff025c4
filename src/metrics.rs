use tracing::trace;

// Counters are plain trace events on `sync.metrics`; a subscriber can
// aggregate them.

pub fn invocation_finished(outcome: &'static str) {
    trace!(target: "sync.metrics", outcome, "invocations_total_inc");
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    trace!(
        target: "sync.metrics",
        stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}

pub fn image_ingested(extension: &str, bytes: usize) {
    trace!(
        target: "sync.metrics",
        extension,
        bytes = bytes as u64,
        "images_ingested_inc"
    );
}

pub fn stale_media_failed(count: usize) {
    if count > 0 {
        trace!(
            target: "sync.metrics",
            count = count as u64,
            "stale_media_failures_inc"
        );
    }
}
