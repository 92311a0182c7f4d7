use tracing::trace;

// Trace-level counters that the prometheus recorder picks up alongside the
// exporter endpoint; cheap enough to leave on in demo builds.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "scan2flip.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn inc_scans(outcome: &'static str) {
    trace!(
        target = "scan2flip.metrics",
        outcome = outcome,
        "scans_total_inc"
    );
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    trace!(
        target = "scan2flip.metrics",
        stage = stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}
