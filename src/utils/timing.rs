use std::time::{Duration, Instant};

use serde_json::json;

use crate::logging::{LogLevel, Logger};

/// Runs one boot step and logs how long it took.
pub fn timed_step<T>(step: &str, logger: &Logger, run: impl FnOnce() -> T) -> T {
    let started_at = Instant::now();
    let result = run();
    let elapsed = started_at.elapsed();
    logger.log(
        LogLevel::Debug,
        Some("main::boot"),
        &format!("{step} finished in {}", render(elapsed)),
        Some(json!({ "step": step, "elapsed_us": elapsed.as_micros() as u64 })),
    );
    result
}

fn render(duration: Duration) -> String {
    let total_ms = duration.as_secs_f64() * 1_000.0;
    if total_ms < 1_000.0 {
        format!("{total_ms:.2} ms")
    } else {
        format!("{:.2} s", total_ms / 1_000.0)
    }
}
