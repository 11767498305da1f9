//! Duration formatting and timing helpers for log fields.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Two-decimal rendering with an automatic unit, e.g. `1.50s` or `250.00µs`.
pub fn fmt_duration(d: Duration) -> String {
    format!("{d:.2?}")
}

/// Await `fut`, warning when it took longer than `threshold`.
///
/// Measured on tokio's clock, so paused-time tests see virtual durations.
pub async fn timed<F: Future>(label: &str, threshold: Duration, fut: F) -> (F::Output, Duration) {
    let start = Instant::now();
    let output = fut.await;
    let elapsed = start.elapsed();
    if elapsed > threshold {
        warn!(
            operation = label,
            duration = fmt_duration(elapsed),
            threshold = fmt_duration(threshold),
            "Slow operation"
        );
    }
    (output, elapsed)
}
