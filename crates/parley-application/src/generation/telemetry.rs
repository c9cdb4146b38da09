//! Generation timing.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Formats an elapsed duration for display, e.g. `"3.4s"`.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}

/// Generation durations recorded per finalized message id.
#[derive(Debug, Default)]
pub struct GenerationTelemetry {
    times: Mutex<HashMap<String, Duration>>,
}

impl GenerationTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, message_id: &str, elapsed: Duration) {
        self.lock().insert(message_id.to_string(), elapsed);
    }

    pub fn get(&self, message_id: &str) -> Option<Duration> {
        self.lock().get(message_id).copied()
    }

    pub fn clear(&self, message_id: &str) {
        self.lock().remove(message_id);
    }

    pub fn clear_many<'a>(&self, message_ids: impl IntoIterator<Item = &'a str>) {
        let mut times = self.lock();
        for id in message_ids {
            times.remove(id);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Duration>> {
        self.times
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(3_440)), "3.4s");
        assert_eq!(format_elapsed(Duration::ZERO), "0.0s");
    }

    #[test]
    fn test_clear_many() {
        let telemetry = GenerationTelemetry::new();
        telemetry.record("a", Duration::from_secs(1));
        telemetry.record("b", Duration::from_secs(2));
        telemetry.record("c", Duration::from_secs(3));

        telemetry.clear_many(["a", "b"]);
        assert_eq!(telemetry.get("a"), None);
        assert_eq!(telemetry.get("c"), Some(Duration::from_secs(3)));
    }
}
