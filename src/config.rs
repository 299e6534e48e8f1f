//! Observer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for the observer core and its runtime.
///
/// Missing fields take their defaults when deserializing, so a host can ship
/// a partial JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Quiet period after the last low-confidence trigger before detection runs.
    pub quiescence_window_ms: u64,
    /// Maximum characters of content shown in an alert summary.
    pub summary_max_chars: usize,
    /// Payload of `AccessDenied` events when the platform gives no reason.
    pub denial_message: String,
    /// Max queued runtime commands before low-confidence triggers are dropped.
    pub command_queue_capacity: usize,
    /// Per-stream buffer capacity for `EventStream` subscribers.
    pub stream_capacity: usize,
    /// Optional fallback poll: enqueue a low-confidence trigger on every tick.
    pub poll_interval_ms: Option<u64>,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            quiescence_window_ms: 300,
            summary_max_chars: 60,
            denial_message: "Clipboard is unavailable in the background; open the app to allow access".to_string(),
            command_queue_capacity: 1024,
            stream_capacity: 1024,
            poll_interval_ms: None,
        }
    }
}

impl ObserverConfig {
    const MAX_QUIESCENCE_MS: u64 = 60_000;
    const MIN_POLL_INTERVAL_MS: u64 = 50; // tighter polling defeats the debounce window

    /// Parses a JSON document, then validates it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        cfg.validate()
    }

    /// Rejects degenerate values.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.quiescence_window_ms == 0 || self.quiescence_window_ms > Self::MAX_QUIESCENCE_MS {
            return Err(out_of_range(
                "quiescence_window_ms",
                format!("must be in 1..={} (got {})", Self::MAX_QUIESCENCE_MS, self.quiescence_window_ms),
            ));
        }

        if self.summary_max_chars == 0 {
            return Err(out_of_range("summary_max_chars", "must be positive".to_string()));
        }

        if self.command_queue_capacity == 0 {
            return Err(out_of_range("command_queue_capacity", "must be positive".to_string()));
        }

        if self.stream_capacity == 0 {
            return Err(out_of_range("stream_capacity", "must be positive".to_string()));
        }

        if let Some(poll) = self.poll_interval_ms {
            if poll < Self::MIN_POLL_INTERVAL_MS {
                return Err(out_of_range(
                    "poll_interval_ms",
                    format!("must be at least {} (got {poll})", Self::MIN_POLL_INTERVAL_MS),
                ));
            }
            // Each tick is a low-confidence trigger; ticks inside one window
            // would keep pushing the deadline out.
            if poll <= self.quiescence_window_ms {
                return Err(out_of_range(
                    "poll_interval_ms",
                    format!(
                        "must exceed quiescence_window_ms ({}) (got {poll})",
                        self.quiescence_window_ms
                    ),
                ));
            }
        }

        Ok(self)
    }

    /// The quiescence window as a chrono duration.
    #[must_use]
    pub fn quiescence_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.quiescence_window_ms).unwrap_or(i64::MAX))
    }

    /// The fallback poll interval, if enabled.
    #[must_use]
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(Duration::from_millis)
    }
}

fn out_of_range(field: &str, reason: String) -> ConfigError {
    ConfigError::OutOfRange {
        field: field.to_string(),
        reason,
    }
}
