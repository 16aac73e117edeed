//! Backoff configuration for blocking waits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a waiter backs off while polling a pending marker.
///
/// The pause before poll `n` is `(n - spin_iterations) / ramp_divisor`
/// milliseconds, clamped to `0..=max_sleep_ms`. The first polls only yield,
/// then the pause grows linearly until it reaches the cap.
///
/// Deserializes with defaults for missing fields, so a host can embed it in
/// its own configuration file:
///
/// ```toml
/// [stall]
/// max_sleep_ms = 50
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StallPolicy {
    /// Polls that yield without sleeping.
    pub spin_iterations: u32,
    /// Polls per extra millisecond of sleep once spinning is over.
    pub ramp_divisor: u32,
    /// Upper bound on a single pause.
    pub max_sleep_ms: u64,
}

impl StallPolicy {
    /// Pause to take before poll number `wait_count` (starting at zero).
    pub fn pause_for(&self, wait_count: u32) -> Duration {
        let ramp = wait_count.saturating_sub(self.spin_iterations) / self.ramp_divisor.max(1);
        Duration::from_millis(u64::from(ramp).min(self.max_sleep_ms))
    }
}

impl Default for StallPolicy {
    fn default() -> Self {
        Self {
            spin_iterations: 64,
            ramp_divisor: 16,
            max_sleep_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spins_before_sleeping() {
        let policy = StallPolicy::default();
        assert_eq!(policy.pause_for(0), Duration::ZERO);
        assert_eq!(policy.pause_for(64), Duration::ZERO);
        assert_eq!(policy.pause_for(79), Duration::ZERO);
        assert_eq!(policy.pause_for(80), Duration::from_millis(1));
    }

    #[test]
    fn ramps_linearly_to_cap() {
        let policy = StallPolicy::default();
        assert_eq!(policy.pause_for(64 + 16 * 50), Duration::from_millis(50));
        assert_eq!(policy.pause_for(64 + 16 * 100), Duration::from_millis(100));
        assert_eq!(policy.pause_for(u32::MAX), Duration::from_millis(100));
    }

    #[test]
    fn zero_divisor_is_treated_as_one() {
        let policy = StallPolicy {
            spin_iterations: 0,
            ramp_divisor: 0,
            max_sleep_ms: 10,
        };
        assert_eq!(policy.pause_for(3), Duration::from_millis(3));
        assert_eq!(policy.pause_for(30), Duration::from_millis(10));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let policy: StallPolicy = serde_json::from_str(r#"{ "max_sleep_ms": 5 }"#).unwrap();
        assert_eq!(policy.max_sleep_ms, 5);
        assert_eq!(policy.spin_iterations, 64);
        assert_eq!(policy.ramp_divisor, 16);
    }
}
