//! Reconnect policy with capped exponential back-off.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Controls how a dropped endpoint is reconnected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    #[serde(default = "d_base_delay")]
    pub base_delay_ms: u64,
    /// Cap on the delay between attempts.
    #[serde(default = "d_max_delay")]
    pub max_delay_ms: u64,
    /// Consecutive attempts before the endpoint is abandoned.
    #[serde(default = "d_max_attempts")]
    pub max_attempts: u32,
    /// How long a reconnected endpoint must stay up before its attempt
    /// counter is reset.
    #[serde(default = "d_stable_threshold")]
    pub stable_threshold_ms: u64,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_delay() -> u64 {
    10_000
}
fn d_max_delay() -> u64 {
    60_000
}
fn d_max_attempts() -> u32 {
    50
}
fn d_stable_threshold() -> u64 {
    10_000
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: d_base_delay(),
            max_delay_ms: d_max_delay(),
            max_attempts: d_max_attempts(),
            stable_threshold_ms: d_stable_threshold(),
        }
    }
}

impl ReconnectPolicy {
    /// `min(base * 2^attempt, max)`, saturating.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay_ms = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    /// Whether `attempt` previous attempts exhaust the policy.
    pub fn should_give_up(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    pub fn stable_threshold(&self) -> Duration {
        Duration::from_millis(self.stable_threshold_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_values() {
        let p = ReconnectPolicy::default();
        assert_eq!(p.base_delay_ms, 10_000);
        assert_eq!(p.max_delay_ms, 60_000);
        assert_eq!(p.max_attempts, 50);
        assert_eq!(p.stable_threshold(), Duration::from_secs(10));
    }

    #[test]
    fn delay_sequence_is_capped() {
        let p = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..6).map(|a| p.delay_for_attempt(a).as_secs()).collect();
        assert_eq!(delays, vec![10, 20, 40, 60, 60, 60]);
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let p = ReconnectPolicy::default();
        assert_eq!(p.delay_for_attempt(63), Duration::from_secs(60));
        assert_eq!(p.delay_for_attempt(64), Duration::from_secs(60));
        assert_eq!(p.delay_for_attempt(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn gives_up_at_max_attempts() {
        let p = ReconnectPolicy::default();
        assert!(!p.should_give_up(49));
        assert!(p.should_give_up(50));
        assert!(p.should_give_up(51));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let p: ReconnectPolicy = serde_json::from_str(r#"{"base_delay_ms": 5}"#).unwrap();
        assert_eq!(p.base_delay_ms, 5);
        assert_eq!(p.max_attempts, 50);
    }
}
