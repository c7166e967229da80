//! Backoff policy and the three named presets.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Parameters governing how many times an operation is retried and how
/// long to wait between attempts.
///
/// Immutable once built; pass it by reference to every run. In config
/// files delays are written in milliseconds:
///
/// ```json
/// { "max_retries": 3, "base_delay_ms": 1000, "max_delay_ms": 10000,
///   "backoff_factor": 2.0, "jitter": true }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt. 0 = run once.
    pub max_retries: u32,

    /// Delay before the first retry.
    #[serde(rename = "base_delay_ms", with = "duration_ms")]
    pub base_delay: Duration,

    /// Upper bound on any single delay.
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,

    /// Growth per attempt. Must be greater than 1.0.
    pub backoff_factor: f64,

    /// Scale each delay by a random factor in `[0.5, 1.0)` so that many
    /// clients failing together don't retry in lockstep.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::api_call()
    }
}

impl RetryPolicy {
    /// Factor substituted when a configured one is unusable.
    pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

    /// Background session refresh: 2 retries, 500 ms base, 5 s cap.
    pub fn session_refresh() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_factor: Self::DEFAULT_BACKOFF_FACTOR,
            jitter: true,
        }
    }

    /// Ordinary authenticated API calls: 3 retries, 1 s base, 10 s cap.
    pub fn api_call() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_factor: Self::DEFAULT_BACKOFF_FACTOR,
            jitter: true,
        }
    }

    /// Password sign-in: 1 retry, 2 s base, 5 s cap, no jitter.
    ///
    /// Kept conservative so a bad password doesn't hammer the auth
    /// service or trip its lockout.
    pub fn auth() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
            backoff_factor: Self::DEFAULT_BACKOFF_FACTOR,
            jitter: false,
        }
    }

    /// Fix any out-of-range values so the policy is safe to use.
    ///
    /// Rules:
    /// - a non-finite `backoff_factor`, or one `<= 1.0`, becomes
    ///   [`Self::DEFAULT_BACKOFF_FACTOR`].
    /// - `max_delay` is raised to `base_delay` if it is smaller.
    pub fn validated(mut self) -> Self {
        if !self.backoff_factor.is_finite() || self.backoff_factor <= 1.0 {
            warn!(
                factor = self.backoff_factor,
                "backoff_factor must be > 1.0, using default"
            );
            self.backoff_factor = Self::DEFAULT_BACKOFF_FACTOR;
        }
        if self.max_delay < self.base_delay {
            warn!(
                base = ?self.base_delay,
                max = ?self.max_delay,
                "max_delay below base_delay, raising cap"
            );
            self.max_delay = self.base_delay;
        }
        self
    }

    /// Total attempts a run may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Un-jittered delay after attempt `attempt_index` (0-based) fails.
    ///
    /// `min(max_delay, base_delay * backoff_factor^attempt_index)`
    pub fn backoff_delay(&self, attempt_index: u32) -> Duration {
        let exponent = i32::try_from(attempt_index).unwrap_or(i32::MAX);
        let raw = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        // `f64::min` ignores NaN, so the cap always wins for degenerate input.
        let capped = raw.min(self.max_delay.as_secs_f64()).max(0.0);
        Duration::from_secs_f64(capped)
    }

    /// The delay actually slept after attempt `attempt_index` fails.
    pub fn sleep_delay(&self, attempt_index: u32) -> Duration {
        let delay = self.backoff_delay(attempt_index);
        if self.jitter {
            let scale: f64 = rand::rng().random_range(0.5..1.0);
            delay.mul_f64(scale)
        } else {
            delay
        }
    }

    /// Un-jittered delays between consecutive attempts, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_retries).map(|i| self.backoff_delay(i)).collect()
    }
}

/// Serde adapter: `Duration` ⇄ integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_match_documented_values() {
        let refresh = RetryPolicy::session_refresh();
        assert_eq!(refresh.max_retries, 2);
        assert_eq!(refresh.base_delay, Duration::from_millis(500));
        assert_eq!(refresh.max_delay, Duration::from_secs(5));
        assert!(refresh.jitter);

        let api = RetryPolicy::api_call();
        assert_eq!(api.max_retries, 3);
        assert_eq!(api.base_delay, Duration::from_secs(1));
        assert_eq!(api.max_delay, Duration::from_secs(10));

        let auth = RetryPolicy::auth();
        assert_eq!(auth.max_retries, 1);
        assert_eq!(auth.base_delay, Duration::from_secs(2));
        assert_eq!(auth.max_delay, Duration::from_secs(5));
        assert!(!auth.jitter);
    }

    #[test]
    fn test_backoff_delay_doubles_then_caps() {
        let policy = RetryPolicy {
            max_retries: 6,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
            jitter: false,
        };
        let millis: Vec<u128> = policy.schedule().iter().map(Duration::as_millis).collect();
        assert_eq!(millis, vec![1000, 2000, 4000, 8000, 10000, 10000]);
    }

    #[test]
    fn test_sleep_delay_with_jitter_stays_in_half_to_full_range() {
        let policy = RetryPolicy::api_call();
        for attempt in 0..3 {
            let full = policy.backoff_delay(attempt);
            for _ in 0..50 {
                let slept = policy.sleep_delay(attempt);
                assert!(slept >= full / 2, "{slept:?} < half of {full:?}");
                assert!(slept <= full, "{slept:?} > {full:?}");
            }
        }
    }

    #[test]
    fn test_validated_replaces_non_growing_factor() {
        let policy = RetryPolicy {
            backoff_factor: 1.0,
            ..RetryPolicy::auth()
        }
        .validated();
        assert_eq!(policy.backoff_factor, RetryPolicy::DEFAULT_BACKOFF_FACTOR);

        let policy = RetryPolicy {
            backoff_factor: f64::NAN,
            ..RetryPolicy::auth()
        }
        .validated();
        assert_eq!(policy.backoff_factor, RetryPolicy::DEFAULT_BACKOFF_FACTOR);
    }

    #[test]
    fn test_validated_raises_cap_to_base() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(1),
            ..RetryPolicy::api_call()
        }
        .validated();
        assert_eq!(policy.max_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_max_attempts_zero_retries_runs_once() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::auth()
        };
        assert_eq!(policy.max_attempts(), 1);
        assert!(policy.schedule().is_empty());
    }

    #[test]
    fn test_policy_json_uses_millisecond_fields() {
        let json = r#"{ "max_retries": 4, "base_delay_ms": 250, "jitter": false }"#;
        let policy: RetryPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        // Unspecified fields fall back to the api-call preset.
        assert_eq!(policy.max_delay, Duration::from_secs(10));
        assert!(!policy.jitter);

        let out = serde_json::to_value(&policy).unwrap();
        assert_eq!(out["base_delay_ms"], 250);
    }
}
