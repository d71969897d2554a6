//! Pure reconnection decision logic for the bridge
//!
//! This module contains the backoff configuration and the pure functions
//! the bridge consults between reconnection attempts.

use super::state::ConnectionState;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Bounded exponential backoff for reconnection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Maximum number of reconnection attempts per connection loss
    pub max_attempts: u32,
    /// Delay before the first attempt in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay in milliseconds
    pub max_delay_ms: u64,
    /// Growth factor applied per attempt
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 250,
            max_delay_ms: 8000,
            multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// One immediate attempt, then give up
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            multiplier: 1.0,
        }
    }

    /// Delay before attempt `attempt` (1-based): `min(initial * multiplier^(n-1), max)`
    pub fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        if !delay.is_finite() || delay >= self.max_delay_ms as f64 {
            self.max_delay_ms
        } else {
            delay as u64
        }
    }

    /// Sum of all backoff delays for a full attempt cycle
    pub fn calculate_max_total_time(&self) -> u64 {
        (1..=self.max_attempts)
            .map(|attempt| self.calculate_backoff_delay(attempt))
            .fold(0u64, u64::saturating_add)
    }

    /// Validate reconnection configuration (pure function)
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("reconnect.max_attempts must be at least 1".to_string());
        }

        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err("reconnect.multiplier must be a finite number >= 1.0".to_string());
        }

        if self.initial_delay_ms > self.max_delay_ms {
            return Err(format!(
                "reconnect.initial_delay_ms ({}) must not exceed reconnect.max_delay_ms ({})",
                self.initial_delay_ms, self.max_delay_ms
            ));
        }

        Ok(())
    }
}

/// Decision result for reconnection attempts
#[derive(Debug, PartialEq)]
pub enum ReconnectionDecision {
    /// Proceed with reconnection attempt
    Proceed { attempt: u32, delay_ms: u64 },
    /// Abort reconnection - shutdown requested
    AbortShutdownRequested,
    /// Abort reconnection - max attempts exceeded
    AbortMaxAttemptsExceeded,
}

/// Pure reconnection decision logic
pub struct ReconnectPolicy;

impl ReconnectPolicy {
    /// Determine if another attempt should be made after `current_attempts` failures
    pub fn should_attempt_reconnection(
        current_attempts: u32,
        config: &ReconnectConfig,
        shutdown_requested: bool,
    ) -> ReconnectionDecision {
        if shutdown_requested {
            return ReconnectionDecision::AbortShutdownRequested;
        }

        if current_attempts >= config.max_attempts {
            return ReconnectionDecision::AbortMaxAttemptsExceeded;
        }

        ReconnectionDecision::Proceed {
            attempt: current_attempts + 1,
            delay_ms: config.calculate_backoff_delay(current_attempts + 1),
        }
    }

    /// Log connection state transition (pure logging function)
    pub fn log_state_transition(from: &ConnectionState, to: &ConnectionState) {
        match (from, to) {
            (ConnectionState::Connecting, ConnectionState::Connected) => {
                info!("Bridge connected");
            }
            (ConnectionState::Connected, ConnectionState::Reconnecting(_)) => {
                warn!("Bridge lost its connection, reconnecting");
            }
            (ConnectionState::Reconnecting(_), ConnectionState::Connected) => {
                info!("Reconnection successful");
            }
            (ConnectionState::Reconnecting(attempt), ConnectionState::Disconnected) => {
                error!(attempts = attempt, "Bridge gave up reconnecting");
            }
            _ => {
                info!("Bridge connection state: {} -> {}", from, to);
            }
        }
    }

    /// Sleep for `delay`, returning early with `false` if shutdown is signalled
    pub async fn interruptible_sleep(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
        if *shutdown.borrow() {
            return false;
        }
        if delay.is_zero() {
            return true;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            changed = shutdown.changed() => match changed {
                Ok(()) => !*shutdown.borrow(),
                // Sender gone: nobody can request shutdown any more
                Err(_) => {
                    tokio::time::sleep(delay).await;
                    true
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay_ms, 250);
        assert_eq!(config.max_delay_ms, 8000);
        assert_eq!(config.multiplier, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_calculate_backoff_delay() {
        let config = ReconnectConfig::default();

        assert_eq!(config.calculate_backoff_delay(1), 250);
        assert_eq!(config.calculate_backoff_delay(2), 500);
        assert_eq!(config.calculate_backoff_delay(3), 1000);
        assert_eq!(config.calculate_backoff_delay(5), 4000);
        assert_eq!(config.calculate_backoff_delay(6), 8000);
        assert_eq!(config.calculate_backoff_delay(50), 8000);
        assert_eq!(config.calculate_backoff_delay(u32::MAX), 8000);
    }

    #[test]
    fn test_single_attempt_has_no_delay() {
        let config = ReconnectConfig::single_attempt();
        assert!(config.validate().is_ok());
        assert_eq!(config.calculate_backoff_delay(1), 0);
        assert_eq!(config.calculate_max_total_time(), 0);
    }

    #[test]
    fn test_calculate_max_total_time() {
        let config = ReconnectConfig::default();
        assert_eq!(config.calculate_max_total_time(), 250 + 500 + 1000 + 2000 + 4000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_attempts = ReconnectConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(zero_attempts.validate().is_err());

        let shrinking = ReconnectConfig {
            multiplier: 0.5,
            ..Default::default()
        };
        assert!(shrinking.validate().is_err());

        let inverted = ReconnectConfig {
            initial_delay_ms: 10_000,
            max_delay_ms: 100,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_should_attempt_reconnection() {
        let config = ReconnectConfig::default();

        assert_eq!(
            ReconnectPolicy::should_attempt_reconnection(0, &config, false),
            ReconnectionDecision::Proceed {
                attempt: 1,
                delay_ms: 250
            }
        );
        assert_eq!(
            ReconnectPolicy::should_attempt_reconnection(4, &config, false),
            ReconnectionDecision::Proceed {
                attempt: 5,
                delay_ms: 4000
            }
        );
        assert_eq!(
            ReconnectPolicy::should_attempt_reconnection(5, &config, false),
            ReconnectionDecision::AbortMaxAttemptsExceeded
        );
        assert_eq!(
            ReconnectPolicy::should_attempt_reconnection(0, &config, true),
            ReconnectionDecision::AbortShutdownRequested
        );
    }

    #[tokio::test]
    async fn test_interruptible_sleep_aborts_on_shutdown() {
        let (tx, mut rx) = watch::channel(false);

        let sleeper = tokio::spawn(async move {
            ReconnectPolicy::interruptible_sleep(Duration::from_secs(30), &mut rx).await
        });

        tx.send(true).unwrap();
        let completed = tokio::time::timeout(Duration::from_secs(5), sleeper)
            .await
            .unwrap()
            .unwrap();
        assert!(!completed);
    }

    #[tokio::test]
    async fn test_interruptible_sleep_completes() {
        let (_tx, mut rx) = watch::channel(false);
        assert!(ReconnectPolicy::interruptible_sleep(Duration::from_millis(5), &mut rx).await);
    }
}
