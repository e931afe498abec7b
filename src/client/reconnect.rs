use std::time::Duration;

use rand::Rng;

use crate::config::ConnectionConfig;

/// What the reconnect loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReconnectStep {
    Retry { attempt: u32, delay: Duration },
    /// Budget spent; reported to the delegate once.
    Exhausted { attempts: u32 },
    Stop,
}

/// Exponential backoff state that survives across reconnect attempts.
#[derive(Debug, Clone)]
pub(crate) struct ReconnectPolicy {
    pub(crate) enabled: bool,
    pub(crate) attempts: u32,
    pub(crate) max_attempts: u32,
    pub(crate) last_token: Option<String>,
    base_delay: Duration,
    max_delay: Duration,
    jitter: Duration,
    exhausted_reported: bool,
}

impl ReconnectPolicy {
    pub(crate) fn new(config: &ConnectionConfig) -> Self {
        Self {
            enabled: config.auto_reconnect,
            attempts: 0,
            max_attempts: config.max_reconnect_attempts,
            last_token: config.token.clone(),
            base_delay: config.reconnect_base_delay,
            max_delay: config.reconnect_max_delay,
            jitter: config.reconnect_jitter,
            exhausted_reported: false,
        }
    }

    /// `min(base * 2^(attempt-1), max)`, before jitter.
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    pub(crate) fn next_step(&mut self) -> ReconnectStep {
        if !self.enabled {
            return ReconnectStep::Stop;
        }
        if self.attempts >= self.max_attempts {
            if self.exhausted_reported {
                return ReconnectStep::Stop;
            }
            self.exhausted_reported = true;
            return ReconnectStep::Exhausted {
                attempts: self.attempts,
            };
        }

        self.attempts += 1;
        ReconnectStep::Retry {
            attempt: self.attempts,
            delay: self.backoff(self.attempts) + self.jitter(),
        }
    }

    /// Called after a successful connect.
    pub(crate) fn reset(&mut self) {
        self.attempts = 0;
        self.exhausted_reported = false;
    }

    pub(crate) fn disable(&mut self) {
        self.enabled = false;
    }
}
