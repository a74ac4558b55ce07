use crate::{config, error::EtlError};
use std::time::Duration;
use tracing::warn;

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&config::Retry::default())
    }
}

impl From<&config::Retry> for RetryPolicy {
    fn from(cfg: &config::Retry) -> Self {
        Self {
            max_retries: cfg.max_retries,
            delay: Duration::from_secs(cfg.delay_seconds),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Runs `op` until it succeeds or the attempts run out. `op` receives the
    /// 1-based attempt number. Returns the value and the attempt that produced it.
    pub fn run<T, F>(&self, label: &str, mut op: F) -> Result<(T, u32), EtlError>
    where
        F: FnMut(u32) -> Result<T, EtlError>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(v) => return Ok((v, attempt)),
                Err(err) if attempt < max_attempts => {
                    warn!(
                        "{label}: attempt {attempt}/{max_attempts} failed: {err}; retrying in {:?}",
                        self.delay
                    );
                    if !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
