//! Settle policy between `delete` and the recreating `put`.
//!
//! Remote deletes are eventually consistent. A [`SettleConfig`] either waits a
//! fixed interval once, or polls until the resource reports 404 with
//! exponential backoff between polls.

use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// How to wait for a deleted resource to disappear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleMode {
    /// Sleep `base_delay` once and proceed.
    Fixed,
    /// Poll until absent, sleeping with backoff between polls.
    Poll,
}

/// Configuration for the settle phase of replace semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct SettleConfig {
    pub mode: SettleMode,
    /// Maximum number of polls (ignored for `Fixed`).
    pub max_attempts: u32,
    /// First delay; the whole delay for `Fixed`.
    pub base_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_factor: f64,
    /// Maximum delay between polls.
    pub max_delay: Duration,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            mode: SettleMode::Poll,
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            backoff_factor: 1.5,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl SettleConfig {
    /// Single fixed pause, as the provisioning scripts did.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            mode: SettleMode::Fixed,
            base_delay: delay,
            ..Default::default()
        }
    }

    /// Poll without sleeping (tests).
    pub fn immediate() -> Self {
        Self {
            mode: SettleMode::Poll,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Wait until `is_absent` reports true, or fail with [`Error::Settle`].
    ///
    /// Retryable poll failures (network, throttling, 5xx) count as an attempt
    /// and polling continues; any other failure is returned as is. `url` is
    /// only used for log and error messages.
    pub fn wait_until_absent<F>(&self, url: &str, mut is_absent: F) -> Result<()>
    where
        F: FnMut() -> Result<bool>,
    {
        if self.mode == SettleMode::Fixed {
            thread::sleep(self.base_delay);
            return Ok(());
        }

        for attempt in 0..self.max_attempts {
            match is_absent() {
                Ok(true) => {
                    log::debug!("{url} absent after {} poll(s)", attempt + 1);
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    log::warn!("polling {url} failed, will retry: {e}");
                }
                Err(e) => return Err(e),
            }
            let delay = self.delay_for_attempt(attempt);
            log::debug!("{url} still present, polling again in {delay:?}");
            thread::sleep(delay);
        }

        Err(Error::Settle {
            url: url.to_string(),
            attempts: self.max_attempts,
        })
    }
}
