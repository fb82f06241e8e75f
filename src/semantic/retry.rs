//! Retry with exponential backoff around embedder calls.

use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::semantic::embeddings::{EmbedError, Embedder};

/// Backoff schedule for transient embedder failures.
///
/// `max_attempts` counts the first call, so `1` disables retries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Spread each delay by up to ±25%
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before retry number `retry` (1-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self.initial_backoff_ms as f64 * self.multiplier.powi(exp);
        let capped = delay.min(self.max_backoff_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }
        let factor = 0.75 + rand::random::<f64>() * 0.5;
        delay.mul_f64(factor)
    }

    /// Run `op`, retrying transient failures until attempts run out.
    ///
    /// Non-transient errors are returned immediately.
    pub fn run<T, F>(&self, mut op: F) -> Result<T, EmbedError>
    where
        F: FnMut() -> Result<T, EmbedError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let delay = self.jittered(self.backoff(attempt));
                    log::warn!(
                        "embedding attempt {}/{} failed: {}, retrying in {}ms",
                        attempt,
                        attempts,
                        err,
                        delay.as_millis()
                    );
                    sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        log::error!("embedding failed after {} attempts: {}", attempt, err);
                    }
                    return Err(err);
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        if !(self.multiplier.is_finite() && self.multiplier >= 1.0) {
            return Err(format!(
                "retry.multiplier must be a finite number >= 1.0, got {}",
                self.multiplier
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(format!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            ));
        }
        Ok(())
    }
}

/// An embedder whose calls go through a retry policy.
pub struct Retrying<'a, E: Embedder + ?Sized> {
    inner: &'a E,
    policy: &'a RetryPolicy,
}

impl<'a, E: Embedder + ?Sized> Retrying<'a, E> {
    pub fn new(inner: &'a E, policy: &'a RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<E: Embedder + ?Sized> Embedder for Retrying<'_, E> {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.policy.run(|| self.inner.embed(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.policy.run(|| self.inner.embed_batch(texts))
    }
}
