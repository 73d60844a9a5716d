use std::time::Duration;

use regen_verify_types::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Fraction of the full strength range moved per retry.
    pub strength_step: f64,
    pub k_samples_default: usize,
    pub k_samples_high_risk: usize,
    /// Deadline for one generator call; `None` waits indefinitely.
    pub generation_timeout_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            strength_step: 0.15,
            k_samples_default: 3,
            k_samples_high_risk: 4,
            generation_timeout_ms: None,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.strength_step.is_finite() || self.strength_step <= 0.0 || self.strength_step > 1.0
        {
            return Err(ConfigError::invalid(
                "strength_step",
                self.strength_step,
                "a fraction in (0, 1]",
            ));
        }
        if self.k_samples_default == 0 {
            return Err(ConfigError::invalid(
                "k_samples_default",
                self.k_samples_default,
                "at least one sample",
            ));
        }
        if self.k_samples_high_risk == 0 {
            return Err(ConfigError::invalid(
                "k_samples_high_risk",
                self.k_samples_high_risk,
                "at least one sample",
            ));
        }
        if self.generation_timeout_ms == Some(0) {
            return Err(ConfigError::invalid(
                "generation_timeout_ms",
                0,
                "a positive number of milliseconds",
            ));
        }
        Ok(())
    }

    pub fn generation_timeout(&self) -> Option<Duration> {
        self.generation_timeout_ms.map(Duration::from_millis)
    }
}
