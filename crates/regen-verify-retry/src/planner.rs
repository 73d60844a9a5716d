use std::fmt;

use regen_verify_types::ErrorLevel;
use serde::Serialize;

use crate::config::RetryConfig;
use crate::prompt::PromptTemplate;

pub const MIN_STRENGTH: f64 = 10.0;
pub const MAX_STRENGTH: f64 = 100.0;
/// Points on the strength scale per unit of `strength_step`.
pub const STRENGTH_SCALE: f64 = 100.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        })
    }
}

pub fn determine_risk_level(intensity: f64) -> RiskLevel {
    if intensity >= 75.0 {
        RiskLevel::High
    } else if intensity >= 50.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Candidates requested per attempt for the given risk.
pub fn k_samples(risk: RiskLevel, config: &RetryConfig) -> usize {
    match risk {
        RiskLevel::Low => config.k_samples_default,
        RiskLevel::Medium => (config.k_samples_default + config.k_samples_high_risk).div_ceil(2),
        RiskLevel::High => config.k_samples_high_risk,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RetryStrategy {
    pub retry_number: u32,
    /// Signed delta in strength points.
    pub strength_adjustment: f64,
    pub prompt_template: PromptTemplate,
    pub reason: &'static str,
}

/// Decides the next attempt after a failed one. Returns `None` once the
/// budget is spent or when `last_error` is already acceptable.
pub fn plan_retry_strategy(
    current_attempt: u32,
    last_error: ErrorLevel,
    config: &RetryConfig,
) -> Option<RetryStrategy> {
    if current_attempt >= config.max_retries {
        return None;
    }
    let retry_number = current_attempt + 1;
    let step = config.strength_step * STRENGTH_SCALE;

    let (strength_adjustment, prompt_template, reason) = match last_error {
        ErrorLevel::Ok | ErrorLevel::P2 => return None,
        ErrorLevel::P0 => (
            -step,
            PromptTemplate::LightTexture,
            "critical error, geometry/shape changed",
        ),
        ErrorLevel::P1 if retry_number == 1 => (
            step,
            PromptTemplate::NewBackground,
            "not different enough, increasing strength",
        ),
        ErrorLevel::P1 => (
            step * 1.5,
            PromptTemplate::StrongLighting,
            "still not different, trying dramatic lighting",
        ),
    };

    Some(RetryStrategy {
        retry_number,
        strength_adjustment,
        prompt_template,
        reason,
    })
}

pub fn adjust_strength_for_retry(current: f64, adjustment: f64) -> f64 {
    (current + adjustment).clamp(MIN_STRENGTH, MAX_STRENGTH)
}
