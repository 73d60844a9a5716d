use std::sync::Arc;

use regen_verify_scorer::{PreparedOriginal, RasterLoader};
use regen_verify_types::{CandidateId, ConfigError, ErrorLevel, QualityResult, RasterSample};
use serde::Serialize;
use thiserror::Error;

use crate::config::RetryConfig;
use crate::generator::{CandidateGenerator, GenerationError, GenerationRequest};
use crate::planner::{
    MAX_STRENGTH, MIN_STRENGTH, adjust_strength_for_retry, determine_risk_level, k_samples,
    plan_retry_strategy,
};
use crate::prompt::{PromptTemplate, render_prompt};
use crate::rerank::{RankedCandidate, RerankOutcome, Reranker};

/// Similarity percentage below which a result counts as distinct enough.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 70.0;

/// The image being regenerated: a caller-facing reference plus its pixels.
#[derive(Clone, Debug)]
pub struct SourceImage {
    pub reference: String,
    pub raster: RasterSample,
}

impl SourceImage {
    pub fn new(reference: impl Into<String>, raster: RasterSample) -> Self {
        Self {
            reference: reference.into(),
            raster,
        }
    }
}

/// Final choice of one orchestration run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub url: CandidateId,
    pub original_url: String,
    pub similarity: f64,
    pub difference: f64,
    pub ssim: f64,
    pub phash_distance: u32,
    pub edge_score: f64,
    pub geom_delta: Option<f64>,
    pub quality_score: f64,
    pub error_level: ErrorLevel,
    pub error_reasons: Vec<String>,
    pub strength_used: f64,
    pub retry_count: u32,
    pub generation_mode: PromptTemplate,
}

impl GenerationResult {
    fn from_candidate(
        candidate: &RankedCandidate,
        original: &SourceImage,
        strength: f64,
        attempt: u32,
        template: PromptTemplate,
    ) -> Self {
        let scores = &candidate.quality.scores;
        Self {
            url: candidate.id.clone(),
            original_url: original.reference.clone(),
            similarity: 100.0 - scores.ssim_diff * 100.0,
            difference: scores.ssim_diff * 100.0,
            ssim: scores.ssim,
            phash_distance: scores.phash_distance,
            edge_score: scores.edge_score,
            geom_delta: scores.geom_delta,
            quality_score: scores.overall_score,
            error_level: candidate.quality.error_level,
            error_reasons: candidate.quality.reasons.clone(),
            strength_used: strength,
            retry_count: attempt,
            generation_mode: template,
        }
    }

    pub fn meets_minimum_difference(&self, threshold: f64) -> bool {
        self.similarity < threshold
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum RetryOutcome {
    Accepted(GenerationResult),
    ExhaustedBestEffort(GenerationResult),
}

impl RetryOutcome {
    pub fn result(&self) -> &GenerationResult {
        match self {
            RetryOutcome::Accepted(result) | RetryOutcome::ExhaustedBestEffort(result) => result,
        }
    }

    pub fn into_result(self) -> GenerationResult {
        match self {
            RetryOutcome::Accepted(result) | RetryOutcome::ExhaustedBestEffort(result) => result,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, RetryOutcome::Accepted(_))
    }
}

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("no viable candidate after {attempts} attempt(s){}", last_failure_suffix(.last_failure))]
    NoViableCandidate {
        attempts: u32,
        last_failure: Option<String>,
    },

    #[error("initial strength {0} is not a finite number")]
    InvalidStrength(f64),
}

fn last_failure_suffix(last_failure: &Option<String>) -> String {
    match last_failure {
        Some(failure) => format!(": {failure}"),
        None => String::new(),
    }
}

/// Why an attempt produced nothing to rank.
#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("none of the {count} candidate(s) could be loaded")]
    Unloadable { count: usize },

    #[error("candidate scoring task failed: {0}")]
    Scoring(String),
}

enum State {
    Attempting {
        attempt: u32,
        strength: f64,
        template: PromptTemplate,
    },
    Accepted(GenerationResult),
    ExhaustedBestEffort(GenerationResult),
    Failed(RetryError),
}

/// Best rejected candidate without shape drift, kept across attempts.
/// Verified geometry outranks an unlocated subject regardless of score.
struct Fallback {
    verified: bool,
    score: f64,
    result: GenerationResult,
}

impl Fallback {
    fn outranks(&self, candidate: &RankedCandidate) -> bool {
        let verified = candidate.quality.scores.geom_delta.is_some();
        (self.verified, self.score) >= (verified, candidate.score)
    }
}

const UNLOCATED_SUBJECT: &str = "subject geometry could not be verified";

/// Drives generate, rerank and replan until a candidate is accepted or the
/// retry budget runs out. Attempts run strictly one after another.
pub struct RetryManager {
    config: RetryConfig,
    reranker: Reranker,
    loader: Arc<dyn RasterLoader>,
}

impl RetryManager {
    pub fn new(
        config: RetryConfig,
        reranker: Reranker,
        loader: Arc<dyn RasterLoader>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            reranker,
            loader,
        })
    }

    pub async fn execute_with_retry<G>(
        &self,
        generator: &G,
        original: &SourceImage,
        initial_strength: f64,
        description: &str,
        logo_text: &str,
    ) -> Result<RetryOutcome, RetryError>
    where
        G: CandidateGenerator,
    {
        if !initial_strength.is_finite() {
            return Err(RetryError::InvalidStrength(initial_strength));
        }
        let risk = determine_risk_level(initial_strength);
        let k = k_samples(risk, &self.config);
        let prepared = Arc::new(self.reranker.prepare(&original.raster));

        let mut fallback: Option<Fallback> = None;
        let mut last_failure: Option<String> = None;
        let mut state = State::Attempting {
            attempt: 0,
            strength: initial_strength.clamp(MIN_STRENGTH, MAX_STRENGTH),
            template: PromptTemplate::LightTexture,
        };

        loop {
            let (attempt, strength, template) = match state {
                State::Attempting {
                    attempt,
                    strength,
                    template,
                } => (attempt, strength, template),
                State::Accepted(result) => return Ok(RetryOutcome::Accepted(result)),
                State::ExhaustedBestEffort(result) => {
                    return Ok(RetryOutcome::ExhaustedBestEffort(result));
                }
                State::Failed(error) => return Err(error),
            };
            let attempts = attempt + 1;
            tracing::info!(
                attempt = attempts,
                strength,
                template = %template,
                k,
                risk = %risk,
                generator = generator.name(),
                "starting generation attempt"
            );

            let request = GenerationRequest {
                attempt,
                strength,
                template,
                prompt: render_prompt(template, description, strength, logo_text),
                k,
            };
            let last_level = match self.attempt(generator, request, &prepared).await {
                Ok(outcome) => {
                    if let Some(best) = outcome.best() {
                        let result = GenerationResult::from_candidate(
                            best, original, strength, attempt, template,
                        );
                        tracing::info!(
                            attempt = attempts,
                            candidate = %result.url,
                            level = %result.error_level,
                            score = best.score,
                            "candidate accepted"
                        );
                        state = State::Accepted(result);
                        continue;
                    }
                    for candidate in &outcome.rejected {
                        if !is_fallback_eligible(&candidate.quality) {
                            continue;
                        }
                        if fallback.as_ref().is_some_and(|kept| kept.outranks(candidate)) {
                            continue;
                        }
                        fallback = Some(Fallback {
                            verified: candidate.quality.scores.geom_delta.is_some(),
                            score: candidate.score,
                            result: GenerationResult::from_candidate(
                                candidate, original, strength, attempt, template,
                            ),
                        });
                    }
                    let level = outcome
                        .rejected
                        .iter()
                        .map(|candidate| candidate.quality.error_level)
                        .min();
                    level.map(|level| (level, subject_unlocated(&outcome.rejected, level)))
                }
                Err(error) => {
                    tracing::warn!(attempt = attempts, error = %error, "generation attempt failed");
                    last_failure = Some(error.to_string());
                    None
                }
            };

            state = match last_level {
                Some((level, unlocated)) => match plan_retry_strategy(
                    attempt,
                    level,
                    &self.config,
                ) {
                    Some(strategy) => {
                        let reason = if unlocated {
                            UNLOCATED_SUBJECT
                        } else {
                            strategy.reason
                        };
                        tracing::info!(
                            retry = strategy.retry_number,
                            last_level = %level,
                            adjustment = strategy.strength_adjustment,
                            template = %strategy.prompt_template,
                            "retrying: {reason}"
                        );
                        last_failure = Some(format!("best candidate was {level}"));
                        State::Attempting {
                            attempt: attempt + 1,
                            strength: adjust_strength_for_retry(
                                strength,
                                strategy.strength_adjustment,
                            ),
                            template: strategy.prompt_template,
                        }
                    }
                    None => {
                        last_failure = Some(format!("best candidate was {level}"));
                        self.exhausted(&mut fallback, attempts, &last_failure)
                    }
                },
                None if attempt < self.config.max_retries => State::Attempting {
                    attempt: attempt + 1,
                    strength,
                    template,
                },
                None => self.exhausted(&mut fallback, attempts, &last_failure),
            };
        }
    }

    async fn attempt<G>(
        &self,
        generator: &G,
        request: GenerationRequest,
        prepared: &Arc<PreparedOriginal>,
    ) -> Result<RerankOutcome, AttemptError>
    where
        G: CandidateGenerator,
    {
        let pending = generator.generate(request);
        let candidates = match self.config.generation_timeout() {
            Some(after) => tokio::time::timeout(after, pending)
                .await
                .map_err(|_| GenerationError::Timeout { after })??,
            None => pending.await?,
        };
        if candidates.is_empty() {
            return Err(GenerationError::Empty.into());
        }

        let count = candidates.len();
        let reranker = self.reranker.clone();
        let prepared = Arc::clone(prepared);
        let loader = Arc::clone(&self.loader);
        let outcome = tokio::task::spawn_blocking(move || {
            reranker.rank(&prepared, &candidates, loader.as_ref())
        })
        .await
        .map_err(|err| AttemptError::Scoring(err.to_string()))?;
        if outcome.scored() == 0 {
            return Err(AttemptError::Unloadable { count });
        }
        tracing::debug!(
            ranked = outcome.ranked.len(),
            rejected = outcome.rejected.len(),
            failed = outcome.failures.len(),
            "reranked candidates"
        );
        Ok(outcome)
    }

    fn exhausted(
        &self,
        fallback: &mut Option<Fallback>,
        attempts: u32,
        last_failure: &Option<String>,
    ) -> State {
        match fallback.take() {
            Some(kept) => {
                tracing::warn!(
                    attempts,
                    candidate = %kept.result.url,
                    level = %kept.result.error_level,
                    "retry budget exhausted, returning best effort"
                );
                State::ExhaustedBestEffort(kept.result)
            }
            None => State::Failed(RetryError::NoViableCandidate {
                attempts,
                last_failure: last_failure.clone(),
            }),
        }
    }
}

/// `P1` without a dimension mismatch: the shape held or could not be located.
fn is_fallback_eligible(quality: &QualityResult) -> bool {
    quality.error_level == ErrorLevel::P1
        && !quality
            .reasons
            .iter()
            .any(|reason| reason == QualityResult::DIMENSION_MISMATCH)
}

/// The least severe rejections are all `P1` with no subject to compare.
fn subject_unlocated(rejected: &[RankedCandidate], level: ErrorLevel) -> bool {
    level == ErrorLevel::P1
        && rejected
            .iter()
            .filter(|candidate| candidate.quality.error_level == level)
            .all(|candidate| candidate.quality.scores.geom_delta.is_none())
}
