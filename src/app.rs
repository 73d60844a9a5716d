use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use regen_verify_retry::{
    GenerationResult, RankedCandidate, Reranker, RetryError, RetryManager, RetryOutcome,
    RetryStrategy, SourceImage, adjust_strength_for_retry, plan_retry_strategy,
};
use regen_verify_scorer::{ImageFileLoader, LoadError, QualityScorer, RasterLoader};
use regen_verify_types::{CandidateId, ConfigError, ErrorLevel, QualityResult, RasterSample};
use serde::Serialize;
use thiserror::Error;

use crate::cli::Command;
use crate::generator::CommandGenerator;
use crate::settings::{EffectiveSettings, SettingsError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load original: {0}")]
    Original(#[source] LoadError),

    #[error(transparent)]
    Retry(#[from] RetryError),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

/// One scored candidate; a candidate that could not be loaded carries the
/// error instead of a result.
#[derive(Debug, Serialize)]
pub struct ScoreReport {
    pub candidate: CandidateId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QualityResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub attempt: u32,
    pub level: ErrorLevel,
    pub strength: f64,
    /// `None` once the retry budget is spent.
    pub strategy: Option<RetryStrategy>,
    pub next_strength: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub status: &'static str,
    pub result: GenerationResult,
    pub meets_minimum_difference: bool,
}

/// Shared wiring of scorer, reranker and loaders for one invocation.
pub struct Engine {
    settings: EffectiveSettings,
    reranker: Reranker,
}

impl Engine {
    pub fn new(settings: EffectiveSettings) -> Result<Self, AppError> {
        let scorer = QualityScorer::new(settings.thresholds)?;
        let reranker = Reranker::new(scorer, settings.rerank_weights)?;
        Ok(Self { settings, reranker })
    }

    pub fn settings(&self) -> &EffectiveSettings {
        &self.settings
    }

    pub fn load_original(&self, path: &Path) -> Result<RasterSample, AppError> {
        ImageFileLoader::new()
            .load(&path_id(path))
            .map_err(AppError::Original)
    }

    fn candidate_loader(&self, original: &RasterSample) -> ImageFileLoader {
        let loader = ImageFileLoader::new();
        if self.settings.resize {
            loader.with_uniform_size(original.width(), original.height())
        } else {
            loader
        }
    }

    pub fn score(
        &self,
        original: &Path,
        candidates: &[PathBuf],
    ) -> Result<Vec<ScoreReport>, AppError> {
        let original = self.load_original(original)?;
        let loader = self.candidate_loader(&original);

        let mut reports = Vec::with_capacity(candidates.len());
        let mut loaded = Vec::new();
        let mut slots = Vec::new();
        for path in candidates {
            let id = path_id(path);
            match loader.load(&id) {
                Ok(raster) => {
                    slots.push(reports.len());
                    loaded.push(raster);
                    reports.push(ScoreReport {
                        candidate: id,
                        result: None,
                        error: None,
                    });
                }
                Err(err) => {
                    tracing::warn!(candidate = %id, error = %err, "failed to load candidate");
                    reports.push(ScoreReport {
                        candidate: id,
                        result: None,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        let results = self.reranker.scorer().score_many(&original, &loaded);
        for (slot, result) in slots.into_iter().zip(results) {
            reports[slot].result = Some(result);
        }
        Ok(reports)
    }

    pub fn rerank(
        &self,
        original: &Path,
        candidates: &[PathBuf],
    ) -> Result<Vec<RankedCandidate>, AppError> {
        let original = self.load_original(original)?;
        let loader = self.candidate_loader(&original);
        let ids: Vec<CandidateId> = candidates.iter().map(|path| path_id(path)).collect();
        Ok(self.reranker.rerank_candidates(&original, &ids, &loader))
    }

    pub fn plan(&self, attempt: u32, level: ErrorLevel, strength: f64) -> PlanReport {
        let strategy = plan_retry_strategy(attempt, level, &self.settings.retry);
        let next_strength = strategy
            .as_ref()
            .map(|strategy| adjust_strength_for_retry(strength, strategy.strength_adjustment));
        PlanReport {
            attempt,
            level,
            strength,
            strategy,
            next_strength,
        }
    }

    pub async fn run(
        &self,
        original: &Path,
        generator: &CommandGenerator,
        strength: f64,
        description: &str,
        logo: &str,
    ) -> Result<RunReport, AppError> {
        let raster = self.load_original(original)?;
        let loader: Arc<dyn RasterLoader> = Arc::new(self.candidate_loader(&raster));
        let manager =
            RetryManager::new(self.settings.retry.clone(), self.reranker.clone(), loader)?;
        let source = SourceImage::new(original.display().to_string(), raster);

        let outcome = manager
            .execute_with_retry(generator, &source, strength, description, logo)
            .await?;
        let status = match outcome {
            RetryOutcome::Accepted(_) => "accepted",
            RetryOutcome::ExhaustedBestEffort(_) => "exhausted_best_effort",
        };
        let result = outcome.into_result();
        Ok(RunReport {
            status,
            meets_minimum_difference: result
                .meets_minimum_difference(self.settings.similarity_threshold),
            result,
        })
    }
}

/// Executes one subcommand and renders its JSON output.
pub async fn execute(command: Command, settings: EffectiveSettings) -> Result<String, AppError> {
    let engine = Engine::new(settings)?;
    let pretty = engine.settings().pretty;
    match command {
        Command::Score {
            original,
            candidates,
        } => render(&engine.score(&original, &candidates)?, pretty),
        Command::Rerank {
            original,
            candidates,
        } => render(&engine.rerank(&original, &candidates)?, pretty),
        Command::Plan {
            attempt,
            level,
            strength,
        } => render(&engine.plan(attempt, level, strength), pretty),
        Command::Run {
            original,
            generator,
            strength,
            description,
            logo,
        } => {
            let generator = CommandGenerator::new(generator);
            let spinner = run_spinner();
            let report = engine
                .run(&original, &generator, strength, &description, &logo)
                .await;
            spinner.finish_and_clear();
            render(&report?, pretty)
        }
    }
}

fn render<T: Serialize>(value: &T, pretty: bool) -> Result<String, AppError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(text)
}

fn run_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.cyan.bold} [{elapsed_precise}] {msg}")
    {
        spinner.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    spinner.set_message("generating candidates");
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn path_id(path: &Path) -> CandidateId {
    CandidateId::from(path.to_string_lossy().into_owned())
}
