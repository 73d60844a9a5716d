use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use regen_verify_retry::{DEFAULT_SIMILARITY_THRESHOLD, RerankWeights, RetryConfig};
use regen_verify_types::{ConfigError, QualityThresholds};
use serde::Deserialize;
use thiserror::Error;

use crate::cli::{CliArgs, CliSources};

const PROJECT_CONFIG_FILE: &str = "regen-verify.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    thresholds: ThresholdFileConfig,
    retry: RetryFileConfig,
    rerank: RerankFileConfig,
    output: OutputFileConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ThresholdFileConfig {
    ssim_min_diff: Option<f64>,
    phash_min_dist: Option<u32>,
    geom_max_delta: Option<f64>,
    edge_min_score: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RetryFileConfig {
    max_retries: Option<u32>,
    strength_step: Option<f64>,
    k_samples_default: Option<usize>,
    k_samples_high_risk: Option<usize>,
    generation_timeout_ms: Option<u64>,
    similarity_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RerankFileConfig {
    ssim_diff: Option<f64>,
    phash: Option<f64>,
    edge: Option<f64>,
    geom: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct OutputFileConfig {
    pretty: Option<bool>,
    resize: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub thresholds: QualityThresholds,
    pub retry: RetryConfig,
    pub rerank_weights: RerankWeights,
    /// Similarity percentage a final result must stay under.
    pub similarity_threshold: f64,
    pub pretty: bool,
    pub resize: bool,
    pub config_path: Option<PathBuf>,
}

impl Default for EffectiveSettings {
    fn default() -> Self {
        Self {
            thresholds: QualityThresholds::default(),
            retry: RetryConfig::default(),
            rerank_weights: RerankWeights::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            pretty: false,
            resize: false,
            config_path: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config file {} does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("{source}{}", origin_suffix(.path))]
    Invalid {
        path: Option<PathBuf>,
        #[source]
        source: ConfigError,
    },
}

fn origin_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" in {}", path.display()),
        None => String::new(),
    }
}

pub fn resolve_settings(
    cli: &CliArgs,
    sources: &CliSources,
) -> Result<EffectiveSettings, SettingsError> {
    let (file, config_path) = load_config(cli.config.as_deref())?;
    merge(cli, sources, file, config_path)
}

fn load_config(
    path_override: Option<&Path>,
) -> Result<(FileConfig, Option<PathBuf>), SettingsError> {
    if let Some(path) = path_override {
        let path = path.to_path_buf();
        if !path.exists() {
            return Err(SettingsError::NotFound { path });
        }
        let config = read_config(&path)?;
        return Ok((config, Some(path)));
    }

    for candidate in [project_config_path(), default_config_path()]
        .into_iter()
        .flatten()
    {
        if candidate.exists() {
            let config = read_config(&candidate)?;
            return Ok((config, Some(candidate)));
        }
    }
    Ok((FileConfig::default(), None))
}

fn read_config(path: &Path) -> Result<FileConfig, SettingsError> {
    let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge(
    cli: &CliArgs,
    sources: &CliSources,
    file: FileConfig,
    config_path: Option<PathBuf>,
) -> Result<EffectiveSettings, SettingsError> {
    let FileConfig {
        thresholds: file_thresholds,
        retry: file_retry,
        rerank: file_rerank,
        output: file_output,
    } = file;

    // File values are checked on their own first so an error names the file.
    let mut thresholds = QualityThresholds::default();
    overlay(&mut thresholds.ssim_min_diff, file_thresholds.ssim_min_diff);
    overlay(&mut thresholds.phash_min_dist, file_thresholds.phash_min_dist);
    overlay(&mut thresholds.geom_max_delta, file_thresholds.geom_max_delta);
    overlay(&mut thresholds.edge_min_score, file_thresholds.edge_min_score);
    invalid_in(thresholds.validate(), &config_path)?;

    overlay(&mut thresholds.ssim_min_diff, cli.ssim_min_diff);
    overlay(&mut thresholds.phash_min_dist, cli.phash_min_dist);
    overlay(&mut thresholds.geom_max_delta, cli.geom_max_delta);
    overlay(&mut thresholds.edge_min_score, cli.edge_min_score);
    invalid_in(thresholds.validate(), &None)?;

    let mut retry = RetryConfig::default();
    overlay(&mut retry.max_retries, file_retry.max_retries);
    overlay(&mut retry.strength_step, file_retry.strength_step);
    overlay(&mut retry.k_samples_default, file_retry.k_samples_default);
    overlay(&mut retry.k_samples_high_risk, file_retry.k_samples_high_risk);
    if file_retry.generation_timeout_ms.is_some() {
        retry.generation_timeout_ms = file_retry.generation_timeout_ms;
    }
    invalid_in(retry.validate(), &config_path)?;

    overlay(&mut retry.max_retries, cli.max_retries);
    if cli.generation_timeout_ms.is_some() {
        retry.generation_timeout_ms = cli.generation_timeout_ms;
    }
    invalid_in(retry.validate(), &None)?;

    let similarity_threshold = file_retry
        .similarity_threshold
        .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
    if !similarity_threshold.is_finite() || !(0.0..=100.0).contains(&similarity_threshold) {
        return Err(SettingsError::Invalid {
            path: config_path,
            source: ConfigError::invalid(
                "similarity_threshold",
                similarity_threshold,
                "a percentage in [0, 100]",
            ),
        });
    }

    let mut rerank_weights = RerankWeights::default();
    overlay(&mut rerank_weights.ssim_diff, file_rerank.ssim_diff);
    overlay(&mut rerank_weights.phash, file_rerank.phash);
    overlay(&mut rerank_weights.edge, file_rerank.edge);
    overlay(&mut rerank_weights.geom, file_rerank.geom);
    invalid_in(rerank_weights.validate(), &config_path)?;

    let mut pretty = cli.pretty;
    if !sources.pretty_from_cli {
        if let Some(value) = file_output.pretty {
            pretty = value;
        }
    }

    let mut resize = cli.resize;
    if !sources.resize_from_cli {
        if let Some(value) = file_output.resize {
            resize = value;
        }
    }

    Ok(EffectiveSettings {
        thresholds,
        retry,
        rerank_weights,
        similarity_threshold,
        pretty,
        resize,
        config_path,
    })
}

fn overlay<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn invalid_in(
    result: Result<(), ConfigError>,
    path: &Option<PathBuf>,
) -> Result<(), SettingsError> {
    result.map_err(|source| SettingsError::Invalid {
        path: path.clone(),
        source,
    })
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("rs", "regen-verify", "regen-verify")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    env::current_dir()
        .ok()
        .map(|dir| dir.join(PROJECT_CONFIG_FILE))
}
