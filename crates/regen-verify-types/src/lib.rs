//! Shared domain models for the regen-verify workspace.
//!
//! This crate centralizes the raster container, the score/severity model and
//! the threshold configuration used by the scorer, retry and CLI crates. Keep
//! it free of image codecs and runtimes so every crate can depend on it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type RasterResult<T> = Result<T, RasterError>;

/// Channel layout of a [`RasterSample`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Gray,
    Rgba,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::Rgba => 4,
        }
    }
}

/// Decoded image, one byte per channel, rows packed without padding.
#[derive(Clone)]
pub struct RasterSample {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Arc<[u8]>,
}

impl fmt::Debug for RasterSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterSample")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl RasterSample {
    pub fn from_owned(
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: Vec<u8>,
    ) -> RasterResult<Self> {
        if width == 0 || height == 0 {
            return Err(RasterError::EmptyDimensions { width, height });
        }
        let required = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(layout.channels()))
            .ok_or(RasterError::Overflow { width, height })?;
        if data.len() != required {
            return Err(RasterError::BufferLength {
                provided: data.len(),
                required,
            });
        }
        Ok(Self {
            width,
            height,
            layout,
            data: Arc::from(data.into_boxed_slice()),
        })
    }

    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> RasterResult<Self> {
        Self::from_owned(width, height, PixelLayout::Rgba, data)
    }

    pub fn from_gray(width: u32, height: u32, data: Vec<u8>) -> RasterResult<Self> {
        Self::from_owned(width, height, PixelLayout::Gray, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn same_dimensions(&self, other: &RasterSample) -> bool {
        self.width == other.width && self.height == other.height
    }
}

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("raster dimensions must be non-zero (got {width}x{height})")]
    EmptyDimensions { width: u32, height: u32 },

    #[error("raster dimensions overflowed while computing buffer size ({width}x{height})")]
    Overflow { width: u32, height: u32 },

    #[error("raster buffer holds {provided} bytes, expected {required}")]
    BufferLength { provided: usize, required: usize },
}

/// Identifier of a generated candidate (URL, path or provider key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CandidateId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CandidateId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Severity of a scored candidate. Variants are ordered from least to most
/// severe so `max` picks the worse level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorLevel {
    #[serde(rename = "OK")]
    Ok,
    P2,
    P1,
    P0,
}

impl ErrorLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorLevel::Ok => "OK",
            ErrorLevel::P2 => "P2",
            ErrorLevel::P1 => "P1",
            ErrorLevel::P0 => "P0",
        }
    }

    /// `OK` and `P2` results are acceptable output.
    pub fn is_passing(&self) -> bool {
        matches!(self, ErrorLevel::Ok | ErrorLevel::P2)
    }

    /// `P0` and `P1` candidates are never ranked.
    pub fn is_disqualifying(&self) -> bool {
        !self.is_passing()
    }
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct ErrorLevelParseError(pub String);

impl fmt::Display for ErrorLevelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown error level '{}'", self.0)
    }
}

impl std::error::Error for ErrorLevelParseError {}

impl FromStr for ErrorLevel {
    type Err = ErrorLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "OK" => Ok(ErrorLevel::Ok),
            "P2" => Ok(ErrorLevel::P2),
            "P1" => Ok(ErrorLevel::P1),
            "P0" => Ok(ErrorLevel::P0),
            _ => Err(ErrorLevelParseError(upper)),
        }
    }
}

/// Signals computed for one original/candidate pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub ssim: f64,
    pub ssim_diff: f64,
    pub phash_distance: u32,
    pub edge_score: f64,
    /// `None` when either image has no detectable subject edges.
    pub geom_delta: Option<f64>,
    pub overall_score: f64,
}

impl QualityScores {
    /// Hash distance reported when the rasters cannot be compared.
    pub const MAX_PHASH_DISTANCE: u32 = 64;

    /// Zeroed/maxed scores used for a dimension mismatch.
    pub fn incomparable() -> Self {
        Self {
            ssim: 0.0,
            ssim_diff: 1.0,
            phash_distance: Self::MAX_PHASH_DISTANCE,
            edge_score: 0.0,
            geom_delta: Some(1.0),
            overall_score: 0.0,
        }
    }

    pub fn normalized_phash(&self) -> f64 {
        (self.phash_distance as f64 / Self::MAX_PHASH_DISTANCE as f64).min(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub ssim_min_diff: f64,
    pub phash_min_dist: u32,
    pub geom_max_delta: f64,
    pub edge_min_score: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            ssim_min_diff: 0.30,
            phash_min_dist: 12,
            geom_max_delta: 0.03,
            edge_min_score: 0.6,
        }
    }
}

impl QualityThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("ssim_min_diff", self.ssim_min_diff)?;
        check_unit("geom_max_delta", self.geom_max_delta)?;
        check_unit("edge_min_score", self.edge_min_score)?;
        if self.phash_min_dist > QualityScores::MAX_PHASH_DISTANCE {
            return Err(ConfigError::invalid(
                "phash_min_dist",
                self.phash_min_dist,
                "an integer in 0..=64",
            ));
        }
        Ok(())
    }
}

/// Weights of the four signals in the composite score and the candidate
/// ranking. Geometry enters inverted (`1 - geom_delta`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub ssim_diff: f64,
    pub phash: f64,
    pub edge: f64,
    pub geom: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            ssim_diff: 0.3,
            phash: 0.25,
            edge: 0.25,
            geom: 0.2,
        }
    }
}

impl SignalWeights {
    /// Contribution of an indeterminate geometry signal to the inverted term.
    pub const NEUTRAL_GEOMETRY: f64 = 0.5;

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("ssim_diff", self.ssim_diff),
            ("phash", self.phash),
            ("edge", self.edge),
            ("geom", self.geom),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(field, value, "a non-negative weight"));
            }
        }
        Ok(())
    }

    /// Weighted blend of the signals; `overall_score` is not read.
    pub fn blend(&self, scores: &QualityScores) -> f64 {
        let geometry = scores
            .geom_delta
            .map(|delta| 1.0 - delta)
            .unwrap_or(Self::NEUTRAL_GEOMETRY);
        self.ssim_diff * scores.ssim_diff
            + self.phash * scores.normalized_phash()
            + self.edge * scores.edge_score
            + self.geom * geometry
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, value, "a value in [0, 1]"))
    }
}

/// Outcome of scoring one candidate against the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityResult {
    pub passed: bool,
    pub error_level: ErrorLevel,
    pub reasons: Vec<String>,
    pub scores: QualityScores,
}

impl QualityResult {
    pub const DIMENSION_MISMATCH: &'static str = "Image dimensions do not match";

    pub fn dimension_mismatch() -> Self {
        Self {
            passed: false,
            error_level: ErrorLevel::P1,
            reasons: vec![Self::DIMENSION_MISMATCH.to_string()],
            scores: QualityScores::incomparable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for '{field}': expected {expected}")]
    InvalidValue {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    pub fn invalid(field: &'static str, value: impl fmt::Display, expected: &'static str) -> Self {
        Self::InvalidValue {
            field,
            value: value.to_string(),
            expected,
        }
    }
}
