use rayon::prelude::*;
use regen_verify_types::{
    ConfigError, ErrorLevel, QualityResult, QualityScores, QualityThresholds, RasterSample,
    SignalWeights,
};

use crate::pipeline::GrayPlane;
use crate::signals::{
    PerceptualHash, SubjectBox, box_delta, edge_quality, perceptual_hash, structural_similarity,
    subject_box,
};

/// Original image with every per-image signal precomputed, so a batch of
/// candidates only pays for the candidate side.
#[derive(Clone, Debug)]
pub struct PreparedOriginal {
    plane: GrayPlane,
    hash: PerceptualHash,
    subject: Option<SubjectBox>,
}

impl PreparedOriginal {
    pub fn new(raster: &RasterSample) -> Self {
        let plane = GrayPlane::from_raster(raster);
        let hash = perceptual_hash(&plane);
        let subject = subject_box(&plane);
        Self {
            plane,
            hash,
            subject,
        }
    }

    pub fn width(&self) -> usize {
        self.plane.width
    }

    pub fn height(&self) -> usize {
        self.plane.height
    }
}

/// Perceptual difference engine: four signals, one composite, one severity.
#[derive(Clone, Debug, Default)]
pub struct QualityScorer {
    thresholds: QualityThresholds,
    weights: SignalWeights,
}

impl QualityScorer {
    pub fn new(thresholds: QualityThresholds) -> Result<Self, ConfigError> {
        Self::with_weights(thresholds, SignalWeights::default())
    }

    pub fn with_weights(
        thresholds: QualityThresholds,
        weights: SignalWeights,
    ) -> Result<Self, ConfigError> {
        thresholds.validate()?;
        weights.validate()?;
        Ok(Self {
            thresholds,
            weights,
        })
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    pub fn prepare(&self, original: &RasterSample) -> PreparedOriginal {
        PreparedOriginal::new(original)
    }

    /// Scores one candidate. Mismatched dimensions yield a `P1` result with
    /// maxed-out scores rather than an error.
    pub fn score(&self, original: &RasterSample, candidate: &RasterSample) -> QualityResult {
        if !original.same_dimensions(candidate) {
            return QualityResult::dimension_mismatch();
        }
        self.score_prepared(&self.prepare(original), candidate)
    }

    pub fn score_prepared(
        &self,
        original: &PreparedOriginal,
        candidate: &RasterSample,
    ) -> QualityResult {
        if original.width() != candidate.width() as usize
            || original.height() != candidate.height() as usize
        {
            return QualityResult::dimension_mismatch();
        }
        let plane = GrayPlane::from_raster(candidate);

        let ssim = structural_similarity(&original.plane, &plane);
        let phash_distance = original.hash.distance(&perceptual_hash(&plane));
        let edge_score = edge_quality(&plane);
        let geom_delta = match (original.subject, subject_box(&plane)) {
            (Some(a), Some(b)) => Some(box_delta(&a, &b, plane.width, plane.height)),
            _ => None,
        };

        let mut scores = QualityScores {
            ssim,
            ssim_diff: 1.0 - ssim,
            phash_distance,
            edge_score,
            geom_delta,
            overall_score: 0.0,
        };
        scores.overall_score = self.weights.blend(&scores);

        let (error_level, reasons) = classify(&scores, &self.thresholds);
        QualityResult {
            passed: error_level.is_passing(),
            error_level,
            reasons,
            scores,
        }
    }

    /// Order-preserving batch scoring; candidates are scored in parallel.
    pub fn score_many(
        &self,
        original: &RasterSample,
        candidates: &[RasterSample],
    ) -> Vec<QualityResult> {
        let prepared = self.prepare(original);
        candidates
            .par_iter()
            .map(|candidate| self.score_prepared(&prepared, candidate))
            .collect()
    }
}

/// Applies the threshold rules in priority order. Every violated threshold
/// contributes a reason; the level only ever escalates.
pub fn classify(scores: &QualityScores, thresholds: &QualityThresholds) -> (ErrorLevel, Vec<String>) {
    let mut level = ErrorLevel::Ok;
    let mut reasons = Vec::new();

    match scores.geom_delta {
        Some(delta) if delta > thresholds.geom_max_delta => {
            reasons.push(format!(
                "Geometry changed too much: {:.1}% (max {:.1}%)",
                delta * 100.0,
                thresholds.geom_max_delta * 100.0
            ));
            level = ErrorLevel::P0;
        }
        Some(_) => {}
        None => {
            reasons.push("Geometry could not be verified: no subject edges detected".to_string());
            level = level.max(ErrorLevel::P1);
        }
    }

    if scores.ssim_diff < thresholds.ssim_min_diff {
        reasons.push(format!(
            "Not different enough: {:.1}% difference (min {:.1}%)",
            scores.ssim_diff * 100.0,
            thresholds.ssim_min_diff * 100.0
        ));
        level = level.max(ErrorLevel::P1);
    }

    if scores.phash_distance < thresholds.phash_min_dist {
        reasons.push(format!(
            "Perceptual hash too similar: {} distance (min {})",
            scores.phash_distance, thresholds.phash_min_dist
        ));
        level = level.max(ErrorLevel::P1);
    }

    if scores.edge_score < thresholds.edge_min_score {
        reasons.push(format!(
            "Poor edge quality: {:.1}% (min {:.1}%)",
            scores.edge_score * 100.0,
            thresholds.edge_min_score * 100.0
        ));
        level = level.max(ErrorLevel::P2);
    }

    (level, reasons)
}
