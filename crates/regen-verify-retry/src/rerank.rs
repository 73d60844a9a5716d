use rayon::prelude::*;
use regen_verify_scorer::{LoadError, PreparedOriginal, QualityScorer, RasterLoader};
use regen_verify_types::{CandidateId, ConfigError, QualityResult, RasterSample, SignalWeights};
use serde::Serialize;

/// Ranking weights; the same blend as the composite score by default.
pub type RerankWeights = SignalWeights;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub id: CandidateId,
    pub score: f64,
    pub quality: QualityResult,
}

#[derive(Debug)]
pub struct CandidateFailure {
    pub id: CandidateId,
    pub error: LoadError,
}

/// Everything learned from one batch: acceptable survivors best first, the
/// disqualified candidates (P0/P1) in input order, and load failures.
#[derive(Debug, Default)]
pub struct RerankOutcome {
    pub ranked: Vec<RankedCandidate>,
    pub rejected: Vec<RankedCandidate>,
    pub failures: Vec<CandidateFailure>,
}

impl RerankOutcome {
    pub fn best(&self) -> Option<&RankedCandidate> {
        self.ranked.first()
    }

    pub fn scored(&self) -> usize {
        self.ranked.len() + self.rejected.len()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Reranker {
    scorer: QualityScorer,
    weights: RerankWeights,
}

impl Reranker {
    pub fn new(scorer: QualityScorer, weights: RerankWeights) -> Result<Self, ConfigError> {
        weights.validate()?;
        Ok(Self { scorer, weights })
    }

    pub fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    pub fn prepare(&self, original: &RasterSample) -> PreparedOriginal {
        self.scorer.prepare(original)
    }

    /// Loads and scores every candidate in parallel. A candidate that fails
    /// to load is logged and excluded; it never aborts the batch.
    pub fn rank(
        &self,
        original: &PreparedOriginal,
        ids: &[CandidateId],
        loader: &dyn RasterLoader,
    ) -> RerankOutcome {
        let scored: Vec<Result<RankedCandidate, CandidateFailure>> = ids
            .par_iter()
            .map(|id| {
                let raster = loader.load(id).map_err(|error| CandidateFailure {
                    id: id.clone(),
                    error,
                })?;
                let quality = self.scorer.score_prepared(original, &raster);
                Ok(RankedCandidate {
                    id: id.clone(),
                    score: self.weights.blend(&quality.scores),
                    quality,
                })
            })
            .collect();

        let mut outcome = RerankOutcome::default();
        for entry in scored {
            match entry {
                Ok(candidate) if candidate.quality.error_level.is_disqualifying() => {
                    outcome.rejected.push(candidate)
                }
                Ok(candidate) => outcome.ranked.push(candidate),
                Err(failure) => {
                    tracing::warn!(
                        candidate = %failure.id,
                        loader = loader.name(),
                        error = %failure.error,
                        "failed to score candidate"
                    );
                    outcome.failures.push(failure);
                }
            }
        }
        outcome.ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        outcome
    }

    /// Acceptable candidates ordered best first; empty when every candidate
    /// was disqualified or failed to load.
    pub fn rerank_candidates(
        &self,
        original: &RasterSample,
        ids: &[CandidateId],
        loader: &dyn RasterLoader,
    ) -> Vec<RankedCandidate> {
        self.rank(&self.prepare(original), ids, loader).ranked
    }
}
