use std::future::Future;
use std::time::Duration;

use regen_verify_types::CandidateId;
use serde::Serialize;
use thiserror::Error;

use crate::prompt::PromptTemplate;

/// Parameters of one generation attempt.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerationRequest {
    /// Zero-based attempt index.
    pub attempt: u32,
    pub strength: f64,
    pub template: PromptTemplate,
    pub prompt: String,
    /// Number of candidates requested.
    pub k: usize,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation failed: {message}")]
    Failed { message: String },

    #[error("generation timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("no candidates generated")]
    Empty,
}

impl GenerationError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Produces candidate images for a request. This is the engine's only
/// suspension point; failures are recoverable per attempt.
pub trait CandidateGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl Future<Output = Result<Vec<CandidateId>, GenerationError>> + Send;
}

/// Adapts an async closure into a [`CandidateGenerator`].
pub fn from_fn<F, Fut>(f: F) -> FnGenerator<F>
where
    F: Fn(GenerationRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<CandidateId>, GenerationError>> + Send,
{
    FnGenerator { f }
}

pub struct FnGenerator<F> {
    f: F,
}

impl<F, Fut> CandidateGenerator for FnGenerator<F>
where
    F: Fn(GenerationRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<CandidateId>, GenerationError>> + Send,
{
    fn name(&self) -> &'static str {
        "closure"
    }

    fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl Future<Output = Result<Vec<CandidateId>, GenerationError>> + Send {
        (self.f)(request)
    }
}
