//! Adaptive regeneration: retry planning, candidate reranking and the
//! orchestration loop around an injected generator.

pub mod config;
pub mod generator;
pub mod orchestrator;
pub mod planner;
pub mod prompt;
pub mod rerank;

pub use config::RetryConfig;
pub use generator::{CandidateGenerator, FnGenerator, GenerationError, GenerationRequest, from_fn};
pub use orchestrator::{
    DEFAULT_SIMILARITY_THRESHOLD, GenerationResult, RetryError, RetryManager, RetryOutcome,
    SourceImage,
};
pub use planner::{
    MAX_STRENGTH, MIN_STRENGTH, RetryStrategy, RiskLevel, adjust_strength_for_retry,
    determine_risk_level, k_samples, plan_retry_strategy,
};
pub use prompt::{PromptTemplate, render_prompt};
pub use rerank::{CandidateFailure, RankedCandidate, RerankOutcome, RerankWeights, Reranker};
