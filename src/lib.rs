pub mod app;
pub mod cli;
pub mod generator;
pub mod settings;

pub use app::{AppError, Engine, PlanReport, RunReport, ScoreReport, execute};
pub use generator::CommandGenerator;
pub use settings::{EffectiveSettings, SettingsError, resolve_settings};
