use std::ffi::OsString;
use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use regen_verify_types::ErrorLevel;

#[derive(Debug, Default)]
pub struct CliSources {
    pub pretty_from_cli: bool,
    pub resize_from_cli: bool,
}

impl CliSources {
    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            pretty_from_cli: value_from_cli(matches, "pretty"),
            resize_from_cli: value_from_cli(matches, "resize"),
        }
    }
}

fn value_from_cli(matches: &ArgMatches, id: &str) -> bool {
    matches
        .value_source(id)
        .is_some_and(|source| matches!(source, ValueSource::CommandLine))
}

pub fn parse_cli() -> (CliArgs, CliSources) {
    let command = CliArgs::command();
    let matches = command.get_matches();
    let args = match CliArgs::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(err) => err.exit(),
    };
    let sources = CliSources::from_matches(&matches);
    (args, sources)
}

/// Parses an explicit argument list, e.g. from tests.
pub fn parse_from<I, T>(args: I) -> Result<(CliArgs, CliSources), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = CliArgs::command().try_get_matches_from(args)?;
    let args = CliArgs::from_arg_matches(&matches)?;
    let sources = CliSources::from_matches(&matches);
    Ok((args, sources))
}

#[derive(Debug, Parser)]
#[command(
    name = "regen-verify",
    about = "Verify regenerated images against their original and drive adaptive retries",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Override the configuration file path
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Resample candidates to the original's dimensions before scoring
    #[arg(long = "resize", global = true)]
    pub resize: bool,

    /// Pretty-print JSON output
    #[arg(long = "pretty", global = true)]
    pub pretty: bool,

    /// Minimum structural difference (1 - SSIM) a candidate must reach
    #[arg(long = "ssim-min-diff", global = true, value_name = "RATIO")]
    pub ssim_min_diff: Option<f64>,

    /// Minimum perceptual hash distance (0-64)
    #[arg(
        long = "phash-min-dist",
        global = true,
        value_parser = clap::value_parser!(u32).range(0..=64)
    )]
    pub phash_min_dist: Option<u32>,

    /// Maximum allowed subject geometry drift
    #[arg(long = "geom-max-delta", global = true, value_name = "RATIO")]
    pub geom_max_delta: Option<f64>,

    /// Minimum edge quality score
    #[arg(long = "edge-min-score", global = true, value_name = "RATIO")]
    pub edge_min_score: Option<f64>,

    /// Retries allowed after the first generation attempt
    #[arg(long = "max-retries", global = true)]
    pub max_retries: Option<u32>,

    /// Deadline for a single generator invocation
    #[arg(long = "generation-timeout-ms", global = true, value_name = "MS")]
    pub generation_timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Score candidate images against the original
    Score {
        original: PathBuf,
        #[arg(required = true)]
        candidates: Vec<PathBuf>,
    },

    /// Rank acceptable candidates, best first
    Rerank {
        original: PathBuf,
        #[arg(required = true)]
        candidates: Vec<PathBuf>,
    },

    /// Show the retry strategy chosen after a failed attempt
    Plan {
        /// Zero-based index of the attempt that failed
        #[arg(long = "attempt")]
        attempt: u32,

        /// Severity of the failed attempt (P0 or P1)
        #[arg(long = "level")]
        level: ErrorLevel,

        /// Strength used by the failed attempt
        #[arg(long = "strength", default_value_t = 50.0)]
        strength: f64,
    },

    /// Generate, verify and retry until a candidate is accepted
    Run {
        original: PathBuf,

        /// Shell command producing candidates, one path per stdout line
        #[arg(long = "generator", value_name = "CMD")]
        generator: String,

        /// Initial modification strength (10-100)
        #[arg(long = "strength", default_value_t = 50.0)]
        strength: f64,

        /// Product description passed into the prompt
        #[arg(long = "description", default_value = "")]
        description: String,

        /// Replacement logo text; empty removes logos
        #[arg(long = "logo", default_value = "")]
        logo: String,
    },
}
