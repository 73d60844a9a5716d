use std::process::Stdio;

use regen_verify_retry::{CandidateGenerator, GenerationError, GenerationRequest};
use regen_verify_types::CandidateId;
use tokio::process::Command;

/// Runs an external command once per attempt. The request is passed through
/// `REGEN_*` environment variables; stdout lists one candidate per line.
#[derive(Clone, Debug)]
pub struct CommandGenerator {
    command: String,
}

impl CommandGenerator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn shell(&self) -> Command {
        #[cfg(windows)]
        let (program, flag) = ("cmd", "/C");
        #[cfg(not(windows))]
        let (program, flag) = ("sh", "-c");
        let mut command = Command::new(program);
        command.arg(flag).arg(&self.command);
        command
    }

    async fn invoke(
        &self,
        request: GenerationRequest,
    ) -> Result<Vec<CandidateId>, GenerationError> {
        let output = self
            .shell()
            .env("REGEN_ATTEMPT", request.attempt.to_string())
            .env("REGEN_STRENGTH", request.strength.to_string())
            .env("REGEN_TEMPLATE", request.template.as_str())
            .env("REGEN_K", request.k.to_string())
            .env("REGEN_PROMPT", &request.prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                GenerationError::failed(format!("failed to spawn '{}': {err}", self.command))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GenerationError::failed(format!(
                "generator exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(parse_candidates(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl CandidateGenerator for CommandGenerator {
    fn name(&self) -> &'static str {
        "command"
    }

    fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl Future<Output = Result<Vec<CandidateId>, GenerationError>> + Send {
        self.invoke(request)
    }
}

fn parse_candidates(stdout: &str) -> Vec<CandidateId> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(CandidateId::from)
        .collect()
}
