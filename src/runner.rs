use crate::command::render_command;
use crate::error::{CollectorError, Result};
use crate::types::CommandOutput;
use std::future::Future;
use tokio::process::Command;
use tracing::debug;

/// Executes a token list and captures its output.
///
/// Implementations must not treat a non-zero exit as an error.
pub trait CommandRunner {
    fn run(&self, command: &[String]) -> impl Future<Output = Result<CommandOutput>> + Send;
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &[String]) -> Result<CommandOutput> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| CollectorError::InvalidArgument("empty command".into()))?;

        debug!("Running: {}", render_command(command));
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| CollectorError::Process {
                command: render_command(command),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            output: combined,
        })
    }
}
