/*!
 * Command Loop
 * Operator prompt forwarding each line to the launcher
 */

use crate::core::errors::{LaunchError, LaunchResult, Result, SerializableError, SupervisorError};
use crate::core::limits::{MAX_SLOTS, PROMPT};
use crate::core::types::Pid;
use crate::process::ProcessLauncher;
use std::future::Future;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Why the loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Input closed
    EndOfInput,
    /// Shutdown future resolved
    Interrupted,
}

/// Read-launch loop
pub struct CommandLoop<const N: usize = MAX_SLOTS> {
    launcher: ProcessLauncher<N>,
}

impl<const N: usize> CommandLoop<N> {
    pub fn new(launcher: ProcessLauncher<N>) -> Self {
        Self { launcher }
    }

    /// Prompt, take one line, launch it; repeat until input ends or
    /// `shutdown` resolves
    pub async fn run<W, S>(
        &self,
        lines: &mut mpsc::Receiver<String>,
        output: &mut W,
        shutdown: S,
    ) -> Result<LoopExit>
    where
        W: AsyncWrite + Unpin,
        S: Future,
    {
        tokio::pin!(shutdown);

        loop {
            output.write_all(PROMPT.as_bytes()).await?;
            output.flush().await?;

            let line = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    output.write_all(b"\n").await?;
                    output.flush().await?;
                    return Ok(LoopExit::Interrupted);
                }
                line = lines.recv() => match line {
                    Some(line) => line,
                    None => return Ok(LoopExit::EndOfInput),
                },
            };

            let command = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
            if command.trim().is_empty() {
                debug!("Skipping blank line");
                continue;
            }

            // The table guard and fork/exec block, so they run off the
            // async workers
            let launcher = self.launcher.clone();
            let command = command.to_string();
            let reply = tokio::task::spawn_blocking(move || render(launcher.launch(&command)))
                .await
                .map_err(|e| SupervisorError::Io(format!("launch task failed: {}", e)))?;
            output.write_all(reply.as_bytes()).await?;
        }
    }

    /// Launch one command and render the operator-facing reply
    pub fn dispatch(&self, command: &str) -> String {
        render(self.launcher.launch(command))
    }
}

fn render(result: LaunchResult<Pid>) -> String {
    match result {
        Ok(pid) => format!("Started a new process with pid {}\n", pid),
        Err(LaunchError::NoCapacity { .. }) => {
            "All available processes are busy, try again later\n".to_string()
        }
        Err(e) => {
            warn!(error = %SerializableError::from(&e).to_json(), "Command rejected");
            format!("{}\n", e)
        }
    }
}
