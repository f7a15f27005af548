//! Child process plumbing.

use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

use conclave_config::SubprocessProviderConfig;
use conclave_protocols::error::AgentError;
use conclave_protocols::types::ProtocolFrame;

use crate::decoder::{FrameDecoder, NdjsonDecoder};

/// Stdin/stdout of a running agent process.
///
/// Owned by the agent's exchange lock.
pub(crate) struct ProcessIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    line: Vec<u8>,
    decoder: NdjsonDecoder,
    /// A request was written and its terminal frame has not been read yet.
    pub(crate) pending_terminal: bool,
}

impl ProcessIo {
    pub(crate) async fn write_line(&mut self, line: &str) -> Result<(), AgentError> {
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AgentError::Communication(format!("write to agent process: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| AgentError::Communication(format!("flush agent process stdin: {e}")))
    }

    /// Next decoded line. `Ok(None)` at end of output.
    ///
    /// Lines are read as raw bytes, so output that is not UTF-8 is decoded
    /// lossily and skipped as malformed instead of failing the read.
    pub(crate) async fn read_frames(&mut self) -> Result<Option<Vec<ProtocolFrame>>, AgentError> {
        self.line.clear();
        let read = self
            .stdout
            .read_until(b'\n', &mut self.line)
            .await
            .map_err(|e| AgentError::Communication(format!("read from agent process: {e}")))?;
        if read == 0 {
            let rest = self.decoder.finish();
            return Ok((!rest.is_empty()).then_some(rest));
        }
        Ok(Some(self.decoder.feed(&self.line)))
    }

    /// Discard output until the terminal frame of an abandoned exchange.
    pub(crate) async fn drain_to_terminal(&mut self) -> Result<usize, AgentError> {
        let mut skipped = 0;
        loop {
            let frames = self.read_frames().await?.ok_or_else(|| {
                AgentError::Communication("agent process closed its output".to_string())
            })?;
            skipped += frames.len();
            if frames.iter().any(ProtocolFrame::is_terminal) {
                self.pending_terminal = false;
                return Ok(skipped);
            }
        }
    }
}

/// Spawn the configured executable with piped stdio.
///
/// Stderr is forwarded line by line to `debug!`.
pub(crate) fn spawn(
    agent_id: &str,
    config: &SubprocessProviderConfig,
) -> Result<(Child, ProcessIo), AgentError> {
    if config.executable.trim().is_empty() {
        return Err(AgentError::Startup("no executable configured".to_string()));
    }

    let mut command = Command::new(&config.executable);
    command
        .args(&config.args)
        .envs(&config.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &config.working_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|e| {
        AgentError::Startup(format!("failed to spawn '{}': {e}", config.executable))
    })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AgentError::Startup("failed to capture stdin".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AgentError::Startup("failed to capture stdout".to_string()))?;

    if let Some(stderr) = child.stderr.take() {
        let agent_id = agent_id.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(agent_id = %agent_id, "stderr: {}", line);
            }
        });
    }

    debug!(
        agent_id = %agent_id,
        executable = %config.executable,
        pid = ?child.id(),
        "Spawned agent process"
    );

    Ok((
        child,
        ProcessIo {
            stdin,
            stdout: BufReader::new(stdout),
            line: Vec::new(),
            decoder: NdjsonDecoder::new(),
            pending_terminal: false,
        },
    ))
}
