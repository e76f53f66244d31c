/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Main-container side of the handshake.
//!
//! Two states: WAIT_FOR_GREEN_LIGHT, then RUN. The runner never starts the
//! user command before the sidecar's init marker exists, captures the
//! command's natural exit status (no short-circuiting), duplicates all
//! interleaved output to the durable workload log, records the status in
//! the main-complete marker, and finishes with that same status.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::defaults::TIMEOUT_EXIT_CODE;
use crate::error::HandshakeError;

use super::{HandshakeConfig, Workspace, INIT_MARKER, MAIN_COMPLETE_MARKER};

/// In-process main-container runner.
pub struct MainRunner {
    workspace: Workspace,
    config: HandshakeConfig,
    command: String,
    workdir: PathBuf,
}

impl MainRunner {
    pub fn new(workspace: Workspace, command: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            workspace,
            config: HandshakeConfig::default(),
            command: command.into(),
            workdir: workdir.into(),
        }
    }

    pub fn with_config(mut self, config: HandshakeConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs the two-state machine to completion and returns the exit status
    /// recorded in the main-complete marker.
    ///
    /// A green-light timeout is itself recorded as an exit status
    /// ([`TIMEOUT_EXIT_CODE`]) so the sidecar, if alive, can still report.
    pub async fn run(&self) -> Result<i32, HandshakeError> {
        debug!(workspace = %self.workspace.root().display(), "waiting for green light");
        if let Err(err) = self.workspace.await_marker(INIT_MARKER, &self.config).await {
            if matches!(err, HandshakeError::MarkerTimeout { .. }) {
                self.workspace
                    .write_exit_marker(MAIN_COMPLETE_MARKER, TIMEOUT_EXIT_CODE)?;
            }
            return Err(err);
        }

        let code = self.run_user_command().await?;
        self.workspace
            .write_exit_marker(MAIN_COMPLETE_MARKER, code)?;
        info!(code, "workload complete");
        Ok(code)
    }

    /// Executes the user command via `sh -c`, teeing interleaved output to
    /// the durable workload log.
    async fn run_user_command(&self) -> Result<i32, HandshakeError> {
        tokio::fs::create_dir_all(self.workspace.main_container_dir()).await?;
        let log = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.workspace.main_log_path())
            .await?;
        let log = Arc::new(Mutex::new(log));

        debug!(command = %self.command, workdir = %self.workdir.display(), "running user command");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(HandshakeError::Spawn)?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_task = stdout.map(|stream| tee_lines(stream, Arc::clone(&log)));
        let err_task = stderr.map(|stream| tee_lines(stream, Arc::clone(&log)));

        let status = child.wait().await?;
        if let Some(task) = out_task {
            let _ = task.await;
        }
        if let Some(task) = err_task {
            let _ = task.await;
        }

        Ok(exit_code(status))
    }
}

/// Copies lines from a child stream into the shared log file, echoing each
/// to this process's stdout so the container log stream stays live.
fn tee_lines<R>(
    stream: R,
    log: Arc<Mutex<tokio::fs::File>>,
) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            println!("{line}");
            let mut file = log.lock().await;
            let _ = file.write_all(line.as_bytes()).await;
            let _ = file.write_all(b"\n").await;
        }
    })
}

/// Maps a process status to the numeric code recorded in the marker.
/// Signal terminations (no code on unix) are recorded as 128 + signal, the
/// shell's own convention.
fn exit_code(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
