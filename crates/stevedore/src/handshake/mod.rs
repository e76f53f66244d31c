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

//! The sentinel-file handshake protocol.
//!
//! Two independently scheduled containers share a volume and nothing else:
//! no pipe, no socket, no supervisor. Coordination is a set of append-only
//! marker files, each with exactly one writer:
//!
//! ```text
//! sidecar-preinit-complete -> sidecar-init-complete -> main-complete(code) -> sidecar-exitcode
//! ```
//!
//! The sidecar writes the preinit and init markers; the main container
//! waits on the init marker, runs the workload, and writes its exit status
//! into the main-complete marker; the sidecar waits on that, reports, and
//! finally records its own exit status. Nobody deletes another party's
//! marker after creation.
//!
//! This module is the protocol's in-process realization: an explicit state
//! machine for each side ([`MainRunner`], [`SidecarController`]) sharing
//! marker names with the generated shell scripts in [`crate::script`].
//! All waits are bounded by an explicit timeout; the poll interval is a
//! parameter rather than a constant baked into script text.

mod main_runner;
mod sidecar;

pub use main_runner::MainRunner;
pub use sidecar::SidecarController;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::defaults::{DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};
use crate::error::HandshakeError;

/// Written by the sidecar once the workspace layout exists.
pub const PREINIT_MARKER: &str = "sidecar-preinit-complete";
/// Written by the sidecar after staging; the main container's green light.
pub const INIT_MARKER: &str = "sidecar-init-complete";
/// Written by the main container; contains the workload's numeric exit
/// status.
pub const MAIN_COMPLETE_MARKER: &str = "main-complete";
/// Written by the sidecar last; contains the handshake subshell's own exit
/// status.
pub const SIDECAR_EXITCODE_MARKER: &str = "sidecar-exitcode";

/// Subdirectory holding the workload's durable log and scratch files.
pub const MAIN_CONTAINER_DIR: &str = "main-container";
/// Subdirectory content bundles extract into.
pub const ENTRYPOINT_DIR: &str = "entrypoint";
/// Subdirectory holding the sidecar's own log and scratch files.
pub const SIDECAR_DIR: &str = "sidecar";
/// Workload log filename under [`MAIN_CONTAINER_DIR`].
pub const MAIN_LOG_FILE: &str = "main.log";
/// Sidecar log filename under [`SIDECAR_DIR`].
pub const SIDECAR_LOG_FILE: &str = "sidecar.log";

/// Poll interval and wait deadline for handshake waits.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    pub poll_interval: Duration,
    pub wait_timeout: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

/// The shared volume, viewed from either container.
///
/// Owns path resolution for markers, subdirectories, and log files, plus
/// the polling wait primitive both state machines use.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn marker_path(&self, marker: &str) -> PathBuf {
        self.root.join(marker)
    }

    pub fn entrypoint_root(&self) -> PathBuf {
        self.root.join(ENTRYPOINT_DIR)
    }

    pub fn main_container_dir(&self) -> PathBuf {
        self.root.join(MAIN_CONTAINER_DIR)
    }

    pub fn sidecar_dir(&self) -> PathBuf {
        self.root.join(SIDECAR_DIR)
    }

    pub fn main_log_path(&self) -> PathBuf {
        self.main_container_dir().join(MAIN_LOG_FILE)
    }

    pub fn sidecar_log_path(&self) -> PathBuf {
        self.sidecar_dir().join(SIDECAR_LOG_FILE)
    }

    /// Creates the workspace subdirectories. Idempotent; never deletes
    /// prior content.
    pub fn create_layout(&self) -> Result<(), HandshakeError> {
        for dir in [
            self.main_container_dir(),
            self.entrypoint_root(),
            self.sidecar_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|source| HandshakeError::Workspace {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Writes an empty marker file.
    pub fn write_marker(&self, marker: &str) -> Result<(), HandshakeError> {
        let path = self.marker_path(marker);
        std::fs::write(&path, b"").map_err(|source| HandshakeError::Workspace { path, source })
    }

    /// Writes a marker carrying a numeric exit status.
    pub fn write_exit_marker(&self, marker: &str, code: i32) -> Result<(), HandshakeError> {
        let path = self.marker_path(marker);
        std::fs::write(&path, format!("{code}\n"))
            .map_err(|source| HandshakeError::Workspace { path, source })
    }

    pub fn marker_exists(&self, marker: &str) -> bool {
        self.marker_path(marker).exists()
    }

    /// Reads the numeric exit status recorded in a marker.
    pub fn read_exit_marker(&self, marker: &str) -> Result<i32, HandshakeError> {
        let path = self.marker_path(marker);
        let content = std::fs::read_to_string(&path)
            .map_err(|source| HandshakeError::Workspace { path, source })?;
        content
            .trim()
            .parse()
            .map_err(|_| HandshakeError::MalformedMarker {
                marker: marker.to_string(),
                content,
            })
    }

    /// Polls for a marker at the configured interval until it appears or
    /// the deadline expires.
    pub async fn await_marker(
        &self,
        marker: &str,
        config: &HandshakeConfig,
    ) -> Result<(), HandshakeError> {
        let deadline = Instant::now() + config.wait_timeout;
        loop {
            if self.marker_exists(marker) {
                trace!(marker, "marker observed");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(HandshakeError::MarkerTimeout {
                    marker: marker.to_string(),
                    timeout: config.wait_timeout,
                });
            }
            sleep(config.poll_interval).await;
        }
    }
}
