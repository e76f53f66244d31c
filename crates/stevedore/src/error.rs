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

//! Error types for the task launcher.
//!
//! The taxonomy mirrors the failure classes of the system: input validation
//! errors are rejected synchronously before any external call; staging and
//! handshake errors occur inside the sidecar and surface only through the
//! reporting path; reporting errors are retried up to a fixed ceiling;
//! launch errors propagate to the orchestrator's caller.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while validating a [`TaskInvocation`](crate::TaskInvocation)
/// before any scheduler call is made.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Fields `content` and `mountpoints` are mutually exclusive; supply at most one")]
    ConflictingContentSources,

    #[error(
        "Mountpoint name '{name}' is invalid; names are letters, digits, \
         underscore, hyphen (1-64 characters)"
    )]
    InvalidMountpointName { name: String },

    #[error("Mountpoint '{name}' must reference a {suffix} archive, got: {reference}")]
    NotAnArchive {
        name: String,
        reference: String,
        suffix: &'static str,
    },

    #[error("Command to run must not be empty")]
    EmptyCommand,

    #[error("Command to run contains a NUL byte")]
    MalformedCommand,

    #[error("Invalid invocation payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Errors raised while staging content bundles into the workspace.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Mountpoint name '{name}' is not a plain directory name")]
    UnsafeName { name: String },

    #[error("Failed to fetch '{reference}': {message}")]
    Fetch { reference: String, message: String },

    #[error("Failed to extract archive for mountpoint '{name}': {source}")]
    Extract {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error during staging: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the completion reporter.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Callback `{call}` failed: {message}")]
    Callback { call: &'static str, message: String },

    #[error("Failure report not delivered after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Metric emission failed: {0}")]
    Metric(String),
}

/// Errors raised by either side of the handshake state machine.
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("Timed out after {timeout:?} waiting for marker '{marker}'")]
    MarkerTimeout { marker: String, timeout: Duration },

    #[error("Marker '{marker}' does not contain a numeric exit status: {content:?}")]
    MalformedMarker { marker: String, content: String },

    #[error("Failed to spawn user command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to write workspace file {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors returned by a [`Scheduler`](crate::launcher::Scheduler)
/// implementation.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler call `{call}` failed: {message}")]
    Call { call: &'static str, message: String },

    #[error("Scheduler returned a malformed response: {0}")]
    MalformedResponse(String),
}

/// Errors returned by the task lifecycle orchestrator.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
