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

//! # Stevedore
//!
//! Stevedore launches short-lived, two-container compute tasks on an
//! elastic container scheduler, stages a code bundle into them, waits for
//! completion, and reports the outcome back to an external workflow engine
//! via a callback token. Each invocation is one "run this code, tell me how
//! it went" unit of work inside a larger state-machine-driven pipeline.
//!
//! The heart of the crate is the task handshake protocol: two independently
//! scheduled containers, sharing only a volume, bootstrap each other,
//! detect completion, capture exit status, and report failures, all through
//! sentinel files and bounded polling. See [`handshake`] for the protocol
//! and [`script`] for its generated in-container shell form.
//!
//! ```text
//! TaskLauncher ──register──▶ scheduler ──launch──▶ ┌───────────────────────┐
//!      │                                           │ main      │ sidecar   │
//!      └──deregister (scoped)                      │ container │ (reports) │
//!                                                  │     shared volume     │
//!                                                  └───────────┬───────────┘
//!                                                              │ callback
//!                                                     workflow engine
//! ```
//!
//! External collaborators (scheduler, object store, workflow callback,
//! metrics sink) are traits; SDK plumbing lives with the caller.

pub mod defaults;
pub mod error;
pub mod handshake;
pub mod invocation;
pub mod launcher;
pub mod report;
pub mod script;
pub mod stage;
pub mod taskdef;

pub use error::{
    HandshakeError, LaunchError, ReportError, SchedulerError, StageError, ValidationError,
};
pub use handshake::{HandshakeConfig, MainRunner, SidecarController, Workspace};
pub use invocation::{Mountpoint, TaskInvocation};
pub use launcher::{
    LaunchOptions, LaunchOutcome, LaunchedTask, NetworkConfiguration, RegisteredTaskDefinition,
    RunTaskRequest, Scheduler, TaskLauncher,
};
pub use report::{MetricsConfig, MetricsSink, ReportConfig, Reporter, WorkflowBackend};
pub use stage::{ContentStager, ObjectStore, StagePlan};
pub use taskdef::{build_task_specification, SpecOptions, TaskSpecification};
