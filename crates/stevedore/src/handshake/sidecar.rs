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

//! Sidecar side of the handshake.
//!
//! Strictly ordered: layout -> preinit marker -> staging -> init marker
//! (the green light) -> wait for main-complete -> normal-path report ->
//! self-capture of the controller's own exit status -> independent
//! infrastructure-failure report if the controller itself failed.
//!
//! The split between the last two reporting steps is deliberate: a staging
//! failure aborts the handshake before the main container ever produces a
//! main-complete marker, so the normal-path report alone would never fire.

use tracing::{debug, error, info};

use crate::error::HandshakeError;
use crate::report::Reporter;
use crate::stage::{ContentStager, StagePlan};

use super::{
    HandshakeConfig, Workspace, INIT_MARKER, MAIN_COMPLETE_MARKER, PREINIT_MARKER,
    SIDECAR_EXITCODE_MARKER,
};

/// In-process sidecar controller.
pub struct SidecarController {
    workspace: Workspace,
    config: HandshakeConfig,
    stager: ContentStager,
    plan: StagePlan,
    reporter: Reporter,
    token: Option<String>,
}

impl SidecarController {
    pub fn new(
        workspace: Workspace,
        stager: ContentStager,
        plan: StagePlan,
        reporter: Reporter,
        token: Option<String>,
    ) -> Self {
        Self {
            workspace,
            config: HandshakeConfig::default(),
            stager,
            plan,
            reporter,
            token,
        }
    }

    pub fn with_config(mut self, config: HandshakeConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs the controller to completion and returns its exit status.
    ///
    /// The status is always recorded in the sidecar exit-code marker before
    /// the infrastructure-failure path is consulted, mirroring the
    /// self-capture the generated script performs. This method itself never
    /// fails: every error ends up either reported or logged.
    pub async fn run(&self) -> i32 {
        let outcome = self.run_handshake().await;

        let code = match &outcome {
            Ok(()) => 0,
            Err(err) => {
                error!(error = %err, "sidecar handshake failed");
                1
            }
        };

        if let Err(err) = self
            .workspace
            .write_exit_marker(SIDECAR_EXITCODE_MARKER, code)
        {
            error!(error = %err, "failed to record sidecar exit status");
        }

        if code != 0 {
            if let (Some(token), Err(err)) = (&self.token, &outcome) {
                let detail = err.to_string();
                if let Err(report_err) = self
                    .reporter
                    .report_infrastructure_failure(token, &detail)
                    .await
                {
                    error!(error = %report_err, "infrastructure failure left unreported");
                }
            }
        }

        code
    }

    /// The supervised portion of the handshake; any error here counts as an
    /// infrastructure failure.
    async fn run_handshake(&self) -> Result<(), HandshakeError> {
        self.workspace.create_layout()?;
        self.workspace.write_marker(PREINIT_MARKER)?;
        debug!("workspace ready, staging content");

        self.stager
            .stage(&self.plan, &self.workspace.entrypoint_root())
            .await?;

        self.workspace.write_marker(INIT_MARKER)?;
        debug!("green light given, waiting for workload");

        self.workspace
            .await_marker(MAIN_COMPLETE_MARKER, &self.config)
            .await?;
        let exit_code = self.workspace.read_exit_marker(MAIN_COMPLETE_MARKER)?;
        info!(exit_code, "workload outcome observed");

        if let Some(token) = &self.token {
            self.reporter
                .report_completion(token, exit_code, &self.workspace.main_log_path())
                .await?;
        } else {
            debug!("no completion token, skipping report");
        }

        Ok(())
    }
}
