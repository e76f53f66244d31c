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

use serde::{Deserialize, Serialize};
use std::time::Duration;

use stevedore::defaults::{
    DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT, EXCERPT_MAX_BYTES, EXCERPT_MAX_LINES,
    REPORT_RETRY_LIMIT, SIDECAR_IMAGE,
};
use stevedore::{HandshakeConfig, LaunchOptions, SpecOptions};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StevedoreConfig {
    pub scheduler: SchedulerSection,
    pub handshake: HandshakeSection,
    pub reporting: ReportingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub region: String,
    pub sidecar_image: String,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            sidecar_image: SIDECAR_IMAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeSection {
    pub poll_secs: u64,
    pub wait_timeout_secs: u64,
}

impl Default for HandshakeSection {
    fn default() -> Self {
        Self {
            poll_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            wait_timeout_secs: DEFAULT_WAIT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingSection {
    pub retry_limit: u32,
    pub excerpt_max_bytes: usize,
    pub excerpt_max_lines: usize,
}

impl Default for ReportingSection {
    fn default() -> Self {
        Self {
            retry_limit: REPORT_RETRY_LIMIT,
            excerpt_max_bytes: EXCERPT_MAX_BYTES,
            excerpt_max_lines: EXCERPT_MAX_LINES,
        }
    }
}

impl StevedoreConfig {
    pub fn spec_options(&self) -> SpecOptions {
        SpecOptions {
            sidecar_image: self.scheduler.sidecar_image.clone(),
            region: self.scheduler.region.clone(),
            poll_secs: self.handshake.poll_secs,
            timeout_secs: self.handshake.wait_timeout_secs,
        }
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            spec: self.spec_options(),
            report_retry_limit: self.reporting.retry_limit,
            excerpt_max_bytes: self.reporting.excerpt_max_bytes,
            excerpt_max_lines: self.reporting.excerpt_max_lines,
        }
    }

    pub fn handshake_config(&self) -> HandshakeConfig {
        HandshakeConfig {
            poll_interval: Duration::from_secs(self.handshake.poll_secs),
            wait_timeout: Duration::from_secs(self.handshake.wait_timeout_secs),
        }
    }
}
