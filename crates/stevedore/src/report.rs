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

//! Completion reporting to the external workflow engine.
//!
//! The reporter distinguishes two named outcomes. A *workload failure* is a
//! nonzero exit status recorded in the main-complete marker; it is reported
//! once, with a size-bounded [`error_excerpt`] as the cause. An
//! *infrastructure failure* is the sidecar's own handshake failing (e.g.
//! staging) before a workload outcome exists; it is reported through an
//! independent path retried up to a fixed ceiling with no backoff.
//!
//! Outcome metrics (`TaskSuccess` / `TaskFailure`) ride alongside the
//! callback as a best-effort side effect; a metric failure can never change
//! the callback result.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::defaults::{EXCERPT_MAX_BYTES, EXCERPT_MAX_LINES, REPORT_RETRY_LIMIT};
use crate::error::ReportError;

/// Error kind attached to workload-failure reports.
pub const WORKLOAD_ERROR_KIND: &str = "TaskFailed";
/// Error kind attached to infrastructure-failure reports.
pub const INFRASTRUCTURE_ERROR_KIND: &str = "SidecarFailed";
/// Output payload attached to success reports.
pub const SUCCESS_OUTPUT: &str = "{\"output\": \"0\"}";

/// Metric names emitted per outcome.
pub const SUCCESS_METRIC: &str = "TaskSuccess";
pub const FAILURE_METRIC: &str = "TaskFailure";

/// Callback boundary to the workflow engine.
#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    async fn send_success(&self, token: &str, output: &str) -> Result<(), ReportError>;
    async fn send_failure(&self, token: &str, error: &str, cause: &str) -> Result<(), ReportError>;
}

/// Count-metric boundary to the metrics sink.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn put_count(
        &self,
        namespace: &str,
        metric: &str,
        dimensions: &BTreeMap<String, String>,
        value: f64,
    ) -> Result<(), ReportError>;
}

/// Metric emission settings carried by the invocation.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub namespace: String,
    pub dimensions: BTreeMap<String, String>,
}

/// Reporter tuning.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Whether failure causes include the workload log tail, or only the
    /// generated header.
    pub include_error_logs: bool,
    /// Byte budget for a failure cause (callback transport ceiling).
    pub excerpt_max_bytes: usize,
    /// Trailing-line cap applied after the byte budget.
    pub excerpt_max_lines: usize,
    /// Attempt ceiling for infrastructure-failure reports.
    pub retry_limit: u32,
    /// Human-readable pointer to the full log, prefixed to every failure
    /// cause.
    pub log_location_hint: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_error_logs: true,
            excerpt_max_bytes: EXCERPT_MAX_BYTES,
            excerpt_max_lines: EXCERPT_MAX_LINES,
            retry_limit: REPORT_RETRY_LIMIT,
            log_location_hint: String::new(),
        }
    }
}

/// Signals task outcomes to the workflow engine, with bounded retry for the
/// infrastructure-failure path.
pub struct Reporter {
    backend: Arc<dyn WorkflowBackend>,
    metrics: Option<(MetricsConfig, Arc<dyn MetricsSink>)>,
    config: ReportConfig,
}

impl Reporter {
    pub fn new(backend: Arc<dyn WorkflowBackend>) -> Self {
        Self {
            backend,
            metrics: None,
            config: ReportConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReportConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_metrics(mut self, config: MetricsConfig, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some((config, sink));
        self
    }

    /// Normal-path report: called once the main-complete marker has been
    /// observed. Exit 0 reports success; anything else reports a workload
    /// failure with a bounded excerpt of the captured log.
    pub async fn report_completion(
        &self,
        token: &str,
        exit_code: i32,
        main_log: &Path,
    ) -> Result<(), ReportError> {
        let result = if exit_code == 0 {
            info!(exit_code, "reporting task success");
            self.backend.send_success(token, SUCCESS_OUTPUT).await
        } else {
            let header = format!(
                "Task failed with exit code {exit_code}. {}",
                self.config.log_location_hint
            );
            let log_tail = if self.config.include_error_logs {
                read_log_tail(main_log, self.config.excerpt_max_bytes)
            } else {
                None
            };
            let cause = error_excerpt(
                &header,
                log_tail.as_deref(),
                self.config.excerpt_max_bytes,
                self.config.excerpt_max_lines,
            );
            info!(exit_code, cause_bytes = cause.len(), "reporting task failure");
            self.backend
                .send_failure(token, WORKLOAD_ERROR_KIND, &cause)
                .await
        };

        let metric = if exit_code == 0 {
            SUCCESS_METRIC
        } else {
            FAILURE_METRIC
        };
        self.emit_outcome_metric(metric).await;

        result
    }

    /// Infrastructure-failure report: fires when the sidecar's own
    /// handshake failed, possibly before any workload outcome exists.
    /// Retried up to the configured ceiling, stopping on first success, no
    /// backoff between attempts.
    pub async fn report_infrastructure_failure(
        &self,
        token: &str,
        detail: &str,
    ) -> Result<(), ReportError> {
        let header = format!("Sidecar handshake failed. {}", self.config.log_location_hint);
        let cause = error_excerpt(
            &header,
            Some(detail),
            self.config.excerpt_max_bytes,
            self.config.excerpt_max_lines,
        );

        for attempt in 1..=self.config.retry_limit {
            match self
                .backend
                .send_failure(token, INFRASTRUCTURE_ERROR_KIND, &cause)
                .await
            {
                Ok(()) => {
                    info!(attempt, "infrastructure failure reported");
                    self.emit_outcome_metric(FAILURE_METRIC).await;
                    return Ok(());
                }
                Err(err) => {
                    warn!(attempt, error = %err, "failure report attempt did not go through");
                }
            }
        }

        Err(ReportError::RetriesExhausted {
            attempts: self.config.retry_limit,
        })
    }

    /// Best-effort metric emission; failures are logged and swallowed.
    async fn emit_outcome_metric(&self, metric: &str) {
        let Some((config, sink)) = &self.metrics else {
            return;
        };
        match sink
            .put_count(&config.namespace, metric, &config.dimensions, 1.0)
            .await
        {
            Ok(()) => debug!(metric, namespace = %config.namespace, "outcome metric emitted"),
            Err(err) => warn!(metric, error = %err, "outcome metric dropped"),
        }
    }
}

/// Reads at most `max_bytes` from the end of the log without pulling the
/// whole file into memory. Non-UTF-8 bytes are replaced rather than
/// discarding the log. A missing or unreadable log yields `None`; the
/// report then carries the header alone.
fn read_log_tail(path: &Path, max_bytes: usize) -> Option<String> {
    let mut file = std::fs::File::open(path).ok()?;
    let len = file.metadata().ok()?.len();
    let start = len.saturating_sub(max_bytes as u64);
    file.seek(SeekFrom::Start(start)).ok()?;
    let mut buffer = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut buffer).ok()?;
    Some(String::from_utf8_lossy(&buffer).into_owned())
}

/// Assembles a size-bounded diagnostic string: the header, then the tail of
/// the captured log reduced to the last `max_lines` lines, the whole capped
/// at `max_bytes`.
///
/// The cap is mandatory, not cosmetic: the callback transport enforces a
/// hard payload ceiling and drops oversized causes.
pub fn error_excerpt(
    header: &str,
    log_tail: Option<&str>,
    max_bytes: usize,
    max_lines: usize,
) -> String {
    let mut excerpt = truncate_to_boundary(header, max_bytes).to_string();

    if let Some(log) = log_tail {
        let budget = max_bytes.saturating_sub(excerpt.len() + 1);
        if budget > 0 && !log.is_empty() {
            let tail = tail_bytes(log, budget);
            let tail = tail_lines(tail, max_lines);
            if !tail.trim().is_empty() {
                excerpt.push('\n');
                excerpt.push_str(tail);
            }
        }
    }

    excerpt
}

/// Last `max` bytes of `text`, snapped forward to a char boundary.
fn tail_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Last `max` lines of `text`.
fn tail_lines(text: &str, max: usize) -> &str {
    let mut newline_positions: Vec<usize> = text
        .char_indices()
        .filter(|(_, ch)| *ch == '\n')
        .map(|(idx, _)| idx)
        .collect();
    // A trailing newline does not start a new line.
    if text.ends_with('\n') {
        newline_positions.pop();
    }
    if newline_positions.len() < max {
        return text;
    }
    let cut = newline_positions[newline_positions.len() - max];
    &text[cut + 1..]
}

/// First `max` bytes of `text`, snapped back to a char boundary.
fn truncate_to_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
