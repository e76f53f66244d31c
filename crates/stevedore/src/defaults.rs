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

//! Default values shared between the library and the CLI.
//!
//! These constants define the fixed points of the task contract: the shared
//! workspace path baked into both container definitions, the archive format
//! accepted for content bundles, and the tuning knobs (poll interval, wait
//! timeout, reporting retry ceiling, error-excerpt budget) that callers may
//! override through configuration.

use std::time::Duration;

/// Fixed mount path of the shared ephemeral volume inside both containers.
pub const WORKSPACE_PATH: &str = "/tmp/workspace";

/// Archive suffix accepted for content bundle references (checked
/// case-insensitively).
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Name given to the implicit mountpoint created from a bare `content`
/// reference.
pub const IMPLICIT_MOUNTPOINT: &str = "content";

/// Control-plane image run as the sidecar container.
pub const SIDECAR_IMAGE: &str = "public.ecr.aws/aws-cli/aws-cli:latest";

/// Default CPU reservation (string-typed scheduler resource quantity).
pub const DEFAULT_TASK_CPU: &str = "256";

/// Default memory reservation (string-typed scheduler resource quantity).
pub const DEFAULT_TASK_MEMORY: &str = "512";

/// Default log stream prefix when the invocation supplies none.
pub const DEFAULT_LOG_STREAM_PREFIX: &str = "one-off-task";

/// Interval between sentinel-file polls on both sides of the handshake.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on any single handshake wait. The original design had no
/// bound beyond the scheduler's own task timeout; an explicit deadline makes
/// a stuck peer diagnosable instead of silent.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Maximum number of delivery attempts for an infrastructure-failure report.
pub const REPORT_RETRY_LIMIT: u32 = 5;

/// Byte budget for a failure cause. Kept under the ~32 KiB callback payload
/// ceiling with headroom for transport framing.
pub const EXCERPT_MAX_BYTES: usize = 24 * 1024;

/// After the byte cap, the cause is further reduced to this many trailing
/// lines for readability.
pub const EXCERPT_MAX_LINES: usize = 50;

/// Exit status the runner reports when a wait deadline expires.
pub const TIMEOUT_EXIT_CODE: i32 = 124;
