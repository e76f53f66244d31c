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

//! TOML configuration with environment-variable substitution.
//!
//! Discovery order: explicit `--config` path, the `STEVEDORE_CONFIG`
//! environment variable, then the search paths (current directory, user
//! config directory, `/etc/stevedore`). Every field has a default, so a
//! missing file is not an error unless an explicit path was given.

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{HandshakeSection, ReportingSection, SchedulerSection, StevedoreConfig};
