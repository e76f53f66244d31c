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

//! Content staging: resolving named bundles into the entrypoint tree.
//!
//! Each mountpoint fetches a compressed archive through the [`ObjectStore`]
//! collaborator and extracts it into a dedicated subdirectory of the
//! entrypoint root named after the mountpoint key. Working-directory
//! resolution follows the mountpoint count: exactly one bundle puts the
//! workload directly inside it, anything else uses the shared entrypoint
//! root so bundles are addressable by name.

use async_trait::async_trait;
use flate2::read::GzDecoder;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tar::Archive;
use tracing::{debug, info};

use crate::error::StageError;
use crate::invocation::Mountpoint;

/// Fetch-by-reference boundary to the object store. Implementations are
/// external collaborators; the stager only cares that the archive lands at
/// the destination path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn fetch(&self, reference: &str, dest: &Path) -> Result<(), StageError>;
}

/// The resolved set of bundles for one invocation.
#[derive(Debug, Clone)]
pub struct StagePlan {
    mountpoints: Vec<Mountpoint>,
}

impl StagePlan {
    pub fn new(mountpoints: Vec<Mountpoint>) -> Self {
        Self { mountpoints }
    }

    pub fn mountpoints(&self) -> &[Mountpoint] {
        &self.mountpoints
    }

    pub fn is_empty(&self) -> bool {
        self.mountpoints.is_empty()
    }

    /// Resolves the workload's working directory against an entrypoint
    /// root: the bundle's own subdirectory for a single mountpoint, the
    /// shared root otherwise.
    pub fn working_directory(&self, entrypoint_root: &Path) -> PathBuf {
        match self.mountpoints.as_slice() {
            [only] => entrypoint_root.join(&only.name),
            _ => entrypoint_root.to_path_buf(),
        }
    }
}

/// Extracts content bundles into the entrypoint tree.
pub struct ContentStager {
    store: Arc<dyn ObjectStore>,
}

impl ContentStager {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Stages every bundle in the plan and returns the resolved working
    /// directory.
    ///
    /// # Errors
    /// The first fetch or extraction failure aborts staging. Callers route
    /// the error into the infrastructure-failure reporting path; staging
    /// must never take the sidecar down unreported.
    pub async fn stage(
        &self,
        plan: &StagePlan,
        entrypoint_root: &Path,
    ) -> Result<PathBuf, StageError> {
        for mountpoint in plan.mountpoints() {
            // Invocation validation already constrains names; refuse
            // anything but a single plain path component here too so the
            // join below can never leave the entrypoint root.
            let mut components = Path::new(&mountpoint.name).components();
            if !matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            ) {
                return Err(StageError::UnsafeName {
                    name: mountpoint.name.clone(),
                });
            }

            let dest_dir = entrypoint_root.join(&mountpoint.name);
            tokio::fs::create_dir_all(&dest_dir).await?;

            let archive = tempfile::NamedTempFile::new()?;
            debug!(
                name = %mountpoint.name,
                reference = %mountpoint.reference,
                "fetching bundle"
            );
            self.store
                .fetch(&mountpoint.reference, archive.path())
                .await?;

            let archive_path = archive.path().to_path_buf();
            let extract_dir = dest_dir.clone();
            let name = mountpoint.name.clone();
            tokio::task::spawn_blocking(move || extract_archive(&archive_path, &extract_dir))
                .await
                .map_err(|join_err| StageError::Extract {
                    name: name.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, join_err),
                })?
                .map_err(|source| StageError::Extract { name, source })?;

            info!(name = %mountpoint.name, dest = %dest_dir.display(), "bundle staged");
        }

        Ok(plan.working_directory(entrypoint_root))
    }
}

/// Unpacks a gzip-compressed tar archive into `dest`.
fn extract_archive(archive_path: &Path, dest: &Path) -> std::io::Result<()> {
    let file = std::fs::File::open(archive_path)?;
    let decoder = GzDecoder::new(file);
    let mut archive = Archive::new(decoder);
    archive.unpack(dest)
}
