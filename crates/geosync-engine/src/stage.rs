//! # File Stager
//!
//! Copies repository files into the storage GeoServer reads from, and
//! removes them again. A file with source path
//! `{resource_id}/data/contents/{relative}` is staged at
//! `{storage_root}/{resource_id}/data/contents/{relative}`.
//!
//! Downloads stream into a `.part` file that is renamed into place once
//! complete, so GeoServer never indexes a truncated file. A body cut off
//! mid-transfer is downloaded again with the client's backoff; a download
//! that finally fails removes its `.part` file.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

use geosync_client::retry::retry_transient;
use geosync_client::RepositoryClient;
use geosync_core::{normalize_layer_name, strip_extension, CatalogEntry, LayerDescriptor, ResourceId};

use crate::error::StageError;

/// Suffix of in-flight downloads.
const PARTIAL_SUFFIX: &str = ".part";

/// Stages and unstages files under one storage root.
#[derive(Debug, Clone)]
pub struct Stager {
    repository: RepositoryClient,
    root: PathBuf,
}

impl Stager {
    pub fn new(repository: RepositoryClient, root: PathBuf) -> Self {
        Self { repository, root }
    }

    /// Storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `file://` URI GeoServer is given for a staged file.
    pub fn staged_uri(&self, source_path: &str) -> String {
        let root = self.root.to_string_lossy();
        format!("file://{}/{}", root.trim_end_matches('/'), source_path)
    }

    /// Local path of a staged file, refusing anything that could resolve
    /// outside the storage root.
    pub fn local_path(&self, source_path: &str) -> Result<PathBuf, StageError> {
        let relative = Path::new(source_path);
        let safe = !source_path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StageError::UnsafePath(source_path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn resource_dir(&self, resource_id: &ResourceId) -> PathBuf {
        self.root.join(resource_id.as_str())
    }

    fn contents_dir(&self, resource_id: &ResourceId) -> PathBuf {
        self.resource_dir(resource_id).join("data").join("contents")
    }

    /// Stage a descriptor's primary file and its sidecars.
    pub async fn stage(&self, descriptor: &LayerDescriptor) -> Result<(), StageError> {
        for source_path in descriptor.staged_paths() {
            self.download(source_path).await?;
        }
        tracing::info!(
            layer = %descriptor.layer_name,
            files = 1 + descriptor.associated_files.len(),
            "files staged"
        );
        Ok(())
    }

    /// Download one file into place. An interrupted transfer restarts from
    /// scratch under the client's retry policy. On failure no `.part` file
    /// is left behind.
    async fn download(&self, source_path: &str) -> Result<(), StageError> {
        let target = self.local_path(source_path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_error(parent))?;
        }
        let partial = partial_path(&target);

        let staged = async {
            let written = retry_transient(source_path, StageError::is_transient, || {
                self.fetch_into(source_path, &partial)
            })
            .await?;
            tokio::fs::rename(&partial, &target)
                .await
                .map_err(io_error(&target))?;
            Ok::<u64, StageError>(written)
        }
        .await;

        match staged {
            Ok(written) => {
                tracing::debug!(path = %target.display(), bytes = written, "file staged");
                Ok(())
            }
            Err(e) => {
                if let Err(leftover) = remove_if_present(&partial).await {
                    tracing::warn!("partial download not removed: {leftover}");
                }
                Err(e)
            }
        }
    }

    /// One download attempt into `partial`, truncating whatever an earlier
    /// attempt wrote.
    async fn fetch_into(&self, source_path: &str, partial: &Path) -> Result<u64, StageError> {
        let mut response = self
            .repository
            .open_file(source_path)
            .await
            .map_err(|source| StageError::Download {
                source_path: source_path.to_string(),
                source,
            })?;

        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(io_error(partial))?;
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|source| StageError::Transfer {
                source_path: source_path.to_string(),
                source,
            })?
        {
            file.write_all(&chunk).await.map_err(io_error(partial))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error(partial))?;
        Ok(written)
    }

    /// Remove a descriptor's staged files. Missing files are not an error.
    /// Every file is attempted; the failures are returned.
    pub async fn remove_descriptor_files(&self, descriptor: &LayerDescriptor) -> Vec<StageError> {
        let mut failures = Vec::new();
        for source_path in descriptor.staged_paths() {
            let result = match self.local_path(source_path) {
                Ok(path) => remove_if_present(&path).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                failures.push(e);
            }
        }
        failures
    }

    /// Remove the staged files backing a catalog entry that has no
    /// descriptor. Files are matched by their contents-relative path,
    /// normalized and without extension, and by the entry's store kind.
    pub async fn remove_entry_files(
        &self,
        resource_id: &ResourceId,
        entry: &CatalogEntry,
    ) -> Result<Vec<PathBuf>, StageError> {
        let contents = self.contents_dir(resource_id);
        let name = entry.layer_name.clone();
        let extensions = entry.store_type.staged_extensions();

        let matches = tokio::task::spawn_blocking(move || {
            find_staged_files(&contents, &name, extensions)
        })
        .await
        .map_err(|e| StageError::Io {
            path: self.contents_dir(resource_id),
            source: std::io::Error::new(ErrorKind::Other, e),
        })??;

        for path in &matches {
            remove_if_present(path).await?;
        }
        Ok(matches)
    }

    /// Remove a resource's entire storage subtree. Returns `false` when
    /// nothing was staged.
    pub async fn remove_resource(&self, resource_id: &ResourceId) -> Result<bool, StageError> {
        let dir = self.resource_dir(resource_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::info!(path = %dir.display(), "resource storage removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StageError::Io { path: dir, source }),
        }
    }
}

fn find_staged_files(
    contents: &Path,
    layer_name: &str,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, StageError> {
    if !contents.is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in WalkDir::new(contents).follow_links(false) {
        let entry = entry.map_err(|e| StageError::Io {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| contents.to_path_buf()),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(contents) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let Some((stem, ext)) = relative.rsplit_once('.') else {
            continue;
        };
        if extensions.contains(&ext)
            && normalize_layer_name(strip_extension(&relative)) == layer_name
            && !stem.is_empty()
        {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

fn partial_path(target: &Path) -> PathBuf {
    let mut partial = target.as_os_str().to_owned();
    partial.push(PARTIAL_SUFFIX);
    PathBuf::from(partial)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StageError {
    let path = path.to_path_buf();
    move |source| StageError::Io { path, source }
}

/// Delete a file, treating "already gone" as success.
async fn remove_if_present(path: &Path) -> Result<bool, StageError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StageError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
