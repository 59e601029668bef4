use crate::models::ErrorKind;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Every file this service places in the scratch directory starts with this
/// prefix, including collaborator output (it shares the staged stem).
pub const STAGING_PREFIX: &str = "upload-";

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("failed to allocate staging file in {dir}: {source}")]
    Allocate {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write staged payload to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Stems of handles that have not been released yet. Only the sweeper reads
/// it; requests never look at each other's entries.
type LiveStems = Arc<Mutex<HashSet<String>>>;

/// The shared scratch area. Requests never coordinate through it; isolation
/// comes entirely from the uniqueness of the generated names.
///
/// Clones share the set of in-flight stems, so a janitor built from a clone
/// of the service's scratch space never sweeps a file that is still in use.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    dir: PathBuf,
    live: LiveStems,
}

impl ScratchSpace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            live: LiveStems::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_exists(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Number of staged files whose handles are still alive.
    pub fn in_flight(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }

    /// Writes `payload` to a freshly allocated, uniquely named file ending in
    /// `suffix`. The returned handle deletes the file (and any sibling it
    /// tracks) when released or dropped.
    pub async fn stage(
        &self,
        payload: &[u8],
        suffix: &str,
    ) -> Result<StagedFileHandle, StagingError> {
        // Random name plus O_EXCL creation: concurrent requests never share a path.
        let named = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(suffix)
            .tempfile_in(&self.dir)
            .map_err(|source| StagingError::Allocate {
                dir: self.dir.clone(),
                source,
            })?;

        // Ownership of deletion moves from tempfile to the handle, which logs
        // cleanup failures instead of swallowing them.
        let (file, path) = named.keep().map_err(|e| StagingError::Allocate {
            dir: self.dir.clone(),
            source: e.error,
        })?;
        let handle = StagedFileHandle::new(path, suffix, Arc::clone(&self.live));

        let mut file = tokio::fs::File::from_std(file);
        let write_err = |source: io::Error| StagingError::Write {
            path: handle.path().to_path_buf(),
            source,
        };
        file.write_all(payload).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        drop(file);

        debug!(
            "Staged {} bytes at {}",
            payload.len(),
            handle.path().display()
        );
        Ok(handle)
    }

    /// Removes files carrying [`STAGING_PREFIX`] whose last modification is
    /// at least `max_age` ago. Files belonging to a handle that is still
    /// alive are skipped regardless of age. Returns the number of files
    /// removed.
    pub async fn sweep_stale(&self, max_age: Duration) -> io::Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(STAGING_PREFIX) || self.is_live(&name) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            let is_stale = metadata
                .modified()
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .is_some_and(|age| age >= max_age);

            if is_stale {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => warn!(
                        kind = %ErrorKind::CleanupFailure,
                        path = %entry.path().display(),
                        "Failed to sweep stale artifact: {}",
                        e
                    ),
                }
            }
        }

        Ok(removed)
    }

    fn is_live(&self, name: &str) -> bool {
        match self.live.lock() {
            Ok(live) => live.iter().any(|stem| shares_stem(name, stem)),
            // A poisoned set means a panic mid-update; keep everything.
            Err(_) => true,
        }
    }
}

/// Scoped ownership of one staged file plus the siblings derived from it.
#[derive(Debug)]
pub struct StagedFileHandle {
    path: PathBuf,
    suffix: String,
    stem: String,
    siblings: Vec<PathBuf>,
    live: LiveStems,
    released: bool,
}

impl StagedFileHandle {
    fn new(path: PathBuf, suffix: &str, live: LiveStems) -> Self {
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Ok(mut set) = live.lock() {
            set.insert(stem.clone());
        }
        Self {
            path,
            suffix: suffix.to_string(),
            stem,
            siblings: Vec::new(),
            live,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn parent(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Computes the sibling path for `new_suffix` and makes this handle
    /// responsible for deleting it too, whether or not it ever gets created.
    pub fn claim_sibling(&mut self, new_suffix: &str) -> PathBuf {
        let sibling = derive_sibling(&self.path, new_suffix);
        if !self.siblings.contains(&sibling) {
            self.siblings.push(sibling.clone());
        }
        sibling
    }

    pub fn artifacts(&self) -> Vec<PathBuf> {
        std::iter::once(self.path.clone())
            .chain(self.siblings.iter().cloned())
            .collect()
    }

    /// Deletes the staged file, every claimed sibling, and any other file in
    /// the scratch directory the collaborator named after the same stem.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        release(&self.artifacts());
        release(&self.strays());
        if let Ok(mut set) = self.live.lock() {
            set.remove(&self.stem);
        }
    }

    /// Regular files next to the input that share its stem but were never
    /// claimed, e.g. `upload-AbC123_basic_pitch.mid`.
    fn strays(&self) -> Vec<PathBuf> {
        if self.stem.is_empty() {
            return Vec::new();
        }
        let Ok(entries) = std::fs::read_dir(self.parent()) else {
            return Vec::new();
        };
        let artifacts = self.artifacts();
        entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| shares_stem(&name.to_string_lossy(), &self.stem))
            })
            .filter(|path| !artifacts.contains(path))
            .collect()
    }
}

impl Drop for StagedFileHandle {
    fn drop(&mut self) {
        // Reached on error returns, timeouts, dropped futures and unwinding panics.
        self.release_inner();
    }
}

/// Same stem, different extension. This is the only place the naming rule
/// shared with the collaborator lives.
pub fn derive_sibling(path: &Path, new_suffix: &str) -> PathBuf {
    path.with_extension(new_suffix.trim_start_matches('.'))
}

/// `name` is the stem itself or the stem followed by an extension or an
/// underscore-separated tag.
fn shares_stem(name: &str, stem: &str) -> bool {
    name.strip_prefix(stem)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.') || rest.starts_with('_'))
}

/// Best-effort deletion. Missing files are fine; other failures are logged
/// and never propagated.
pub fn release<P: AsRef<Path>>(paths: &[P]) {
    for path in paths {
        let path = path.as_ref();
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Released {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                kind = %ErrorKind::CleanupFailure,
                path = %path.display(),
                "Failed to release staged artifact: {}",
                e
            ),
        }
    }
}
