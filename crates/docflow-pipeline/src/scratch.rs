//! Per-request scratch storage
//!
//! Every [`ScratchSpace`] owns one directory under the upload root and one
//! under the output root, both named after its request id. Every path it
//! hands out lives inside those directories and is recorded in its cleanup
//! set. Cleanup removes the directories themselves, so a write that is still
//! in flight when the request goes away (a detached blocking write, a
//! renderer that has not exited yet) fails instead of leaving a file behind.
//!
//! Cleanup runs exactly once: through [`ScratchSpace::close`] on the
//! blocking pool, through [`ScratchSpace::release`], or when the guard is
//! dropped, which covers early returns, errors and cancelled requests alike.

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::ScratchConfig;

/// A writer may recreate an entry between listing and `remove_dir`
const PURGE_ATTEMPTS: usize = 8;

/// Request-scoped scratch namespace and cleanup registry
#[derive(Debug)]
pub struct ScratchSpace {
    request_id: Uuid,
    upload_dir: PathBuf,
    output_dir: PathBuf,
    tracked: Vec<PathBuf>,
    released: bool,
}

impl ScratchSpace {
    /// Create the request's directories under both scratch roots
    pub fn new(config: &ScratchConfig) -> io::Result<Self> {
        let request_id = Uuid::new_v4();
        let upload_dir = config.upload_dir.join(request_id.to_string());
        let output_dir = config.output_dir.join(request_id.to_string());

        std::fs::create_dir(&upload_dir)?;
        if let Err(e) = std::fs::create_dir(&output_dir) {
            purge_dir(request_id, &upload_dir);
            return Err(e);
        }

        Ok(Self {
            request_id,
            upload_dir,
            output_dir,
            tracked: Vec::new(),
            released: false,
        })
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Where the upload with this ordinal is persisted.
    ///
    /// Only the (already validated) extension survives from the client's
    /// file name, so duplicate names never collide.
    pub fn upload_path(&mut self, ordinal: usize, extension: &str) -> PathBuf {
        let name = format!("{}.{}", ordinal, extension.to_ascii_lowercase());
        let path = self.upload_dir.join(name);
        self.track(path)
    }

    pub fn converted_path(&mut self, ordinal: usize) -> PathBuf {
        let path = self.output_dir.join(format!("{}.pdf", ordinal));
        self.track(path)
    }

    pub fn protected_path(&mut self, ordinal: usize) -> PathBuf {
        let path = self.output_dir.join(format!("{}-protected.pdf", ordinal));
        self.track(path)
    }

    pub fn merged_path(&mut self) -> PathBuf {
        let path = self
            .output_dir
            .join(format!("merged_{}.pdf", self.request_id));
        self.track(path)
    }

    pub fn archive_path(&mut self) -> PathBuf {
        let path = self
            .output_dir
            .join(format!("converted_pdfs_{}.zip", self.request_id));
        self.track(path)
    }

    /// Paths handed out and not yet cleaned up
    pub fn tracked(&self) -> &[PathBuf] {
        &self.tracked
    }

    /// Delete everything this request wrote and return how many files were
    /// removed.
    ///
    /// Missing files are skipped. Other failures are logged and otherwise
    /// ignored. Only the first call does any work.
    pub fn release(&mut self) -> usize {
        match self.take() {
            Some(dirs) => dirs.purge(),
            None => 0,
        }
    }

    /// [`release`](Self::release) on the blocking thread pool
    pub async fn close(mut self) -> usize {
        let Some(dirs) = self.take() else {
            return 0;
        };
        // The purge finishes even if this future is dropped
        tokio::task::spawn_blocking(move || dirs.purge())
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "scratch cleanup task failed");
                0
            })
    }

    fn take(&mut self) -> Option<RequestDirs> {
        if self.released {
            return None;
        }
        self.released = true;
        self.tracked.clear();
        Some(RequestDirs {
            request_id: self.request_id,
            dirs: [self.upload_dir.clone(), self.output_dir.clone()],
        })
    }

    fn track(&mut self, path: PathBuf) -> PathBuf {
        self.tracked.push(path.clone());
        path
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        self.release();
    }
}

struct RequestDirs {
    request_id: Uuid,
    dirs: [PathBuf; 2],
}

impl RequestDirs {
    fn purge(self) -> usize {
        let removed: usize = self
            .dirs
            .iter()
            .map(|dir| purge_dir(self.request_id, dir))
            .sum();
        if removed > 0 {
            tracing::debug!(request_id = %self.request_id, removed, "released scratch files");
        }
        removed
    }
}

/// Empty `dir` and remove it, retrying when entries reappear meanwhile
fn purge_dir(request_id: Uuid, dir: &Path) -> usize {
    let mut removed = 0;

    for attempt in 1..=PURGE_ATTEMPTS {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return removed,
            Err(e) => {
                warn_failed(request_id, dir, &e);
                return removed;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn_failed(request_id, &path, &e),
            }
        }

        match std::fs::remove_dir(dir) {
            Ok(()) => return removed,
            Err(e) if e.kind() == ErrorKind::NotFound => return removed,
            Err(e) if attempt == PURGE_ATTEMPTS => warn_failed(request_id, dir, &e),
            Err(_) => continue,
        }
    }

    removed
}

fn warn_failed(request_id: Uuid, path: &Path, error: &io::Error) {
    tracing::warn!(
        request_id = %request_id,
        path = %path.display(),
        error = %error,
        "failed to delete scratch file"
    );
}

/// Remove a file a failed step may have left behind, ignoring absence
pub(crate) async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to discard partial output");
        }
    }
}
