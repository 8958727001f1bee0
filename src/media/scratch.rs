use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ScratchConfig;
use crate::error::DubError;

/// Shared root for disposable intermediates.
///
/// Every run works inside its own `<root>/<uuid>/` directory, so concurrent
/// runs never collide on file names.
#[derive(Debug, Clone)]
pub struct ScratchArea {
    root: PathBuf,
    keep_intermediates: bool,
}

impl ScratchArea {
    pub fn new(config: &ScratchConfig) -> Self {
        Self {
            root: config.root.clone(),
            keep_intermediates: config.keep_intermediates,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session(&self) -> Result<ScratchDir, DubError> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| DubError::io("creating scratch root", e))?;

        let id = Uuid::new_v4();
        let path = self.root.join(id.to_string());
        std::fs::create_dir(&path).map_err(|e| DubError::io("creating scratch directory", e))?;
        debug!(path = %path.display(), "Scratch directory created");

        Ok(ScratchDir {
            id,
            path,
            keep: self.keep_intermediates,
        })
    }
}

/// Per-run scratch directory, removed (best effort) when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    id: Uuid,
    path: PathBuf,
    keep: bool,
}

impl ScratchDir {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.keep {
            info!(path = %self.path.display(), "Keeping scratch directory");
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Scratch directory removed"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove scratch directory"),
        }
    }
}
