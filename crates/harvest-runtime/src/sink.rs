//! Artifact persistence — one blob per found identifier.

use std::path::{Path, PathBuf};

use harvest_core::RegistryItem;

/// Where found artifacts go. The pipeline only ever calls `store`; layout
/// beyond "a blob keyed by identifier" is the sink's business.
pub trait ArtifactSink: Send + Sync {
    /// Persist `payload` for `item`, returning where it landed.
    fn store(&self, item: &RegistryItem, payload: &str) -> Result<PathBuf, SinkError>;
}

/// Persistence failure.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Directory sink: `<root>/<REALM>_<SERIAL>_<DIGIT>.html`, parents created
/// on demand, existing files overwritten.
#[derive(Debug, Clone)]
pub struct DirSink {
    root: PathBuf,
}

impl DirSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_path(&self, item: &RegistryItem) -> PathBuf {
        self.root.join(format!(
            "{}_{}_{}.html",
            item.realm_code, item.serial_number, item.check_digit
        ))
    }
}

impl ArtifactSink for DirSink {
    fn store(&self, item: &RegistryItem, payload: &str) -> Result<PathBuf, SinkError> {
        std::fs::create_dir_all(&self.root).map_err(|source| SinkError::Io {
            path: self.root.display().to_string(),
            source,
        })?;

        let path = self.artifact_path(item);
        std::fs::write(&path, payload).map_err(|source| SinkError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Ok(path)
    }
}
