use std::path::PathBuf;
use tracing::debug;

use crate::error::{CallseqError, Result};

/// Persists rendered diagrams into an output directory
pub struct DiagramWriter {
    directory: PathBuf,
}

impl DiagramWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Write `contents` as `file_name`, creating the directory when missing.
    /// Returns the written path.
    pub fn write(&self, file_name: &str, contents: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.directory).map_err(|e| CallseqError::Persistence {
            path: self.directory.clone(),
            reason: e.to_string(),
        })?;

        let path = self.directory.join(file_name);
        std::fs::write(&path, contents).map_err(|e| CallseqError::Persistence {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(path)
    }
}
