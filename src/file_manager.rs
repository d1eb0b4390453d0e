// src/file_manager.rs - loading and saving sliced jobs
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use crate::job::GcodeJob;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON job error: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk representation of a job, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFormat {
    /// Flat G-code, a single plate.
    Gcode,
    /// `{"plates": {"<id>": {"chunks": [...]}}}`
    Json,
}

impl JobFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Gcode,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileManager {
    base_dir: PathBuf,
}

impl Default for FileManager {
    fn default() -> Self {
        Self::new(".")
    }
}

impl FileManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub async fn read_job(&self, path: impl AsRef<Path>) -> Result<GcodeJob, FileError> {
        let path = self.resolve(path.as_ref());
        tracing::info!("Reading job: {}", path.display());
        let content = fs::read_to_string(&path).await.map_err(|source| FileError::Io {
            path: path.clone(),
            source,
        })?;

        let job = match JobFormat::from_path(&path) {
            JobFormat::Json => serde_json::from_str(&content)?,
            JobFormat::Gcode => GcodeJob::from_gcode(&content),
        };
        tracing::debug!("Loaded {} plate(s) from {}", job.plates.len(), path.display());
        Ok(job)
    }

    pub async fn write_job(&self, path: impl AsRef<Path>, job: &GcodeJob) -> Result<(), FileError> {
        let path = self.resolve(path.as_ref());
        tracing::info!("Writing job: {}", path.display());
        let content = match JobFormat::from_path(&path) {
            JobFormat::Json => serde_json::to_string_pretty(job)?,
            JobFormat::Gcode => job.to_gcode(),
        };
        fs::write(&path, content)
            .await
            .map_err(|source| FileError::Io { path, source })
    }
}
