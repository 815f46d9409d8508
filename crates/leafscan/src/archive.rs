use std::path::{Path, PathBuf};
use chrono::{DateTime, Local};
use tracing::debug;

/// Keeps a copy of every analyzed upload. Files are never read back.
#[derive(Debug, Clone)]
pub struct UploadArchive {
    dir: PathBuf,
}

impl UploadArchive {
    /// Creates `dir` if needed
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `analysis_YYYYMMDD_HHMMSS.jpg` for the given moment
    pub fn file_name(at: DateTime<Local>) -> String {
        format!("analysis_{}.jpg", at.format("%Y%m%d_%H%M%S"))
    }

    /// Two uploads within the same second share a name; the later one wins.
    pub async fn store(&self, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.dir.join(Self::file_name(Local::now()));
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "upload archived");
        Ok(path)
    }
}
