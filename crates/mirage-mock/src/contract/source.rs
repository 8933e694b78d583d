//! Where contract text is loaded from and saved to.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Contract source I/O failure, kept apart from validation errors.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Contract source '{id}' unavailable: {source}")]
    Io {
        id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Contract source '{id}' is not valid UTF-8")]
    Encoding { id: String },
}

#[async_trait]
pub trait ContractSource: Send + Sync {
    async fn load(&self) -> Result<String, SourceError>;
    async fn save(&self, text: &str) -> Result<(), SourceError>;
    fn id(&self) -> String;
}

/// Contract stored in a single file.
///
/// Saves go through a temporary file in the same directory followed by a
/// rename, so readers never observe a half-written contract.
#[derive(Debug, Clone)]
pub struct FileContractSource {
    path: PathBuf,
}

impl FileContractSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SourceError {
        SourceError::Io {
            id: self.id(),
            source,
        }
    }
}

#[async_trait]
impl ContractSource for FileContractSource {
    async fn load(&self) -> Result<String, SourceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        String::from_utf8(bytes).map_err(|_| SourceError::Encoding { id: self.id() })
    }

    async fn save(&self, text: &str) -> Result<(), SourceError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "contract".to_string());
        let tmp = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        tokio::fs::write(&tmp, text.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.io_error(e));
        }
        Ok(())
    }

    fn id(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
