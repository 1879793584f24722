use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{Result, SocError};

use super::{Adapter, AdapterHealth, AdapterStatus, StorageAdapter, UploadResult};

/// Content-addressed local filesystem storage (spec §4.6 Storage role).
/// Suitable for single-node deployments and air-gapped environments; keys
/// are normalized relative paths under `base_path`, rejecting traversal.
pub struct LocalStorageAdapter {
    base_path: PathBuf,
}

impl LocalStorageAdapter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        LocalStorageAdapter { base_path: base_path.into() }
    }

    fn full_path(&self, key: &str) -> Result<PathBuf> {
        let candidate = Path::new(key);
        if candidate.is_absolute() || candidate.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            return Err(SocError::validation(format!("invalid storage key: {key}")));
        }
        Ok(self.base_path.join(candidate))
    }
}

#[async_trait]
impl Adapter for LocalStorageAdapter {
    fn name(&self) -> &str {
        "local"
    }

    async fn connect(&self) -> bool {
        fs::create_dir_all(&self.base_path).await.is_ok()
    }

    async fn disconnect(&self) {}

    async fn health_check(&self) -> AdapterHealth {
        match fs::metadata(&self.base_path).await {
            Ok(_) => AdapterHealth {
                status: AdapterStatus::Connected,
                version: None,
                message: Some("local storage reachable".into()),
                details: None,
            },
            Err(e) => AdapterHealth { status: AdapterStatus::Error, version: None, message: Some(e.to_string()), details: None },
        }
    }

    fn get_config(&self) -> Value {
        json!({"base_path": self.base_path.display().to_string()})
    }
}

#[async_trait]
impl StorageAdapter for LocalStorageAdapter {
    async fn upload_bytes(&self, key: &str, data: &[u8]) -> Result<UploadResult> {
        let full = self.full_path(key)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, data).await?;
        let sha256 = format!("{:x}", Sha256::digest(data));
        Ok(UploadResult { key: key.to_string(), size: data.len() as u64, sha256 })
    }

    async fn download_bytes(&self, key: &str) -> Result<Vec<u8>> {
        let full = self.full_path(key)?;
        fs::read(&full).await.map_err(|e| SocError::not_found(format!("{key}: {e}")))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let full = self.full_path(key)?;
        Ok(fs::metadata(&full).await.is_ok())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let full = self.full_path(key)?;
        match fs::remove_file(&full).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_download_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = LocalStorageAdapter::new(dir.path());
        adapter.connect().await;

        let result = adapter.upload_bytes("evidence/case1/file.bin", b"hello world").await.unwrap();
        assert_eq!(result.size, 11);

        let downloaded = adapter.download_bytes("evidence/case1/file.bin").await.unwrap();
        assert_eq!(downloaded, b"hello world");
    }

    #[tokio::test]
    async fn traversal_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = LocalStorageAdapter::new(dir.path());
        let err = adapter.upload_bytes("../escape.bin", b"x").await.unwrap_err();
        assert!(matches!(err, SocError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_reports_whether_file_existed() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = LocalStorageAdapter::new(dir.path());
        adapter.upload_bytes("a.bin", b"x").await.unwrap();
        assert!(adapter.delete("a.bin").await.unwrap());
        assert!(!adapter.delete("a.bin").await.unwrap());
    }
}
