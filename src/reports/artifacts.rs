use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::exporter::Artifact;
use crate::errors::AppError;

/// Directory of previously exported files, served back by name.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn save(&self, artifact: &Artifact) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&artifact.file_name);
        tokio::fs::write(&path, &artifact.bytes).await?;
        Ok(path)
    }

    /// Reads a stored file. Names carrying any path segment are rejected
    /// before the file system is touched.
    pub async fn open(&self, file_name: &str) -> Result<Vec<u8>, AppError> {
        let base = checked_base_name(file_name)?;

        match tokio::fs::read(self.dir.join(base)).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(AppError::not_found("file not found")),
            Err(err) => {
                tracing::error!(file_name = %base, error = %err, "failed to read stored report");
                Err(AppError::internal("failed to read file"))
            }
        }
    }
}

fn checked_base_name(file_name: &str) -> Result<&str, AppError> {
    let invalid = || AppError::bad_request("invalid file name");

    if file_name.is_empty()
        || file_name.contains('/')
        || file_name.contains('\\')
        || file_name.contains("..")
        || file_name.contains('\0')
    {
        return Err(invalid());
    }

    let base = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(invalid)?;

    if base != file_name {
        return Err(invalid());
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(name: &str) -> Artifact {
        Artifact {
            title: "t".to_string(),
            file_name: name.to_string(),
            content_type: crate::reports::exporter::XLSX_CONTENT_TYPE,
            bytes: b"a,b\n".to_vec(),
        }
    }

    #[tokio::test]
    async fn saved_files_can_be_opened() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("downloads"));

        store.save(&artifact("report_20240315_090000.xlsx")).await.unwrap();
        let bytes = store.open("report_20240315_090000.xlsx").await.unwrap();
        assert_eq!(bytes, b"a,b\n");
    }

    #[tokio::test]
    async fn traversal_is_rejected_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        for name in ["../secret.xlsx", "sub/file.xlsx", "..\\win.xlsx", "..", ""] {
            let err = store.open(name).await.unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "{name}");
        }
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let err = store.open("nope.xlsx").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
