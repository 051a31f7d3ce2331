use crate::domain::model::Artifact;
use crate::domain::ports::{Publisher, Storage};
use crate::utils::error::{BundleError, Result};
use std::path::{Path, PathBuf};

/// Reads source documents from a local directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl Storage for LocalStorage {
    fn location(&self) -> String {
        self.base_path.display().to_string()
    }

    async fn list_files(&self, extension: &str) -> Result<Vec<String>> {
        if !self.base_path.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }
}

/// Publishes into `output_dir` by filling a sibling staging directory and
/// renaming it into place. The previous output is kept aside until the swap
/// has succeeded and restored if it fails.
#[derive(Debug, Clone)]
pub struct AtomicDirectoryPublisher {
    output_dir: PathBuf,
}

impl AtomicDirectoryPublisher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn sibling(&self, suffix: &str) -> Result<PathBuf> {
        let name = self
            .output_dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BundleError::PublishError {
                message: format!(
                    "output directory '{}' has no usable name",
                    self.output_dir.display()
                ),
            })?;
        let parent = match self.output_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(parent.join(format!(".{}.{}", name, suffix)))
    }

    pub fn staging_dir(&self) -> Result<PathBuf> {
        self.sibling("staging")
    }

    pub fn previous_dir(&self) -> Result<PathBuf> {
        self.sibling("previous")
    }

    async fn write_staging(&self, staging: &Path, artifacts: &[Artifact]) -> Result<()> {
        remove_if_present(staging).await?;
        tokio::fs::create_dir_all(staging).await?;
        for artifact in artifacts {
            tokio::fs::write(staging.join(&artifact.file_name), &artifact.contents).await?;
        }
        Ok(())
    }

    async fn swap(&self, staging: &Path, previous: &Path) -> Result<()> {
        let had_output = tokio::fs::try_exists(&self.output_dir).await?;
        if had_output {
            remove_if_present(previous).await?;
            tokio::fs::rename(&self.output_dir, previous).await?;
        }

        if let Err(e) = tokio::fs::rename(staging, &self.output_dir).await {
            if had_output {
                if let Err(restore) = tokio::fs::rename(previous, &self.output_dir).await {
                    tracing::error!(
                        "Could not restore previous output from {}: {}",
                        previous.display(),
                        restore
                    );
                }
            }
            return Err(BundleError::PublishError {
                message: format!(
                    "could not move {} into place: {}",
                    staging.display(),
                    e
                ),
            });
        }

        if had_output {
            if let Err(e) = tokio::fs::remove_dir_all(previous).await {
                tracing::warn!("Could not remove {}: {}", previous.display(), e);
            }
        }
        Ok(())
    }
}

impl Publisher for AtomicDirectoryPublisher {
    async fn publish(&self, artifacts: Vec<Artifact>) -> Result<String> {
        let staging = self.staging_dir()?;
        let previous = self.previous_dir()?;
        if let Some(parent) = staging.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if let Err(e) = self.write_staging(&staging, &artifacts).await {
            let _ = remove_if_present(&staging).await;
            return Err(e);
        }
        tracing::debug!("Staged {} files in {}", artifacts.len(), staging.display());

        self.swap(&staging, &previous).await?;
        Ok(self.output_dir.display().to_string())
    }
}

async fn remove_if_present(path: &Path) -> Result<()> {
    if tokio::fs::try_exists(path).await? {
        tokio::fs::remove_dir_all(path).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact(name: &str, body: &str) -> Artifact {
        Artifact {
            file_name: name.to_string(),
            contents: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_list_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let storage = LocalStorage::new(dir.path());
        let files = storage.list_files("json").await.unwrap();
        assert_eq!(files, vec!["a.json".to_string(), "b.json".to_string()]);
        assert_eq!(storage.read_file("a.json").await.unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_missing_input_dir_lists_nothing() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("absent"));
        assert!(storage.list_files("json").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_replaces_whole_directory() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("api");
        let publisher = AtomicDirectoryPublisher::new(&out);

        publisher
            .publish(vec![artifact("old.json", "1"), artifact("index.json", "1")])
            .await
            .unwrap();
        assert!(out.join("old.json").exists());

        let location = publisher
            .publish(vec![artifact("index.json", "2")])
            .await
            .unwrap();
        assert_eq!(location, out.display().to_string());
        assert!(!out.join("old.json").exists());
        assert_eq!(std::fs::read_to_string(out.join("index.json")).unwrap(), "2");
        assert!(!publisher.staging_dir().unwrap().exists());
        assert!(!publisher.previous_dir().unwrap().exists());
    }

    #[tokio::test]
    async fn test_failed_staging_keeps_previous_output() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("api");
        let publisher = AtomicDirectoryPublisher::new(&out);
        publisher
            .publish(vec![artifact("index.json", "1")])
            .await
            .unwrap();

        let result = publisher
            .publish(vec![artifact("missing/sub/dir.json", "2")])
            .await;
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(out.join("index.json")).unwrap(), "1");
        assert!(!publisher.staging_dir().unwrap().exists());
    }
}
