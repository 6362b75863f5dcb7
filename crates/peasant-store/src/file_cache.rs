//! A filesystem-backed [`BlobCache`]. Keys (e.g. `queued/7`) are mapped onto
//! relative file paths under a root directory; writes go to a sibling
//! `.tmp` file and are atomically renamed into place, the same pattern the
//! rest of this lineage uses for every durable write.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use peasant_types::BlobCache;

pub struct FileBlobCache {
    root: PathBuf,
}

impl FileBlobCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl BlobCache for FileBlobCache {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)
            .with_context(|| format!("failed to read cache entry {}", path.display()))?;
        Ok(Some(data))
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create cache dir {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, data)
            .with_context(|| format!("failed to write cache tmp file {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to rename cache entry into {}", path.display()))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed to delete cache entry {}", path.display()))?;
        }
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.path_for(key).exists())
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.root.join(prefix);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("failed to list cache dir {}", dir.display()))?
        {
            let entry = entry.context("failed to read cache dir entry")?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                keys.push(format!("{prefix}/{name}"));
            }
        }
        Ok(keys)
    }
}
