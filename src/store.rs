// src/store.rs
//! Local digest cache: one serialized [`CachedDigest`] per session key (region).
//!
//! Absent or corrupt payloads are a cache miss, never a failure.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;

use crate::digest::CachedDigest;
use crate::error::DigestError;
use crate::region::Region;

#[async_trait]
pub trait DigestStore: Send + Sync {
    /// `None` on absence or corruption.
    async fn load(&self, region: Region) -> Option<CachedDigest>;
    async fn save(&self, digest: &CachedDigest) -> Result<(), DigestError>;
}

/// JSON files under a directory, written atomically (tmp + rename).
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, region: Region) -> PathBuf {
        self.dir.join(format!("{}.json", region.as_str().to_ascii_lowercase()))
    }
}

#[async_trait]
impl DigestStore for FileStore {
    async fn load(&self, region: Region) -> Option<CachedDigest> {
        let path = self.path_for(region);
        let bytes = match fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(target: "store", path = %path.display(), "unreadable digest cache: {e}");
                return None;
            }
        };
        match serde_json::from_slice::<CachedDigest>(&bytes) {
            // a file renamed by hand must not serve another region;
            // derived fields are recomputed, never trusted from disk
            Ok(d) if d.region == region => Some(d.rederive()),
            Ok(d) => {
                tracing::warn!(target: "store", expected = %region, found = %d.region, "digest cache region mismatch");
                None
            }
            Err(e) => {
                tracing::warn!(target: "store", path = %path.display(), "corrupt digest cache: {e}");
                None
            }
        }
    }

    async fn save(&self, digest: &CachedDigest) -> Result<(), DigestError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DigestError::Cache(format!("create {}: {e}", self.dir.display())))?;
        let path = self.path_for(digest.region);
        let tmp = path.with_extension("json.tmp");
        let json =
            serde_json::to_vec(digest).map_err(|e| DigestError::Cache(format!("encode: {e}")))?;
        fs::write(&tmp, json)
            .await
            .map_err(|e| DigestError::Cache(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| DigestError::Cache(format!("rename {}: {e}", path.display())))?;
        Ok(())
    }
}

/// In-process store for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<Region, CachedDigest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|g| g.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DigestStore for MemoryStore {
    async fn load(&self, region: Region) -> Option<CachedDigest> {
        self.inner.lock().ok()?.get(&region).cloned()
    }

    async fn save(&self, digest: &CachedDigest) -> Result<(), DigestError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|_| DigestError::Cache("memory store poisoned".into()))?;
        g.insert(digest.region, digest.clone());
        Ok(())
    }
}
