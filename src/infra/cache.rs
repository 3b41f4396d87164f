//! # Cache Store Module / 缓存存储模块
//!
//! A narrow get/put-by-key capability over byte blobs, with an in-memory
//! implementation and a directory-backed one. Readers never observe a
//! half-written entry: the memory store swaps whole entries under a lock and
//! the filesystem store renames a fully written temp file into place.
//!
//! 基于键的字节块 get/put 窄接口，提供内存实现和基于目录的实现。
//! 读取方永远不会看到写了一半的条目：内存存储在锁内整体替换条目，
//! 文件系统存储则将完整写入的临时文件重命名到目标位置。

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::error::CacheError;

/// Persistent cache storage addressed by string keys.
/// 以字符串键寻址的持久缓存存储。
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// `Ok(None)` is a cache miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Replaces the entry for `key`. Concurrent writers: last one wins.
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), CacheError>;
}

/// Process-local store, mainly for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryCacheStore {
    entries: Arc<RwLock<HashMap<String, Arc<Vec<u8>>>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).map(|blob| blob.as_ref().clone()))
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), Arc::new(data));
        Ok(())
    }
}

/// Stores each entry as one file under a root directory.
/// 将每个条目作为根目录下的一个文件存储。
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys may contain any character, so file names are their digest.
    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.root.join(format!("{digest}.cache"))
    }
}

#[async_trait]
impl CacheStore for FsCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match tokio::fs::read(self.entry_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Store {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), CacheError> {
        let root = self.root.clone();
        let target = self.entry_path(key);
        let owned_key = key.to_string();

        let written = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&root)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&root)?;
            tmp.write_all(&data)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| CacheError::Worker(e.to_string()))?;

        written.map_err(|source| CacheError::Store {
            key: owned_key,
            source,
        })
    }
}
