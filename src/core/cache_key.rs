//! # Cache Key Resolver Module / 缓存键解析模块
//!
//! A cache key is `[prefix-]<os>-<sha256 of the lock artifact>`. Variants that
//! share an operating system and a lockfile share a key, and therefore a cache
//! namespace.
//!
//! 缓存键的格式为 `[前缀-]<操作系统>-<锁文件的 sha256>`。共享操作系统和锁文件
//! 的变体共享同一个键，因此也共享同一个缓存命名空间。

use crate::core::error::InputError;
use crate::core::models::Variant;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Selects a cache namespace.
/// 选择一个缓存命名空间。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store address of the entry holding `path` inside this namespace.
    /// 该命名空间中保存 `path` 的条目在存储中的地址。
    pub fn entry(&self, path: &Path) -> String {
        format!("{}/{}", self.0, path.to_string_lossy().replace('\\', "/"))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes cache keys, optionally under a namespace prefix.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyResolver {
    prefix: Option<String>,
}

impl CacheKeyResolver {
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()),
        }
    }

    /// Pure function of the variant's OS and the lock bytes.
    /// 仅由变体的操作系统和锁文件字节决定的纯函数。
    ///
    /// # Errors
    /// [`InputError::MissingLockContent`] when `lock_content` is `None`.
    pub fn resolve(
        &self,
        variant: &Variant,
        lock_content: Option<&[u8]>,
    ) -> Result<CacheKey, InputError> {
        let content = lock_content.ok_or_else(|| InputError::MissingLockContent {
            variant: variant.id.clone(),
        })?;
        let digest = hex::encode(Sha256::digest(content));
        let key = match &self.prefix {
            Some(prefix) => format!("{prefix}-{}-{digest}", variant.os),
            None => format!("{}-{digest}", variant.os),
        };
        Ok(CacheKey(key))
    }
}

/// Resolves a key without a prefix.
pub fn resolve(variant: &Variant, lock_content: Option<&[u8]>) -> Result<CacheKey, InputError> {
    CacheKeyResolver::default().resolve(variant, lock_content)
}
