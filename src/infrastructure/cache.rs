//! 模型响应缓存
//!
//! 内容寻址：键是 (模型, 消息, 温度) 规范 JSON 的 SHA-256。
//! 写入幂等，因此多个 Run 并发写同一个键是安全的。

use crate::clients::backend::ChatMessage;
use crate::error::CacheError;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// 缓存键（64 位十六进制）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn compute(model: &str, messages: &[ChatMessage], temperature: f32) -> Self {
        let canonical = json!({
            "model": model,
            "messages": messages,
            "temperature": format!("{:.3}", temperature),
        });
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 缓存存储
pub trait CacheStore: Send + Sync {
    /// 未命中或内容损坏时返回 None
    fn get(&self, key: &CacheKey) -> Option<Value>;

    fn put(&self, key: &CacheKey, value: &Value) -> Result<(), CacheError>;
}

/// 文件系统缓存
///
/// 布局：`<root>/<前 2 位>/<其余位>.json`
pub struct FsCache {
    root: PathBuf,
}

impl FsCache {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, CacheError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| CacheError::WriteFailed {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let hex = key.as_str();
        self.root.join(&hex[..2]).join(format!("{}.json", &hex[2..]))
    }
}

impl CacheStore for FsCache {
    fn get(&self, key: &CacheKey) -> Option<Value> {
        let path = self.entry_path(key);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("⚠️ 缓存条目损坏，按未命中处理 ({}): {}", path.display(), e);
                None
            }
        }
    }

    fn put(&self, key: &CacheKey, value: &Value) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        if path.exists() {
            return Ok(());
        }

        let write_failed = |source: std::io::Error| CacheError::WriteFailed {
            path: path.display().to_string(),
            source,
        };

        let shard_dir = self.root.join(&key.as_str()[..2]);
        fs::create_dir_all(&shard_dir).map_err(write_failed)?;

        let bytes = serde_json::to_vec(value)?;
        let mut tmp = NamedTempFile::new_in(&shard_dir).map_err(write_failed)?;
        tmp.write_all(&bytes).map_err(write_failed)?;
        tmp.persist(&path).map_err(|e| write_failed(e.error))?;

        debug!("缓存写入: {}", path.display());
        Ok(())
    }
}

/// 内存缓存
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<Value> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn put(&self, key: &CacheKey, value: &Value) -> Result<(), CacheError> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(key.clone())
            .or_insert_with(|| value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(text: &str) -> CacheKey {
        CacheKey::compute("gpt-4o", &[ChatMessage::user(text)], 0.3)
    }

    #[test]
    fn test_key_is_stable_and_sensitive() {
        assert_eq!(key("a"), key("a"));
        assert_ne!(key("a"), key("b"));
        assert_eq!(key("a").as_str().len(), 64);
        let other_temp = CacheKey::compute("gpt-4o", &[ChatMessage::user("a")], 0.7);
        assert_ne!(key("a"), other_temp);
        let other_model = CacheKey::compute("gpt-4o-mini", &[ChatMessage::user("a")], 0.3);
        assert_ne!(key("a"), other_model);
    }

    #[test]
    fn test_fs_cache_roundtrip_with_sharding() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCache::new(dir.path()).unwrap();
        let k = key("hello");
        assert!(cache.get(&k).is_none());

        cache.put(&k, &json!({"summary": "ok"})).unwrap();
        assert_eq!(cache.get(&k).unwrap()["summary"], "ok");

        let shard = dir.path().join(&k.as_str()[..2]);
        let entries: Vec<_> = std::fs::read_dir(shard).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_fs_cache_put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCache::new(dir.path()).unwrap();
        let k = key("same");
        cache.put(&k, &json!({"n": 1})).unwrap();
        cache.put(&k, &json!({"n": 2})).unwrap();
        assert_eq!(cache.get(&k).unwrap()["n"], 1);
    }

    #[test]
    fn test_corrupted_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCache::new(dir.path()).unwrap();
        let k = key("broken");
        let path = cache.entry_path(&k);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(cache.get(&k).is_none());
    }

    #[test]
    fn test_memory_cache() {
        let cache = MemoryCache::new();
        assert!(cache.is_empty());
        cache.put(&key("x"), &json!({"a": 1})).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key("x")).unwrap()["a"], 1);
    }
}
