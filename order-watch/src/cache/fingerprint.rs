use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// In-memory fingerprint map with an optional JSON file mirror
///
/// 显式构造并注入检测器与分发器；生命周期为 `load` → 若干次 `put` → `save`。
#[derive(Debug)]
pub struct FingerprintCache {
    entries: RwLock<HashMap<String, String>>,
    path: Option<PathBuf>,
    /// 自上次保存以来是否有变更
    dirty: AtomicBool,
}

impl FingerprintCache {
    /// 纯内存缓存，不落盘
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            path: None,
            dirty: AtomicBool::new(false),
        }
    }

    /// Load the whole map from `path`
    ///
    /// 文件不存在或内容损坏时从空缓存开始；快照库仍然是权威来源。
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, String>>(&bytes) {
                Ok(map) => {
                    tracing::info!(path = %path.display(), entries = map.len(), "Fingerprint cache loaded");
                    map
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Fingerprint cache corrupted, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read fingerprint cache, starting empty");
                HashMap::new()
            }
        };

        Self {
            entries: RwLock::new(entries),
            path: Some(path),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn get(&self, order_id: &str) -> Option<String> {
        self.entries.read().get(order_id).cloned()
    }

    /// 与缓存值一致
    pub fn matches(&self, order_id: &str, fingerprint: &str) -> bool {
        self.entries
            .read()
            .get(order_id)
            .is_some_and(|cached| cached == fingerprint)
    }

    /// 写入指纹，返回是否发生变化
    pub fn put(&self, order_id: &str, fingerprint: &str) -> bool {
        let mut entries = self.entries.write();
        if entries.get(order_id).is_some_and(|cached| cached == fingerprint) {
            return false;
        }
        entries.insert(order_id.to_string(), fingerprint.to_string());
        self.dirty.store(true, Ordering::Release);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Rewrite the whole file
    ///
    /// 先写临时文件再 rename，进程中途退出不会留下半个文件。
    pub fn save(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            self.dirty.store(false, Ordering::Release);
            return Ok(());
        };

        // 先清标记：序列化期间的并发写入会再次置位
        self.dirty.store(false, Ordering::Release);
        let bytes = {
            let entries = self.entries.read();
            serde_json::to_vec_pretty(&*entries)?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        let result = std::fs::write(&tmp, &bytes).and_then(|_| std::fs::rename(&tmp, path));
        if let Err(e) = result {
            self.dirty.store(true, Ordering::Release);
            return Err(e.into());
        }

        tracing::debug!(path = %path.display(), "Fingerprint cache saved");
        Ok(())
    }

    /// 有变更时保存；失败只记录日志
    pub fn flush_if_dirty(&self) {
        if !self.is_dirty() {
            return;
        }
        if let Err(e) = self.save() {
            tracing::error!(error = %e, "Failed to persist fingerprint cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_reports_change() {
        let cache = FingerprintCache::in_memory();
        assert!(cache.put("100", "a"));
        assert!(!cache.put("100", "a"));
        assert!(cache.put("100", "b"));
        assert_eq!(cache.get("100").as_deref(), Some("b"));
        assert!(cache.matches("100", "b"));
        assert!(!cache.matches("101", "b"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status_cache.json");

        let cache = FingerprintCache::load(&path);
        assert!(cache.is_empty());
        cache.put("100", "fp-100");
        cache.put("101", "fp-101");
        assert!(cache.is_dirty());
        cache.flush_if_dirty();
        assert!(!cache.is_dirty());
        assert!(!dir.path().join("status_cache.json.tmp").exists());

        let reloaded = FingerprintCache::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("101").as_deref(), Some("fp-101"));
    }

    #[test]
    fn test_corrupted_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status_cache.json");
        std::fs::write(&path, "{not json").unwrap();

        let cache = FingerprintCache::load(&path);
        assert!(cache.is_empty());
        cache.put("100", "x");
        cache.save().unwrap();
        assert_eq!(FingerprintCache::load(&path).len(), 1);
    }
}
