//! Incremental cache: keyed by a SHA-256 hash of the source text, storing
//! a compiled `ComponentIr` so unchanged files skip the analyzer/lowering
//! passes on a subsequent compile.
//!
//! Grounded on the teacher's `cache.rs` (`IncrementalCache`, content-hash
//! invalidation, one JSON file per cache entry under `.zenith/cache`),
//! retargeted at `ir::ComponentIr` instead of the old `validate::ZenIR`
//! and reporting failures through `error::CacheError` (§2.1's hard-failure
//! tier) instead of the teacher's `eprintln!`+silent-`None` fallback —
//! a caller that asked for a cache entry should learn when the cache
//! itself is broken, not just see a cache miss.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CacheError;
use crate::ir::ComponentIr;

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    hash: String,
    ir: ComponentIr,
}

pub struct IncrementalCache {
    cache_dir: PathBuf,
}

impl IncrementalCache {
    pub fn new() -> Self {
        Self::at(PathBuf::from(".zenith/cache"))
    }

    pub fn at(cache_dir: PathBuf) -> Self {
        if !cache_dir.exists() {
            let _ = fs::create_dir_all(&cache_dir);
        }
        Self { cache_dir }
    }

    pub fn compute_hash(source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, file_path: &str) -> PathBuf {
        let safe_name = file_path.replace(['/', '\\', ':'], "_");
        self.cache_dir.join(format!("{safe_name}.json"))
    }

    /// Returns `Ok(None)` on a clean miss (no entry, or a hash mismatch
    /// because the source changed). Returns `Err` only when an entry
    /// exists but is unreadable as JSON — a corrupt cache, which the
    /// caller should be told about rather than silently treated as a miss.
    pub fn get(&self, file_path: &str, source: &str) -> Result<Option<ComponentIr>, CacheError> {
        let entry_path = self.entry_path(file_path);
        if !entry_path.exists() {
            return Ok(None);
        }

        let data = fs::read_to_string(&entry_path).map_err(|e| CacheError::Corrupt {
            path: entry_path.display().to_string(),
            message: e.to_string(),
        })?;

        let entry: CacheEntry = serde_json::from_str(&data).map_err(|e| {
            let _ = fs::remove_file(&entry_path);
            CacheError::Corrupt { path: entry_path.display().to_string(), message: e.to_string() }
        })?;

        let current_hash = Self::compute_hash(source);
        if entry.hash == current_hash {
            Ok(Some(entry.ir))
        } else {
            Ok(None)
        }
    }

    pub fn set(&self, file_path: &str, source: &str, ir: ComponentIr) -> Result<(), CacheError> {
        let entry_path = self.entry_path(file_path);
        let hash = Self::compute_hash(source);
        let entry = CacheEntry { hash, ir };

        let data = serde_json::to_string(&entry).map_err(|e| CacheError::WriteFailed {
            path: entry_path.display().to_string(),
            message: e.to_string(),
        })?;
        fs::write(&entry_path, data).map_err(|e| CacheError::WriteFailed {
            path: entry_path.display().to_string(),
            message: e.to_string(),
        })
    }
}

impl Default for IncrementalCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::TemplateNode;

    fn sample_ir() -> ComponentIr {
        ComponentIr {
            component_name: "Widget".into(),
            file_path: "widget.tsx".into(),
            root: TemplateNode::Text(crate::ir::TextNode {
                value: "hi".into(),
                loc: Default::default(),
            }),
            type_definitions: vec![],
            errors: vec![],
        }
    }

    fn temp_cache() -> IncrementalCache {
        let dir = std::env::temp_dir()
            .join(format!("bf-compiler-cache-test-{}-{}", std::process::id(), rand_suffix()));
        IncrementalCache::at(dir)
    }

    fn rand_suffix() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().subsec_nanos() as u64
    }

    #[test]
    fn miss_then_hit_after_set() {
        let cache = temp_cache();
        assert!(cache.get("widget.tsx", "source v1").unwrap().is_none());
        cache.set("widget.tsx", "source v1", sample_ir()).unwrap();
        let hit = cache.get("widget.tsx", "source v1").unwrap();
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().component_name, "Widget");
    }

    #[test]
    fn changed_source_invalidates_entry() {
        let cache = temp_cache();
        cache.set("widget.tsx", "source v1", sample_ir()).unwrap();
        assert!(cache.get("widget.tsx", "source v2").unwrap().is_none());
    }

    #[test]
    fn corrupt_entry_reports_error_not_silent_miss() {
        let cache = temp_cache();
        let path = cache.entry_path("widget.tsx");
        fs::write(&path, "not json").unwrap();
        assert!(cache.get("widget.tsx", "source").is_err());
    }
}
