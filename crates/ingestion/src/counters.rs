//! Counter Registry
//!
//! Per-source `{linesRead, errorsCount}` counters. Each source's counters are
//! written only by its tailing task; the registry map itself changes only on
//! register/unregister. Readers take snapshots.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use contracts::OpenFileInfo;

/// Counters for one registered source
#[derive(Debug, Default)]
pub struct FileCounters {
    lines_read: AtomicU64,
    errors_count: AtomicU64,
}

impl FileCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one line read from the source
    pub fn record_line(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a formatting or read error
    pub fn record_error(&self) {
        self.errors_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OpenFileInfo {
        OpenFileInfo {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            errors_count: self.errors_count.load(Ordering::Relaxed),
        }
    }
}

/// Registry of counters keyed by source name
///
/// Cheap to clone; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct CounterRegistry {
    inner: Arc<RwLock<BTreeMap<String, Arc<FileCounters>>>>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reset) the counters for `name`.
    pub fn register(&self, name: &str) -> Arc<FileCounters> {
        let counters = Arc::new(FileCounters::new());
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.insert(name.to_string(), counters.clone());
        counters
    }

    /// Drop the counters for `name`. Unknown names are ignored.
    pub fn unregister(&self, name: &str) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<OpenFileInfo> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(name).map(|c| c.snapshot())
    }

    /// Point-in-time view of every registered source
    pub fn snapshot(&self) -> BTreeMap<String, OpenFileInfo> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.iter()
            .map(|(name, counters)| (name.clone(), counters.snapshot()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_count() {
        let registry = CounterRegistry::new();
        let counters = registry.register("app.log");

        counters.record_line();
        counters.record_line();
        counters.record_error();

        let info = registry.get("app.log").unwrap();
        assert_eq!(info.lines_read, 2);
        assert_eq!(info.errors_count, 1);
    }

    #[test]
    fn test_unregister_removes_entry() {
        let registry = CounterRegistry::new();
        registry.register("a");
        registry.register("b");
        registry.unregister("a");
        registry.unregister("missing");

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("b"));
    }

    #[test]
    fn test_clones_share_state() {
        let registry = CounterRegistry::new();
        let view = registry.clone();
        registry.register("a").record_line();
        assert_eq!(view.get("a").unwrap().lines_read, 1);
    }
}
