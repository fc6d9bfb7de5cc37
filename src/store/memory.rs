use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use serde_json::{Map, Value};

use super::SharedStore;
use crate::error::WidgetError;

/// In-memory store. Clones share the same map, so a test can hand one clone
/// to the widget side and another to the application side.
#[derive(Clone, Default)]
pub struct MemoryStore {
    map: Arc<Mutex<Map<String, Value>>>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, as a broken backing store would.
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.map.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl SharedStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.map.lock().ok()?.get(key).cloned()
    }

    fn with_mut(&self, f: &mut dyn FnMut(&mut Map<String, Value>)) -> Result<(), WidgetError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(WidgetError::StoreWrite("memory store is failing writes".into()));
        }
        let mut map = self
            .map
            .lock()
            .map_err(|_| WidgetError::StoreWrite("memory store lock poisoned".into()))?;
        f(&mut *map);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("widget_current_count"), None);
        assert_eq!(store.get_i64("widget_current_count").unwrap_or(0), 0);
    }

    #[test]
    fn test_last_write_wins() {
        let store = MemoryStore::new();
        store.set("k", json!("a")).unwrap();
        store.clone().set("k", json!("b")).unwrap();
        assert_eq!(store.get_str("k").as_deref(), Some("b"));
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn test_failing_store_keeps_old_value() {
        let store = MemoryStore::new();
        store.set("k", json!(1)).unwrap();
        store.set_failing(true);
        assert!(matches!(
            store.set("k", json!(2)),
            Err(WidgetError::StoreWrite(_))
        ));
        assert_eq!(store.get_i64("k"), Some(1));
    }

    #[test]
    fn test_i64_accepts_numeric_strings() {
        let store = MemoryStore::new();
        store.set("n", json!(" 42 ")).unwrap();
        assert_eq!(store.get_i64("n"), Some(42));
    }
}
