//! Shared State Store: the only channel between the widget surface and the
//! application. Plain key/value, last write wins, no transactions.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde_json::{Map, Value};

use crate::error::WidgetError;

/// Handle to the key/value store, injected into every component.
///
/// Missing keys are never an error; readers supply their own defaults.
pub trait SharedStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    /// Mutate the whole map in one step. Durability may lag behind return.
    fn with_mut(&self, f: &mut dyn FnMut(&mut Map<String, Value>)) -> Result<(), WidgetError>;

    fn set(&self, key: &str, value: Value) -> Result<(), WidgetError> {
        self.set_many(&[(key, value)])
    }

    fn set_many(&self, entries: &[(&str, Value)]) -> Result<(), WidgetError> {
        self.with_mut(&mut |m: &mut Map<String, Value>| {
            for (k, v) in entries {
                m.insert((*k).to_string(), v.clone());
            }
        })
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), WidgetError> {
        self.with_mut(&mut |m: &mut Map<String, Value>| {
            for k in keys {
                m.remove(*k);
            }
        })
    }

    fn get_str(&self, key: &str) -> Option<String> {
        self.get(key)?.as_str().map(str::to_string)
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
