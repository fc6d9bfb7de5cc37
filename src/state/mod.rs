use serde::Serialize;
use serde_json::{Map, Value};

use crate::actions::CommandKind;
use crate::error::WidgetError;
use crate::keys;
use crate::store::SharedStore;

/// The product the widget shows and its count, as last published by the app.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CounterRecord {
    pub product_id: String,
    pub product_name: String,
    pub current_count: i64,
}

impl CounterRecord {
    pub fn new(product_id: impl Into<String>, product_name: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            current_count: 0,
        }
    }

    /// Apply a command. Counts never go below zero.
    pub fn apply(&mut self, kind: CommandKind) {
        self.current_count = match kind {
            CommandKind::Increase => self.current_count.saturating_add(1),
            CommandKind::Decrease => self.current_count.saturating_sub(1).max(0),
            CommandKind::Reset => 0,
        };
    }
}

/// The single overwritable slot holding the latest unapplied press.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingCommand {
    pub kind: CommandKind,
    pub product_id: String,
}

/// Read the displayed record, filling gaps with the placeholder name, an
/// empty product id and a zero count.
pub fn read_record(store: &dyn SharedStore, placeholder_name: &str) -> CounterRecord {
    CounterRecord {
        product_id: store.get_str(keys::PRODUCT_ID).unwrap_or_default(),
        product_name: store
            .get_str(keys::PRODUCT_NAME)
            .unwrap_or_else(|| placeholder_name.to_string()),
        current_count: store.get_i64(keys::CURRENT_COUNT).unwrap_or(0),
    }
}

/// Product id of the record the widget currently displays, if any.
pub fn displayed_product(store: &dyn SharedStore) -> Option<String> {
    store.get_str(keys::PRODUCT_ID).filter(|id| !id.is_empty())
}

/// Store entries for a record, one per field under [`keys::PREFIX`].
pub fn record_entries(record: &CounterRecord) -> Result<Map<String, Value>, WidgetError> {
    let fields = match serde_json::to_value(record)? {
        Value::Object(fields) => fields,
        _ => Map::new(),
    };
    Ok(fields
        .into_iter()
        .map(|(k, v)| (format!("{}{k}", keys::PREFIX), v))
        .collect())
}

pub fn write_record(store: &dyn SharedStore, record: &CounterRecord) -> Result<(), WidgetError> {
    let entries = record_entries(record)?;
    store.with_mut(&mut |m: &mut Map<String, Value>| m.extend(entries.clone()))
}

/// Overwrites whatever command was pending.
pub fn write_pending(store: &dyn SharedStore, cmd: &PendingCommand) -> Result<(), WidgetError> {
    store.set_many(&[
        (keys::ACTION, serde_json::to_value(cmd.kind)?),
        (keys::ACTION_PRODUCT_ID, Value::from(cmd.product_id.as_str())),
    ])
}

/// `None` unless both halves of the slot are present and the kind parses.
pub fn read_pending(store: &dyn SharedStore) -> Option<PendingCommand> {
    let kind = serde_json::from_value(store.get(keys::ACTION)?).ok()?;
    let product_id = store.get_str(keys::ACTION_PRODUCT_ID)?;
    Some(PendingCommand { kind, product_id })
}

/// Whether anything at all occupies the slot, parseable or not.
pub fn has_pending(store: &dyn SharedStore) -> bool {
    store.get(keys::ACTION).is_some() || store.get(keys::ACTION_PRODUCT_ID).is_some()
}

pub fn clear_pending(store: &dyn SharedStore) -> Result<(), WidgetError> {
    store.remove_many(&[keys::ACTION, keys::ACTION_PRODUCT_ID])
}
