pub mod dispatcher;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::keys;

pub use dispatcher::CommandDispatcher;

/// What a counter button asks the application to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Increase,
    Decrease,
    Reset,
}

impl CommandKind {
    /// Broadcast action identifier bound to this command's button.
    pub fn action_id(self) -> &'static str {
        match self {
            CommandKind::Increase => keys::actions::INCREASE,
            CommandKind::Decrease => keys::actions::DECREASE,
            CommandKind::Reset => keys::actions::RESET,
        }
    }

    /// Per-button request code, stable across renders.
    pub fn request_code(self) -> i32 {
        match self {
            CommandKind::Increase => 0,
            CommandKind::Decrease => 1,
            CommandKind::Reset => 2,
        }
    }
}

/// Every action identifier the widget and the entry point recognise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WidgetAction {
    Command(CommandKind),
    OpenProduct,
}

impl WidgetAction {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            keys::actions::INCREASE => Some(WidgetAction::Command(CommandKind::Increase)),
            keys::actions::DECREASE => Some(WidgetAction::Command(CommandKind::Decrease)),
            keys::actions::RESET => Some(WidgetAction::Command(CommandKind::Reset)),
            keys::actions::OPEN_PRODUCT => Some(WidgetAction::OpenProduct),
            _ => None,
        }
    }
}

/// A platform message: an optional action identifier plus string-keyed extras.
/// Used for both button broadcasts and activity launches.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Intent {
    pub action: Option<String>,
    pub extras: Map<String, Value>,
}

impl Intent {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            extras: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extras.insert(key.to_string(), value.into());
        self
    }

    pub fn with_product_id(self, product_id: impl Into<String>) -> Self {
        self.with_extra(keys::EXTRA_PRODUCT_ID, product_id.into())
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// Only a string extra counts; anything else is treated as absent.
    pub fn product_id(&self) -> Option<&str> {
        self.extras.get(keys::EXTRA_PRODUCT_ID)?.as_str()
    }
}
