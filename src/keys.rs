//! Names shared between the widget surface and the application: store keys,
//! broadcast action identifiers and the navigation channel.

use const_format::concatcp;

use crate::APP_ID;

/// Every store key starts with this; `CounterRecord` fields are stored as
/// prefix + field name.
pub const PREFIX: &str = "widget_";

// CounterRecord fields (owned by the application, read by the renderer).
pub const PRODUCT_NAME: &str = concatcp!(PREFIX, "product_name");
pub const CURRENT_COUNT: &str = concatcp!(PREFIX, "current_count");
pub const PRODUCT_ID: &str = concatcp!(PREFIX, "product_id");

// PendingCommand slot (written by the dispatcher, cleared by the consumer).
pub const ACTION: &str = concatcp!(PREFIX, "action");
pub const ACTION_PRODUCT_ID: &str = concatcp!(PREFIX, "action_product_id");

/// Extra carried by every broadcast and navigation request.
pub const EXTRA_PRODUCT_ID: &str = "product_id";

pub mod actions {
    pub const INCREASE: &str = "ACTION_INCREASE";
    pub const DECREASE: &str = "ACTION_DECREASE";
    pub const RESET: &str = "ACTION_RESET";
    pub const OPEN_PRODUCT: &str = "ACTION_OPEN_PRODUCT";
}

/// Event channel between the platform entry point and the application.
pub const CHANNEL: &str = concatcp!(APP_ID, "/widget");

pub mod channel {
    pub const GET_INITIAL_INTENT: &str = "getInitialIntent";
    pub const GET_PRODUCT_ID: &str = "getProductId";
    pub const ON_NEW_INTENT: &str = "onNewIntent";
}
