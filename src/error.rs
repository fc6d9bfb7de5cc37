use thiserror::Error;

/// Everything that can go wrong between the widget surface and the app.
///
/// None of these are fatal. Callers on the press/render/poll paths log them
/// and carry on; only setup (opening the store, loading config) propagates.
#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("broadcast {action} arrived without a product_id")]
    MissingPayload { action: String },

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("store write failed: {0}")]
    StoreWrite(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
