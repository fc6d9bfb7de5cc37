pub mod actions;
pub mod bridge;
pub mod config;
pub mod consumer;
pub mod error;
pub mod keys;
pub mod logging;
pub mod render;
pub mod state;
pub mod store;

pub const APP_ID: &str = "com.example.knitknit";

pub use error::WidgetError;
