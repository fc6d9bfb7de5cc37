use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::WidgetError;

const MIN_POLL_MS: u64 = 50;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WidgetConfig {
    /// Title shown until the application publishes a product.
    pub placeholder_name: String,
    pub store_path: PathBuf,
    pub poll_interval_ms: u64,
    /// Repaint right after a press, before the consumer has applied it.
    pub redraw_on_press: bool,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            placeholder_name: "Count Check".to_string(),
            store_path: PathBuf::from("widget_data.json"),
            poll_interval_ms: 1000,
            redraw_on_press: true,
        }
    }
}

impl WidgetConfig {
    /// Load settings from a JSON file. No path, or a path that does not
    /// exist, gives the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, WidgetError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, WidgetError> {
        let mut c: Self = serde_json::from_str(raw)?;
        c.poll_interval_ms = c.poll_interval_ms.max(MIN_POLL_MS);
        Ok(c)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
