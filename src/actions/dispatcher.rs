use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{CommandKind, Intent, WidgetAction};
use crate::error::WidgetError;
use crate::render::{Renderer, SurfaceHost};
use crate::state::{PendingCommand, write_pending};
use crate::store::SharedStore;

/// Widget-side receiver for button broadcasts.
///
/// Keeps nothing between calls: every press goes straight into the store's
/// pending slot, overwriting any press the application has not seen yet.
#[derive(Clone)]
pub struct CommandDispatcher {
    store: Arc<dyn SharedStore>,
    host: Arc<dyn SurfaceHost>,
    renderer: Renderer,
    redraw_on_press: bool,
}

impl CommandDispatcher {
    pub fn new(
        store: Arc<dyn SharedStore>,
        host: Arc<dyn SurfaceHost>,
        renderer: Renderer,
        redraw_on_press: bool,
    ) -> Self {
        Self {
            store,
            host,
            renderer,
            redraw_on_press,
        }
    }

    /// Handle one platform broadcast. Errors are already logged when they
    /// come back; none of them change the store.
    pub fn on_receive(&self, intent: &Intent) -> Result<PendingCommand, WidgetError> {
        let action = intent.action().unwrap_or_default();
        debug!(action, "broadcast received");

        let kind = match WidgetAction::from_id(action) {
            Some(WidgetAction::Command(kind)) => kind,
            Some(WidgetAction::OpenProduct) => {
                debug!(action, "open requests go through the navigation bridge, ignored");
                return Err(WidgetError::UnknownAction(action.to_string()));
            }
            None => {
                debug!(action, "unknown action, ignored");
                return Err(WidgetError::UnknownAction(action.to_string()));
            }
        };

        let Some(product_id) = intent.product_id() else {
            warn!(action, "broadcast without product_id, nothing written");
            return Err(WidgetError::MissingPayload {
                action: action.to_string(),
            });
        };

        self.dispatch(kind, product_id)
    }

    /// Fire-and-forget write of the pending command.
    pub fn dispatch(&self, kind: CommandKind, product_id: &str) -> Result<PendingCommand, WidgetError> {
        let cmd = PendingCommand {
            kind,
            product_id: product_id.to_string(),
        };

        if let Err(e) = write_pending(self.store.as_ref(), &cmd) {
            warn!(?kind, product_id, error = %e, "press dropped");
            return Err(e);
        }
        info!(?kind, product_id, "pending command stored");

        if self.redraw_on_press {
            self.renderer.refresh(self.host.as_ref());
        }
        Ok(cmd)
    }
}
