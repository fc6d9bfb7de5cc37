use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::actions::{CommandDispatcher, CommandKind, Intent};
use crate::bridge::{LaunchFlags, Launcher, NavigationRequest};
use crate::state::read_record;
use crate::store::SharedStore;

/// Opaque id the host assigns to each placed widget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetInstanceId(pub i32);

impl fmt::Display for WidgetInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What happens when a bound area of the widget is tapped.
#[derive(Clone, Debug, PartialEq)]
pub enum Binding {
    /// Delivered to the widget's own broadcast receiver.
    Broadcast { request_code: i32, intent: Intent },
    /// Launches (or foregrounds) the application.
    Activity {
        request_code: i32,
        request: NavigationRequest,
        flags: LaunchFlags,
    },
}

impl Binding {
    fn command(kind: CommandKind, product_id: &str) -> Self {
        Binding::Broadcast {
            request_code: kind.request_code(),
            intent: Intent::new(kind.action_id()).with_product_id(product_id),
        }
    }

    /// Play the host's part of a tap.
    pub fn fire(&self, dispatcher: &CommandDispatcher, launcher: &dyn Launcher) {
        match self {
            Binding::Broadcast { intent, .. } => {
                // Failures are logged by the dispatcher; the press is dropped.
                let _ = dispatcher.on_receive(intent);
            }
            Binding::Activity { request, flags, .. } => launcher.launch(request.clone(), *flags),
        }
    }
}

/// Everything the host needs to draw one widget instance.
#[derive(Clone, Debug, PartialEq)]
pub struct WidgetSnapshot {
    pub instance_id: WidgetInstanceId,
    pub title: String,
    pub value: String,
    pub increase: Binding,
    pub decrease: Binding,
    pub reset: Binding,
    pub open: Binding,
}

impl WidgetSnapshot {
    pub fn button(&self, kind: CommandKind) -> &Binding {
        match kind {
            CommandKind::Increase => &self.increase,
            CommandKind::Decrease => &self.decrease,
            CommandKind::Reset => &self.reset,
        }
    }
}

impl fmt::Display for WidgetSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}  ( - ) ( + ) ( reset )", self.instance_id, self.title, self.value)
    }
}

/// The host side of the surface: which instances exist, and how to push a
/// fresh snapshot to one of them.
pub trait SurfaceHost: Send + Sync {
    fn instance_ids(&self) -> Vec<WidgetInstanceId>;
    fn update(&self, snapshot: WidgetSnapshot);
}

/// Builds snapshots from the store. Holds no per-instance state, so the
/// host may drop and rebuild it between calls.
#[derive(Clone)]
pub struct Renderer {
    store: Arc<dyn SharedStore>,
    placeholder_name: String,
}

impl Renderer {
    pub fn new(store: Arc<dyn SharedStore>, placeholder_name: impl Into<String>) -> Self {
        Self {
            store,
            placeholder_name: placeholder_name.into(),
        }
    }

    pub fn render(&self, instance_id: WidgetInstanceId) -> WidgetSnapshot {
        let record = read_record(self.store.as_ref(), &self.placeholder_name);
        let id = record.product_id.as_str();
        let request = NavigationRequest::open_product(id);

        WidgetSnapshot {
            instance_id,
            title: record.product_name.clone(),
            value: record.current_count.to_string(),
            increase: Binding::command(CommandKind::Increase, id),
            decrease: Binding::command(CommandKind::Decrease, id),
            reset: Binding::command(CommandKind::Reset, id),
            open: Binding::Activity {
                request_code: request.request_code(),
                request,
                flags: LaunchFlags::NEW_TASK | LaunchFlags::CLEAR_TOP,
            },
        }
    }

    /// Batch refresh as requested by the host; each id is rendered on its own.
    pub fn on_update(&self, host: &dyn SurfaceHost, ids: &[WidgetInstanceId]) {
        for &id in ids {
            let snapshot = self.render(id);
            debug!(instance_id = %id, title = %snapshot.title, value = %snapshot.value, "render");
            host.update(snapshot);
        }
    }

    /// Re-render every instance the host knows about.
    pub fn refresh(&self, host: &dyn SurfaceHost) {
        self.on_update(host, &host.instance_ids());
    }
}
