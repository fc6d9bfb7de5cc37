//! Navigation Bridge: "open the app on product X".
//!
//! The widget side builds a [`NavigationRequest`] and hands it to the
//! platform [`Launcher`]. The application side is [`AppEntry`] (or
//! [`SharedEntry`] when the platform and the app both hold it), which
//! receives the request either at process creation (cold) or as a new
//! intent (warm) and forwards it to the application's listener exactly once.
//! Until a listener attaches, at most one request is held; a newer one
//! replaces it.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use bitflags::bitflags;
use tracing::{debug, info, warn};

use crate::actions::{Intent, WidgetAction};
use crate::keys;

bitflags! {
    /// Launch behaviour requested from the platform.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct LaunchFlags: u32 {
        /// Start a new task, or bring the existing one forward.
        const NEW_TASK = 1 << 0;
        /// Drop any activities stacked above the target.
        const CLEAR_TOP = 1 << 1;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationRequest {
    pub action: String,
    pub product_id: String,
}

impl NavigationRequest {
    pub fn open_product(product_id: impl Into<String>) -> Self {
        Self {
            action: keys::actions::OPEN_PRODUCT.to_string(),
            product_id: product_id.into(),
        }
    }

    /// Stable per product, so each product keeps its own pending handle.
    pub fn request_code(&self) -> i32 {
        self.product_id
            .encode_utf16()
            .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(i32::from(c)))
    }

    pub fn to_intent(&self) -> Intent {
        Intent::new(self.action.as_str()).with_product_id(self.product_id.as_str())
    }

    /// Only `ACTION_OPEN_PRODUCT` intents that carry a product id qualify.
    pub fn from_intent(intent: &Intent) -> Option<Self> {
        let action = intent.action()?;
        match WidgetAction::from_id(action) {
            Some(WidgetAction::OpenProduct) => {}
            Some(WidgetAction::Command(_)) | None => {
                debug!(action, "not a navigation action, ignored");
                return None;
            }
        }
        let Some(product_id) = intent.product_id() else {
            warn!(action, "open request without product_id, ignored");
            return None;
        };
        Some(Self::open_product(product_id))
    }
}

/// The platform's activity-launch mechanism.
pub trait Launcher: Send + Sync {
    fn launch(&self, request: NavigationRequest, flags: LaunchFlags);
}

/// Widget-side entry: builds the request and launches it.
#[derive(Clone)]
pub struct NavigationBridge {
    launcher: Arc<dyn Launcher>,
}

impl NavigationBridge {
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self { launcher }
    }

    pub fn open(&self, product_id: &str) {
        let request = NavigationRequest::open_product(product_id);
        info!(product_id, "opening app");
        self.launcher
            .launch(request, LaunchFlags::NEW_TASK | LaunchFlags::CLEAR_TOP);
    }
}

/// Receives `onNewIntent` events on the application side.
pub trait NavigationListener: Send {
    fn on_new_intent(&mut self, request: &NavigationRequest);
}

impl<F> NavigationListener for F
where
    F: FnMut(&NavigationRequest) + Send,
{
    fn on_new_intent(&mut self, request: &NavigationRequest) {
        self(request)
    }
}

/// One optional value; storing a new one hands back the one it displaced.
#[derive(Debug)]
pub struct PendingSlot<T>(Option<T>);

impl<T> Default for PendingSlot<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> PendingSlot<T> {
    pub fn replace(&mut self, value: T) -> Option<T> {
        self.0.replace(value)
    }

    pub fn take(&mut self) -> Option<T> {
        self.0.take()
    }

    pub fn peek(&self) -> Option<&T> {
        self.0.as_ref()
    }
}

/// What became of an intent handed to the entry point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The listener received it.
    Delivered(NavigationRequest),
    /// Held until a listener attaches; `discarded` is the request it replaced.
    Buffered { discarded: Option<NavigationRequest> },
    /// Not a navigation request.
    Ignored,
}

/// Reply to a query on the navigation channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelReply {
    Value(Option<String>),
    NotImplemented,
}

type ListenerHandle = Arc<Mutex<dyn NavigationListener>>;

/// A request on its way to the listener, taken out of the entry so it can
/// be delivered after the entry's lock is released.
struct Handoff {
    listener: ListenerHandle,
    request: NavigationRequest,
}

impl Handoff {
    fn run(self) {
        info!(
            method = keys::channel::ON_NEW_INTENT,
            product_id = %self.request.product_id,
            "delivering open request"
        );
        match self.listener.lock() {
            Ok(mut listener) => listener.on_new_intent(&self.request),
            Err(_) => warn!(product_id = %self.request.product_id, "listener poisoned, request dropped"),
        }
    }
}

/// The application's entry point and its end of the navigation channel.
#[derive(Default)]
pub struct AppEntry {
    launch_intent: Option<Intent>,
    listener: Option<ListenerHandle>,
    pending: PendingSlot<NavigationRequest>,
}

impl AppEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process creation with the intent that started it (cold path).
    pub fn on_create(&mut self, intent: Intent) -> Delivery {
        let (delivery, handoff) = self.accept_create(intent);
        if let Some(handoff) = handoff {
            handoff.run();
        }
        delivery
    }

    /// A further intent while the process is alive (warm path, or cold
    /// path before the listener is up).
    pub fn on_new_intent(&mut self, intent: Intent) -> Delivery {
        let (delivery, handoff) = self.route(&intent);
        if let Some(handoff) = handoff {
            handoff.run();
        }
        delivery
    }

    /// The application starts listening; anything buffered goes out now.
    pub fn attach(&mut self, listener: impl NavigationListener + 'static) -> Option<NavigationRequest> {
        let handoff = self.install(listener)?;
        let request = handoff.request.clone();
        handoff.run();
        Some(request)
    }

    pub fn detach(&mut self) {
        self.listener = None;
    }

    pub fn is_attached(&self) -> bool {
        self.listener.is_some()
    }

    pub fn pending(&self) -> Option<&NavigationRequest> {
        self.pending.peek()
    }

    pub fn get_initial_intent(&self) -> Option<String> {
        self.launch_intent.as_ref()?.action.clone()
    }

    pub fn get_product_id(&self) -> Option<String> {
        self.launch_intent.as_ref()?.product_id().map(str::to_string)
    }

    /// Answer an inbound channel call by method name.
    pub fn handle_call(&self, method: &str) -> ChannelReply {
        match method {
            keys::channel::GET_INITIAL_INTENT => ChannelReply::Value(self.get_initial_intent()),
            keys::channel::GET_PRODUCT_ID => ChannelReply::Value(self.get_product_id()),
            _ => ChannelReply::NotImplemented,
        }
    }

    fn accept_create(&mut self, intent: Intent) -> (Delivery, Option<Handoff>) {
        debug!(action = ?intent.action(), product_id = ?intent.product_id(), "entry created");
        let routed = self.route(&intent);
        self.launch_intent = Some(intent);
        routed
    }

    fn install(&mut self, listener: impl NavigationListener + 'static) -> Option<Handoff> {
        let listener: ListenerHandle = Arc::new(Mutex::new(listener));
        self.listener = Some(Arc::clone(&listener));
        debug!(channel = keys::CHANNEL, "listener attached");
        let request = self.pending.take()?;
        Some(Handoff { listener, request })
    }

    fn route(&mut self, intent: &Intent) -> (Delivery, Option<Handoff>) {
        debug!(action = ?intent.action(), product_id = ?intent.product_id(), "routing intent");
        let Some(request) = NavigationRequest::from_intent(intent) else {
            return (Delivery::Ignored, None);
        };

        if let Some(listener) = &self.listener {
            let handoff = Handoff {
                listener: Arc::clone(listener),
                request: request.clone(),
            };
            return (Delivery::Delivered(request), Some(handoff));
        }

        let discarded = self.pending.replace(request);
        match &discarded {
            Some(old) => info!(product_id = %old.product_id, "buffered open request superseded"),
            None => debug!("listener not attached, open request buffered"),
        }
        (Delivery::Buffered { discarded }, None)
    }
}

/// An [`AppEntry`] shared between the platform and the application.
///
/// Every call releases the entry's lock before the listener runs, so a
/// listener may query the entry from inside `on_new_intent`.
#[derive(Clone, Default)]
pub struct SharedEntry(Arc<Mutex<AppEntry>>);

impl SharedEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(&self, intent: Intent) -> Delivery {
        self.step(|e| e.accept_create(intent))
    }

    pub fn on_new_intent(&self, intent: Intent) -> Delivery {
        self.step(|e| e.route(&intent))
    }

    pub fn attach(&self, listener: impl NavigationListener + 'static) -> Option<NavigationRequest> {
        let handoff = self.0.lock().ok()?.install(listener)?;
        let request = handoff.request.clone();
        handoff.run();
        Some(request)
    }

    pub fn get_product_id(&self) -> Option<String> {
        self.0.lock().ok()?.get_product_id()
    }

    pub fn handle_call(&self, method: &str) -> ChannelReply {
        match self.0.lock() {
            Ok(entry) => entry.handle_call(method),
            Err(_) => ChannelReply::Value(None),
        }
    }

    fn step(&self, f: impl FnOnce(&mut AppEntry) -> (Delivery, Option<Handoff>)) -> Delivery {
        let (delivery, handoff) = match self.0.lock() {
            Ok(mut entry) => f(&mut *entry),
            Err(_) => {
                warn!("app entry poisoned, intent dropped");
                return Delivery::Ignored;
            }
        };
        if let Some(handoff) = handoff {
            handoff.run();
        }
        delivery
    }
}

/// Launcher that plays the platform for a [`SharedEntry`] in this process:
/// the first launch creates the entry, later ones arrive as new intents.
pub struct InProcessLauncher {
    entry: SharedEntry,
    started: AtomicBool,
}

impl InProcessLauncher {
    pub fn new(entry: SharedEntry) -> Self {
        Self {
            entry,
            started: AtomicBool::new(false),
        }
    }

    /// Pretend the app is already running, so launches take the warm path.
    pub fn started(entry: SharedEntry) -> Self {
        Self {
            entry,
            started: AtomicBool::new(true),
        }
    }
}

impl Launcher for InProcessLauncher {
    fn launch(&self, request: NavigationRequest, flags: LaunchFlags) {
        let warm = self.started.swap(true, Ordering::SeqCst);
        debug!(?flags, product_id = %request.product_id, cold = !warm, "launch");
        let intent = request.to_intent();
        if warm {
            self.entry.on_new_intent(intent);
        } else {
            self.entry.on_create(intent);
        }
    }
}
