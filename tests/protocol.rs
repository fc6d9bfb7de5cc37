use std::sync::{Arc, Mutex};

use counter_widget::actions::{CommandDispatcher, CommandKind, Intent};
use counter_widget::bridge::{InProcessLauncher, NavigationRequest, SharedEntry};
use counter_widget::consumer::{CommandConsumer, PollOutcome};
use counter_widget::keys;
use counter_widget::render::{Renderer, SurfaceHost, WidgetInstanceId, WidgetSnapshot};
use counter_widget::state::{CounterRecord, has_pending, read_pending};
use counter_widget::store::{FileStore, MemoryStore, SharedStore};

#[derive(Default)]
struct Host {
    updates: Mutex<Vec<WidgetSnapshot>>,
}

impl Host {
    fn last_value(&self) -> Option<String> {
        self.updates.lock().unwrap().last().map(|s| s.value.clone())
    }
}

impl SurfaceHost for Host {
    fn instance_ids(&self) -> Vec<WidgetInstanceId> {
        vec![WidgetInstanceId(42)]
    }

    fn update(&self, snapshot: WidgetSnapshot) {
        self.updates.lock().unwrap().push(snapshot);
    }
}

struct Rig {
    store: MemoryStore,
    host: Arc<Host>,
    renderer: Renderer,
    dispatcher: CommandDispatcher,
    consumer: CommandConsumer,
}

fn rig() -> Rig {
    let store = MemoryStore::new();
    let shared: Arc<dyn SharedStore> = Arc::new(store.clone());
    let host = Arc::new(Host::default());
    let renderer = Renderer::new(Arc::clone(&shared), "Count Check");
    let dispatcher = CommandDispatcher::new(Arc::clone(&shared), host.clone(), renderer.clone(), true);
    let consumer = CommandConsumer::new(shared, host.clone(), "Count Check");
    Rig {
        store,
        host,
        renderer,
        dispatcher,
        consumer,
    }
}

#[test]
fn press_poll_repaint_cycle() {
    let r = rig();
    let launcher = InProcessLauncher::new(SharedEntry::new());

    // Fresh widget: placeholder and zero.
    let snap = r.renderer.render(WidgetInstanceId(42));
    assert_eq!((snap.title.as_str(), snap.value.as_str()), ("Count Check", "0"));

    r.consumer.publish(CounterRecord::new("sock-9", "Sock yarn")).unwrap();
    let snap = r.renderer.render(WidgetInstanceId(42));

    // Tap + twice before the app gets a chance to run.
    snap.button(CommandKind::Increase).fire(&r.dispatcher, &launcher);
    snap.button(CommandKind::Increase).fire(&r.dispatcher, &launcher);
    assert_eq!(r.host.last_value().as_deref(), Some("0"));

    // Only one press survives the single slot.
    let outcome = r.consumer.poll();
    assert!(matches!(outcome, PollOutcome::Applied { ref record, .. } if record.current_count == 1));
    assert_eq!(r.host.last_value().as_deref(), Some("1"));
    assert_eq!(read_pending(&r.store), None);
    assert_eq!(r.consumer.poll(), PollOutcome::Idle);

    snap.button(CommandKind::Reset).fire(&r.dispatcher, &launcher);
    r.consumer.poll();
    assert_eq!(r.store.get_i64(keys::CURRENT_COUNT), Some(0));
    assert_eq!(r.host.last_value().as_deref(), Some("0"));
}

#[test]
fn broadcast_without_product_is_a_no_op() {
    let r = rig();
    let before = r.store.snapshot();
    assert!(r.dispatcher.on_receive(&Intent::new(keys::actions::INCREASE)).is_err());
    assert_eq!(r.store.snapshot(), before);
    assert_eq!(r.consumer.poll(), PollOutcome::Idle);
}

#[test]
fn open_area_cold_start_delivers_latest_once() {
    let r = rig();
    let entry = SharedEntry::new();
    let launcher = InProcessLauncher::new(entry.clone());

    r.consumer.publish(CounterRecord::new("first", "A")).unwrap();
    r.renderer.render(WidgetInstanceId(42)).open.fire(&r.dispatcher, &launcher);
    r.consumer.publish(CounterRecord::new("second", "B")).unwrap();
    r.renderer.render(WidgetInstanceId(42)).open.fire(&r.dispatcher, &launcher);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    entry.attach(move |req: &NavigationRequest| sink.lock().unwrap().push(req.clone()));

    assert_eq!(*seen.lock().unwrap(), vec![NavigationRequest::open_product("second")]);
    // Open taps never touch the pending slot.
    assert_eq!(read_pending(&r.store), None);
}

#[test]
fn press_from_another_handle_reaches_the_app() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("widget_data.json");

    // App side stays open for the whole run.
    let app_store: Arc<dyn SharedStore> = Arc::new(FileStore::open(&path).unwrap());
    let app_host = Arc::new(Host::default());
    let consumer = CommandConsumer::new(Arc::clone(&app_store), app_host.clone(), "Count Check");
    consumer.publish(CounterRecord::new("p1", "Hat")).unwrap();
    assert_eq!(consumer.poll(), PollOutcome::Idle);

    // Widget side opens its own handle, presses, and goes away.
    {
        let widget_store: Arc<dyn SharedStore> = Arc::new(FileStore::open(&path).unwrap());
        let host = Arc::new(Host::default());
        let renderer = Renderer::new(Arc::clone(&widget_store), "Count Check");
        let dispatcher = CommandDispatcher::new(widget_store, host, renderer, false);
        dispatcher.dispatch(CommandKind::Increase, "p1").unwrap();
    }

    let outcome = consumer.poll();
    assert!(matches!(outcome, PollOutcome::Applied { ref record, .. } if record.current_count == 1));
    assert_eq!(app_host.last_value().as_deref(), Some("1"));

    let reopened = FileStore::open(&path).unwrap();
    assert!(!has_pending(&reopened));
    assert_eq!(reopened.get_i64(keys::CURRENT_COUNT), Some(1));
    assert_eq!(reopened.get_str(keys::PRODUCT_ID).as_deref(), Some("p1"));
}
