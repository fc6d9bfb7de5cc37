use std::collections::BTreeMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::thread::JoinHandle;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::WidgetError;
use crate::keys;
use crate::render::{Renderer, SurfaceHost};
use crate::state::{
    CounterRecord, PendingCommand, clear_pending, displayed_product, has_pending, read_pending,
    read_record, record_entries, write_record,
};
use crate::store::SharedStore;

/// Result of one consumer pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing pending.
    Idle,
    Applied {
        command: PendingCommand,
        record: CounterRecord,
    },
    /// Slot named a product the app does not know; cleared.
    UnknownProduct(String),
    /// Slot held something unparseable; cleared.
    Malformed,
    /// Store refused the commit; the command stays pending for the next pass.
    Deferred,
}

/// Application-side owner of the authoritative counts.
pub struct CommandConsumer {
    store: Arc<dyn SharedStore>,
    host: Arc<dyn SurfaceHost>,
    renderer: Renderer,
    placeholder_name: String,
    catalog: Mutex<BTreeMap<String, CounterRecord>>,
}

impl CommandConsumer {
    pub fn new(
        store: Arc<dyn SharedStore>,
        host: Arc<dyn SurfaceHost>,
        placeholder_name: impl Into<String>,
    ) -> Self {
        let placeholder_name = placeholder_name.into();
        Self {
            renderer: Renderer::new(Arc::clone(&store), placeholder_name.clone()),
            store,
            host,
            placeholder_name,
            catalog: Mutex::new(BTreeMap::new()),
        }
    }

    /// Make a product known without showing it on the widget.
    pub fn track(&self, record: CounterRecord) {
        if let Ok(mut catalog) = self.catalog.lock() {
            catalog.insert(record.product_id.clone(), record);
        }
    }

    /// Show `record` on the widget and refresh every instance.
    pub fn publish(&self, record: CounterRecord) -> Result<(), WidgetError> {
        write_record(self.store.as_ref(), &record)?;
        info!(product_id = %record.product_id, count = record.current_count, "published to widget");
        self.track(record);
        self.renderer.refresh(self.host.as_ref());
        Ok(())
    }

    pub fn count(&self, product_id: &str) -> Option<i64> {
        self.catalog
            .lock()
            .ok()?
            .get(product_id)
            .map(|r| r.current_count)
    }

    /// Apply whatever command is pending. Safe to call at any time and any
    /// number of times; a cleared slot is never applied again.
    pub fn poll(&self) -> PollOutcome {
        let store = self.store.as_ref();
        let Some(command) = read_pending(store) else {
            if !has_pending(store) {
                return PollOutcome::Idle;
            }
            warn!(
                action = ?store.get(keys::ACTION),
                product_id = ?store.get(keys::ACTION_PRODUCT_ID),
                "malformed pending command, clearing"
            );
            return match commit(store, None) {
                Ok(()) => PollOutcome::Malformed,
                Err(_) => PollOutcome::Deferred,
            };
        };

        let displayed = displayed_product(store);
        let is_displayed = displayed.as_deref() == Some(command.product_id.as_str());

        let known = self
            .catalog
            .lock()
            .ok()
            .and_then(|c| c.get(&command.product_id).cloned());
        let base = match known {
            Some(record) => record,
            None if is_displayed => read_record(store, &self.placeholder_name),
            None => {
                warn!(product_id = %command.product_id, "pending command for unknown product, clearing");
                return match commit(store, None) {
                    Ok(()) => PollOutcome::UnknownProduct(command.product_id),
                    Err(_) => PollOutcome::Deferred,
                };
            }
        };

        let mut record = base;
        record.apply(command.kind);

        // The record and the cleared slot land in one write, so a failed
        // commit leaves the command pending rather than half-applied.
        let shown = is_displayed.then_some(&record);
        if let Err(e) = commit(store, shown) {
            warn!(product_id = %command.product_id, error = %e, "commit failed, will retry");
            return PollOutcome::Deferred;
        }
        self.track(record.clone());

        info!(
            kind = ?command.kind,
            product_id = %command.product_id,
            count = record.current_count,
            "pending command applied"
        );
        self.renderer.refresh(self.host.as_ref());
        PollOutcome::Applied { command, record }
    }
}

fn commit(store: &dyn SharedStore, record: Option<&CounterRecord>) -> Result<(), WidgetError> {
    let Some(record) = record else {
        return clear_pending(store);
    };
    let entries = record_entries(record)?;
    store.with_mut(&mut |m: &mut Map<String, Value>| {
        m.extend(entries.clone());
        m.remove(keys::ACTION);
        m.remove(keys::ACTION_PRODUCT_ID);
    })
}

/// Background thread that polls the consumer on a fixed interval.
/// Stops when dropped.
pub struct ConsumerTicker {
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ConsumerTicker {
    pub fn start(consumer: Arc<CommandConsumer>, interval: Duration) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel2 = Arc::clone(&cancel);

        let worker = std::thread::spawn(move || {
            debug!(interval_ms = interval.as_millis() as u64, "consumer ticker started");
            loop {
                if cancel2.load(Ordering::Relaxed) {
                    break;
                }
                consumer.poll();
                std::thread::park_timeout(interval);
            }
            debug!("consumer ticker stopped");
        });

        Self {
            cancel,
            worker: Some(worker),
        }
    }

    /// Poll now instead of waiting out the interval.
    pub fn poke(&self) {
        if let Some(worker) = &self.worker {
            worker.thread().unpark();
        }
    }

    pub fn stop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            let _ = worker.join();
        }
    }
}

impl Drop for ConsumerTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::actions::CommandKind;
    use crate::render::testing::RecordingHost;
    use crate::state::write_pending;
    use crate::store::MemoryStore;

    fn setup() -> (MemoryStore, Arc<RecordingHost>, CommandConsumer) {
        let store = MemoryStore::new();
        let host = Arc::new(RecordingHost::with_ids(&[1, 2]));
        let consumer = CommandConsumer::new(Arc::new(store.clone()), host.clone(), "Count Check");
        (store, host, consumer)
    }

    fn press(store: &MemoryStore, kind: CommandKind, id: &str) {
        write_pending(store, &PendingCommand { kind, product_id: id.into() }).unwrap();
    }

    #[test]
    fn test_idle_touches_nothing() {
        let (store, host, consumer) = setup();
        assert_eq!(consumer.poll(), PollOutcome::Idle);
        assert_eq!(store.writes(), 0);
        assert!(host.take().is_empty());
    }

    #[test]
    fn test_apply_persists_clears_and_repaints() {
        let (store, host, consumer) = setup();
        consumer.publish(CounterRecord::new("p1", "Scarf")).unwrap();
        host.take();

        press(&store, CommandKind::Increase, "p1");
        let outcome = consumer.poll();
        assert!(matches!(outcome, PollOutcome::Applied { ref record, .. } if record.current_count == 1));

        assert_eq!(store.get_i64(keys::CURRENT_COUNT), Some(1));
        assert_eq!(read_pending(&store), None);
        let updates = host.take();
        assert_eq!(updates.len(), 2);
        assert!(updates.iter().all(|s| s.value == "1" && s.title == "Scarf"));

        // Second pass sees a cleared slot.
        assert_eq!(consumer.poll(), PollOutcome::Idle);
        assert_eq!(consumer.count("p1"), Some(1));
    }

    #[test]
    fn test_increase_then_decrease_floor() {
        let (store, _host, consumer) = setup();
        consumer.publish(CounterRecord::new("p1", "Scarf")).unwrap();

        press(&store, CommandKind::Increase, "p1");
        consumer.poll();
        press(&store, CommandKind::Decrease, "p1");
        consumer.poll();
        press(&store, CommandKind::Decrease, "p1");
        consumer.poll();
        assert_eq!(store.get_i64(keys::CURRENT_COUNT), Some(0));
    }

    #[test]
    fn test_lost_update_applies_only_last_press() {
        let (store, _host, consumer) = setup();
        consumer.publish(CounterRecord::new("p1", "Scarf")).unwrap();
        store.set(keys::CURRENT_COUNT, serde_json::json!(5)).unwrap();
        consumer.track(CounterRecord { current_count: 5, ..CounterRecord::new("p1", "Scarf") });

        press(&store, CommandKind::Increase, "p1");
        press(&store, CommandKind::Reset, "p1");
        consumer.poll();
        assert_eq!(store.get_i64(keys::CURRENT_COUNT), Some(0));
    }

    #[test]
    fn test_displayed_record_adopted_when_not_tracked() {
        let (store, _host, consumer) = setup();
        write_record(&store, &CounterRecord { current_count: 9, ..CounterRecord::new("p4", "Mitts") })
            .unwrap();
        press(&store, CommandKind::Decrease, "p4");
        consumer.poll();
        assert_eq!(store.get_i64(keys::CURRENT_COUNT), Some(8));
        assert_eq!(consumer.count("p4"), Some(8));
    }

    #[test]
    fn test_off_screen_product_updates_catalog_only() {
        let (store, _host, consumer) = setup();
        consumer.publish(CounterRecord::new("shown", "A")).unwrap();
        consumer.track(CounterRecord::new("hidden", "B"));

        press(&store, CommandKind::Increase, "hidden");
        consumer.poll();
        assert_eq!(consumer.count("hidden"), Some(1));
        assert_eq!(store.get_str(keys::PRODUCT_ID).as_deref(), Some("shown"));
        assert_eq!(store.get_i64(keys::CURRENT_COUNT), Some(0));
        assert_eq!(read_pending(&store), None);
    }

    #[test]
    fn test_unknown_product_cleared() {
        let (store, _host, consumer) = setup();
        press(&store, CommandKind::Increase, "ghost");
        assert_eq!(consumer.poll(), PollOutcome::UnknownProduct("ghost".into()));
        assert_eq!(consumer.poll(), PollOutcome::Idle);
    }

    #[test]
    fn test_malformed_slot_cleared() {
        let (store, _host, consumer) = setup();
        store.set(keys::ACTION, serde_json::json!("explode")).unwrap();
        assert_eq!(consumer.poll(), PollOutcome::Malformed);
        assert!(!has_pending(&store));
    }

    #[test]
    fn test_failed_commit_retries_without_double_apply() {
        let (store, _host, consumer) = setup();
        consumer.publish(CounterRecord::new("p1", "Scarf")).unwrap();
        press(&store, CommandKind::Increase, "p1");

        store.set_failing(true);
        assert_eq!(consumer.poll(), PollOutcome::Deferred);
        assert_eq!(consumer.count("p1"), Some(0));

        store.set_failing(false);
        consumer.poll();
        assert_eq!(consumer.count("p1"), Some(1));
        assert_eq!(store.get_i64(keys::CURRENT_COUNT), Some(1));
    }

    #[test]
    fn test_ticker_eventually_applies() {
        let (store, _host, consumer) = setup();
        let consumer = Arc::new(consumer);
        consumer.publish(CounterRecord::new("p1", "Scarf")).unwrap();
        let mut ticker = ConsumerTicker::start(Arc::clone(&consumer), Duration::from_millis(10));

        press(&store, CommandKind::Increase, "p1");
        ticker.poke();
        let deadline = Instant::now() + Duration::from_secs(5);
        while consumer.count("p1") != Some(1) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        ticker.stop();
        assert_eq!(consumer.count("p1"), Some(1));
        assert_eq!(read_pending(&store), None);
    }
}
