//! Per-model change notifier.
//!
//! # Responsibility
//! - Fan model events out to subscribers synchronously, in registration order.
//!
//! # Invariants
//! - `register`/`unregister` are idempotent; identity is `Arc` pointer identity.
//! - `publish` delivers to the subscribers registered at the instant of the
//!   call; changes to the subscriber list during delivery apply to the next
//!   pass only.
//! - A failing subscriber never stops delivery to the others.

use crate::event::model_event::ModelEvent;
use log::trace;
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_BUS_ID: AtomicU64 = AtomicU64::new(1);

/// Receiver of model events.
pub trait ModelListener: Send + Sync {
    fn on_model_event(&self, event: &ModelEvent) -> Result<(), ListenerError>;
}

/// Failure reported by one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerError {
    pub message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for ListenerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ListenerError {}

/// Subscriber failures collected during one publish pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusError {
    pub event_kind: &'static str,
    pub failures: Vec<ListenerError>,
}

impl Display for BusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} subscriber(s) failed on {}",
            self.failures.len(),
            self.event_kind
        )?;
        if let Some(first) = self.failures.first() {
            write!(f, ": {first}")?;
        }
        Ok(())
    }
}

impl Error for BusError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.failures.first().map(|err| err as &(dyn Error + 'static))
    }
}

/// Event bus owned by exactly one record model.
pub struct ChangeNotifier {
    id: u64,
    subscribers: Mutex<Vec<Arc<dyn ModelListener>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            id: NEXT_BUS_ID.fetch_add(1, Ordering::Relaxed),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Adds a subscriber. Returns `false` when it was already registered.
    pub fn register(&self, subscriber: Arc<dyn ModelListener>) -> bool {
        let mut subscribers = self.subscribers.lock();
        if subscribers
            .iter()
            .any(|existing| same_listener(existing, &subscriber))
        {
            return false;
        }
        subscribers.push(subscriber);
        trace!(
            "event=bus_register module=event bus_id={} subscribers={}",
            self.id,
            subscribers.len()
        );
        true
    }

    /// Removes a subscriber. Returns `false` when it was not registered.
    pub fn unregister(&self, subscriber: &Arc<dyn ModelListener>) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|existing| !same_listener(existing, subscriber));
        let removed = subscribers.len() != before;
        if removed {
            trace!(
                "event=bus_unregister module=event bus_id={} subscribers={}",
                self.id,
                subscribers.len()
            );
        }
        removed
    }

    pub fn is_registered(&self, subscriber: &Arc<dyn ModelListener>) -> bool {
        self.subscribers
            .lock()
            .iter()
            .any(|existing| same_listener(existing, subscriber))
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Delivers `event` to every current subscriber.
    ///
    /// # Errors
    /// Returns `BusError` listing subscriber failures after the full pass.
    pub fn publish(&self, event: &ModelEvent) -> Result<(), BusError> {
        let snapshot: Vec<Arc<dyn ModelListener>> = self.subscribers.lock().clone();
        trace!(
            "event=bus_publish module=event bus_id={} kind={} subscribers={}",
            self.id,
            event.kind(),
            snapshot.len()
        );

        let failures: Vec<ListenerError> = snapshot
            .iter()
            .filter_map(|subscriber| subscriber.on_model_event(event).err())
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BusError {
                event_kind: event.kind(),
                failures,
            })
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("id", &self.id)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

fn same_listener(a: &Arc<dyn ModelListener>, b: &Arc<dyn ModelListener>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Subscriber that records every event, for tests and diagnostics.
#[derive(Default)]
pub struct EventCollector {
    events: Mutex<Vec<ModelEvent>>,
}

impl EventCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ModelEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl ModelListener for EventCollector {
    fn on_model_event(&self, event: &ModelEvent) -> Result<(), ListenerError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
