//! Observer interface for layer notifications.
//!
//! Listeners register per event kind and are dispatched synchronously in
//! registration order. The bus replaces implicit event-emitter inheritance
//! with an explicit, owned subscription registry: `on` returns a
//! [`Subscription`] token that `off` consumes to detach the listener.

use crate::feed::types::{FreeBike, StationInformation, StationStatus};
use crate::feed::{FreeBikeFeed, StationInformationFeed, StationStatusFeed, VehicleTypesFeed};
use crate::layer::LayerError;
use crate::map::PointerEvent;
use std::sync::{Arc, Mutex};

// ============================================================================
// Events
// ============================================================================

/// The event channels a layer exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A refresh pass completed and the render set was rebuilt.
    Data,
    /// Discovery or a refresh pass failed.
    Error,
    /// A station marker was interacted with.
    StationClick,
    /// A free-floating vehicle marker was interacted with.
    BikeClick,
}

/// Raw feed payloads from one successful refresh pass.
///
/// `station_information` is only present when the pass had to re-pull the
/// metadata feed; the other fields mirror which sub-feeds are resolved.
#[derive(Debug, Clone)]
pub struct DataUpdate {
    pub station_status: Option<Arc<StationStatusFeed>>,
    pub station_information: Option<Arc<StationInformationFeed>>,
    pub free_bike_status: Option<Arc<FreeBikeFeed>>,
    pub vehicle_types: Option<Arc<VehicleTypesFeed>>,
}

/// A notification dispatched to listeners.
#[derive(Debug, Clone)]
pub enum GbfsEvent {
    Data(DataUpdate),
    Error(Arc<LayerError>),
    StationClick {
        event: PointerEvent,
        station: StationInformation,
        status: StationStatus,
    },
    BikeClick {
        event: PointerEvent,
        bike: FreeBike,
    },
}

impl GbfsEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GbfsEvent::Data(_) => EventKind::Data,
            GbfsEvent::Error(_) => EventKind::Error,
            GbfsEvent::StationClick { .. } => EventKind::StationClick,
            GbfsEvent::BikeClick { .. } => EventKind::BikeClick,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

type Listener = Arc<dyn Fn(&GbfsEvent) + Send + Sync>;

/// Token returned by [`EventBus::on`]; pass it to [`EventBus::off`] to
/// detach the listener.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
}

/// Per-kind listener registry with synchronous dispatch.
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: Vec<(u64, EventKind, Listener)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&GbfsEvent) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, kind, Arc::new(listener)));
        Subscription { id }
    }

    /// Detach a previously registered listener. Detaching twice is a no-op
    /// because the token is consumed.
    pub fn off(&self, subscription: Subscription) {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        inner.listeners.retain(|(id, _, _)| *id != subscription.id);
    }

    /// Dispatch an event to all listeners of its kind, in registration
    /// order. Listeners run outside the registry lock, so they may call
    /// `on`/`off` themselves.
    pub fn emit(&self, event: &GbfsEvent) {
        let kind = event.kind();
        let matched: Vec<Listener> = {
            let inner = self.inner.lock().expect("event bus lock poisoned");
            inner
                .listeners
                .iter()
                .filter(|(_, k, _)| *k == kind)
                .map(|(_, _, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in matched {
            listener(event);
        }
    }

    /// Number of registered listeners across all kinds.
    pub fn listener_count(&self) -> usize {
        self.inner
            .lock()
            .expect("event bus lock poisoned")
            .listeners
            .len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn data_event() -> GbfsEvent {
        GbfsEvent::Data(DataUpdate {
            station_status: None,
            station_information: None,
            free_bike_status: None,
            vehicle_types: None,
        })
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            bus.on(EventKind::Data, move |_| {
                seen.lock().unwrap().push(tag);
            });
        }

        bus.emit(&data_event());
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_listeners_filtered_by_kind() {
        let bus = EventBus::new();
        let data_hits = Arc::new(AtomicUsize::new(0));
        let click_hits = Arc::new(AtomicUsize::new(0));

        {
            let data_hits = Arc::clone(&data_hits);
            bus.on(EventKind::Data, move |_| {
                data_hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        {
            let click_hits = Arc::clone(&click_hits);
            bus.on(EventKind::StationClick, move |_| {
                click_hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.emit(&data_event());
        bus.emit(&data_event());
        assert_eq!(data_hits.load(Ordering::SeqCst), 2);
        assert_eq!(click_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_off_detaches_listener() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let subscription = {
            let hits = Arc::clone(&hits);
            bus.on(EventKind::Data, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        bus.emit(&data_event());
        bus.off(subscription);
        bus.emit(&data_event());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_subscribe_from_callback() {
        let bus = Arc::new(EventBus::new());
        let inner_bus = Arc::clone(&bus);
        bus.on(EventKind::Data, move |_| {
            inner_bus.on(EventKind::Error, |_| {});
        });

        bus.emit(&data_event());
        assert_eq!(bus.listener_count(), 2);
    }
}
