//! The feed refresh controller.
//!
//! [`GbfsLayer`] owns the whole cycle: one discovery pass on `start()`, a
//! periodic timer that drives refresh passes, and the render set rebuilt
//! into the host container on every pass. Station metadata is cached for
//! the layer's lifetime and re-pulled in bulk whenever a status entry
//! references an unknown station; station status and free-vehicle data are
//! ephemeral and rebuilt every pass.
//!
//! Overlapping passes are resolved with a skip-if-busy guard: a refresh
//! triggered while another is still in flight is a silent no-op. The
//! periodic timer is the only retry mechanism and ticks unconditionally
//! regardless of the previous pass's outcome.

use crate::events::{DataUpdate, EventBus, EventKind, GbfsEvent, Subscription};
use crate::feed::discovery::{self, DiscoveryError, FeedSet};
use crate::feed::source::{fetch_json, FetchError};
use crate::feed::types::{
    FreeBikeFeed, StationInformation, StationInformationFeed, StationStatusFeed,
    SystemInformationFeed, VehicleTypesFeed,
};
use crate::map::{CapabilityError, LatLngBounds, LayerContainer, MapHost, PointerEvent};
use crate::options::{GbfsLayerOptions, OptionsError};
use crate::render::{bike_marker, station_marker, Marker, MarkerPayload};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

// ============================================================================
// Error Types
// ============================================================================

/// Errors from a single refresh pass.
///
/// Non-fatal to the layer: the pass is abandoned, the error is emitted on
/// the `Error` channel, and the next scheduled pass proceeds normally.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Fetching or parsing a status feed failed
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// A station id was still absent after re-pulling the full
    /// station-information feed, a data-consistency fault in the system
    #[error("station `{station_id}` missing from station_information after refetch")]
    UnknownStation { station_id: String },
}

/// Umbrella over the failure modes surfaced on the `Error` event channel.
/// Wrapped in `Arc` so the same value can be both returned to the caller
/// and handed to every listener.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("feed discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("refresh pass failed: {0}")]
    Refresh(#[from] RefreshError),
}

// ============================================================================
// Timer
// ============================================================================

/// The polling timer as an owned, typed resource.
enum Timer {
    Disarmed,
    Armed(JoinHandle<()>),
}

impl Timer {
    fn is_armed(&self) -> bool {
        matches!(self, Timer::Armed(_))
    }

    fn disarm(&mut self) {
        if let Timer::Armed(handle) = std::mem::replace(self, Timer::Disarmed) {
            handle.abort();
        }
    }
}

// ============================================================================
// Layer
// ============================================================================

#[derive(Default)]
struct LayerState {
    /// Set once by the first successful `start()`, never mutated after.
    feeds: Option<FeedSet>,
    system_information: Option<SystemInformationFeed>,
    /// Station metadata cache. Grows monotonically, no eviction.
    stations: HashMap<String, StationInformation>,
}

/// A live-availability overlay for one GBFS system.
///
/// Constructed behind `Arc` because the polling timer holds a weak handle
/// back to the layer.
pub struct GbfsLayer {
    options: GbfsLayerOptions,
    client: reqwest::Client,
    container: Arc<dyn LayerContainer>,
    events: EventBus,
    state: Mutex<LayerState>,
    updating: AtomicBool,
    timer: Mutex<Timer>,
}

impl GbfsLayer {
    /// Create a layer rendering into a fresh in-memory container.
    pub fn new(options: GbfsLayerOptions) -> Result<Arc<Self>, OptionsError> {
        Self::with_container(options, Arc::new(crate::map::VectorContainer::new()))
    }

    /// Create a layer rendering into a host-provided container.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::Invalid`] when the options fail
    /// [`GbfsLayerOptions::validate`].
    pub fn with_container(
        options: GbfsLayerOptions,
        container: Arc<dyn LayerContainer>,
    ) -> Result<Arc<Self>, OptionsError> {
        options.validate()?;
        Ok(Arc::new(Self {
            client: reqwest::Client::new(),
            container,
            events: EventBus::new(),
            state: Mutex::new(LayerState::default()),
            updating: AtomicBool::new(false),
            timer: Mutex::new(Timer::Disarmed),
            options,
        }))
    }

    // ------------------------------------------------------------------
    // Scheduler
    // ------------------------------------------------------------------

    /// Run discovery, then begin polling.
    ///
    /// Idempotent: once feeds are resolved, further calls return
    /// immediately without a second discovery or refresh pass. With a
    /// positive refresh interval the timer is armed and an immediate first
    /// pass runs; with interval zero nothing further happens and refreshes
    /// are driven by manual [`update`](Self::update) calls.
    ///
    /// # Errors
    ///
    /// Discovery failures are emitted once on the `Error` channel and
    /// returned; the layer stays unstarted so `start()` can be retried.
    pub async fn start(self: &Arc<Self>) -> Result<(), Arc<LayerError>> {
        if self.state.lock().expect("layer state lock poisoned").feeds.is_some() {
            return Ok(());
        }

        let resolved = match discovery::resolve(&self.client, &self.options).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(error = %e, "feed discovery failed");
                let error = Arc::new(LayerError::Discovery(e));
                self.events.emit(&GbfsEvent::Error(Arc::clone(&error)));
                return Err(error);
            }
        };

        {
            let mut state = self.state.lock().expect("layer state lock poisoned");
            state.system_information = resolved.system_information;
            state.feeds = Some(resolved.feeds);
        }
        tracing::info!("layer started");

        if let Some(period) = self.options.refresh_interval() {
            self.arm_timer(period);
            self.update().await;
        }
        Ok(())
    }

    /// Disarm the polling timer. Resolved feeds and the station metadata
    /// cache stay intact; polling stays off until `start()` again.
    pub fn stop(&self) {
        let mut timer = self.timer.lock().expect("timer lock poisoned");
        if timer.is_armed() {
            timer.disarm();
            tracing::info!("polling timer disarmed");
        }
    }

    /// Whether the periodic timer is armed.
    pub fn is_running(&self) -> bool {
        self.timer.lock().expect("timer lock poisoned").is_armed()
    }

    /// Whether a refresh pass is currently in flight.
    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::SeqCst)
    }

    fn arm_timer(self: &Arc<Self>, period: Duration) {
        let mut timer = self.timer.lock().expect("timer lock poisoned");
        if timer.is_armed() {
            return;
        }
        let layer = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the initial refresh
            // pass is driven by start() itself.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(layer) = layer.upgrade() else { break };
                layer.update().await;
            }
        });
        *timer = Timer::Armed(handle);
        tracing::info!(period_ms = period.as_millis() as u64, "polling timer armed");
    }

    // ------------------------------------------------------------------
    // Refresh pass
    // ------------------------------------------------------------------

    /// Run a single refresh pass.
    ///
    /// No-op when feeds are not resolved yet, and a silent skip when
    /// another pass is still in flight. Failures inside the pass are
    /// emitted on the `Error` channel; the partially rebuilt render set is
    /// left as-is (no rollback to the prior frame).
    pub async fn update(&self) {
        let feeds = {
            let state = self.state.lock().expect("layer state lock poisoned");
            match &state.feeds {
                Some(feeds) => feeds.clone(),
                None => return,
            }
        };
        if self
            .updating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("refresh pass already in flight, skipping");
            return;
        }

        let result = self.refresh(&feeds).await;
        self.updating.store(false, Ordering::SeqCst);

        if let Err(e) = result {
            tracing::warn!(error = %e, "refresh pass failed");
            self.events
                .emit(&GbfsEvent::Error(Arc::new(LayerError::Refresh(e))));
        }
    }

    async fn refresh(&self, feeds: &FeedSet) -> Result<(), RefreshError> {
        let station_status: Option<Arc<StationStatusFeed>> = match &feeds.station_status {
            Some(source) => Some(Arc::new(fetch_json(&self.client, source).await?)),
            None => None,
        };
        let free_bike_status: Option<Arc<FreeBikeFeed>> = match &feeds.free_bike_status {
            Some(source) => Some(Arc::new(fetch_json(&self.client, source).await?)),
            None => None,
        };
        let vehicle_types: Option<Arc<VehicleTypesFeed>> = match &feeds.vehicle_types {
            Some(source) => Some(Arc::new(fetch_json(&self.client, source).await?)),
            None => None,
        };

        // Stale markers never outlive one refresh boundary: clear before
        // inserting the new frame.
        self.container.clear();

        let mut refreshed_information: Option<Arc<StationInformationFeed>> = None;
        let mut station_count = 0usize;
        if let Some(status_feed) = &station_status {
            for status in &status_feed.data.stations {
                if !status.is_installed {
                    continue;
                }
                let station = match self.cached_station(&status.station_id) {
                    Some(station) => station,
                    None => {
                        // Unknown station: re-pull the whole metadata feed
                        // once per pass and repopulate the cache from every
                        // record it contains.
                        if refreshed_information.is_none() {
                            let source = feeds.station_information.as_ref().ok_or_else(|| {
                                RefreshError::UnknownStation {
                                    station_id: status.station_id.clone(),
                                }
                            })?;
                            let information: StationInformationFeed =
                                fetch_json(&self.client, source).await?;
                            let inserted = self.populate_station_cache(&information);
                            tracing::debug!(
                                stations = inserted,
                                "station metadata cache repopulated"
                            );
                            refreshed_information = Some(Arc::new(information));
                        }
                        self.cached_station(&status.station_id).ok_or_else(|| {
                            RefreshError::UnknownStation {
                                station_id: status.station_id.clone(),
                            }
                        })?
                    }
                };
                self.container
                    .add_marker(station_marker(&station, status, &self.options));
                station_count += 1;
            }
        }

        let mut bike_count = 0usize;
        if let Some(bike_feed) = &free_bike_status {
            for bike in &bike_feed.data.bikes {
                self.container.add_marker(bike_marker(bike, &self.options));
                bike_count += 1;
            }
        }

        tracing::debug!(
            stations = station_count,
            bikes = bike_count,
            "render set rebuilt"
        );
        self.events.emit(&GbfsEvent::Data(DataUpdate {
            station_status,
            station_information: refreshed_information,
            free_bike_status,
            vehicle_types,
        }));
        Ok(())
    }

    fn cached_station(&self, station_id: &str) -> Option<StationInformation> {
        self.state
            .lock()
            .expect("layer state lock poisoned")
            .stations
            .get(station_id)
            .cloned()
    }

    fn populate_station_cache(&self, information: &StationInformationFeed) -> usize {
        let mut state = self.state.lock().expect("layer state lock poisoned");
        for station in &information.data.stations {
            state
                .stations
                .insert(station.station_id.clone(), station.clone());
        }
        information.data.stations.len()
    }

    // ------------------------------------------------------------------
    // Host map integration
    // ------------------------------------------------------------------

    /// Attach hook: compose the render container into the host map, then
    /// auto-start when configured.
    pub async fn on_add(self: &Arc<Self>, map: &dyn MapHost) {
        map.add_layer(self.container.as_ref());
        if self.options.auto_start {
            if let Err(e) = self.start().await {
                tracing::warn!(error = %e, "auto-start on attach failed");
            }
        }
    }

    /// Detach hook: stop polling when configured to only run while
    /// attached, then remove the container from the host map.
    pub fn on_remove(&self, map: &dyn MapHost) {
        if self.options.only_run_when_added {
            self.stop();
        }
        map.remove_layer(self.container.as_ref());
    }

    /// Bounding box of the current render set.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError`] synchronously when the container does
    /// not support bounds computation or is empty.
    pub fn bounds(&self) -> Result<LatLngBounds, CapabilityError> {
        self.container.bounds()
    }

    /// Route a marker interaction from the host map back out as a
    /// `StationClick` or `BikeClick` event carrying the originating feed
    /// records.
    pub fn marker_clicked(&self, marker: &Marker, event: PointerEvent) {
        match &marker.payload {
            MarkerPayload::Station { station, status } => {
                self.events.emit(&GbfsEvent::StationClick {
                    event,
                    station: station.clone(),
                    status: status.clone(),
                });
            }
            MarkerPayload::Bike { bike } => {
                self.events.emit(&GbfsEvent::BikeClick {
                    event,
                    bike: bike.clone(),
                });
            }
        }
    }

    // ------------------------------------------------------------------
    // Observers and accessors
    // ------------------------------------------------------------------

    /// Register a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&GbfsEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, listener)
    }

    /// Detach a previously registered listener.
    pub fn off(&self, subscription: Subscription) {
        self.events.off(subscription);
    }

    pub fn options(&self) -> &GbfsLayerOptions {
        &self.options
    }

    pub fn container(&self) -> &Arc<dyn LayerContainer> {
        &self.container
    }

    /// System metadata parsed during discovery, if any.
    pub fn system_information(&self) -> Option<SystemInformationFeed> {
        self.state
            .lock()
            .expect("layer state lock poisoned")
            .system_information
            .clone()
    }

    /// Number of stations in the metadata cache.
    pub fn cached_station_count(&self) -> usize {
        self.state
            .lock()
            .expect("layer state lock poisoned")
            .stations
            .len()
    }

    #[cfg(test)]
    fn inject_feeds(&self, resolved: crate::feed::Resolved) {
        let mut state = self.state.lock().expect("layer state lock poisoned");
        state.system_information = resolved.system_information;
        state.feeds = Some(resolved.feeds);
    }
}

impl Drop for GbfsLayer {
    fn drop(&mut self) {
        self.timer.lock().expect("timer lock poisoned").disarm();
    }
}

// ============================================================================
// Tests
// ============================================================================
