//! The seam between the layer and the host map engine.
//!
//! The layer never talks to a concrete map library. It owns a render
//! container obtained through [`LayerContainer`] and is attached/detached
//! through [`MapHost`]; both are narrow traits a host adapter implements.
//! [`VectorContainer`] is the in-memory implementation used by tests and
//! the watcher binary.

use crate::render::Marker;
use std::sync::RwLock;
use thiserror::Error;

// ============================================================================
// Geometry
// ============================================================================

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lon: f64,
}

impl LatLng {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// An axis-aligned bounding box over coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    /// Bounds covering a single point.
    pub fn of(point: LatLng) -> Self {
        Self {
            south_west: point,
            north_east: point,
        }
    }

    /// Grow the bounds to include `point`.
    pub fn extend(&mut self, point: LatLng) {
        self.south_west.lat = self.south_west.lat.min(point.lat);
        self.south_west.lon = self.south_west.lon.min(point.lon);
        self.north_east.lat = self.north_east.lat.max(point.lat);
        self.north_east.lon = self.north_east.lon.max(point.lon);
    }
}

/// A marker interaction reported by the host map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// Where on the map the interaction happened.
    pub location: LatLng,
}

// ============================================================================
// Error Types
// ============================================================================

/// A required host-container capability is missing or undefined. Returned
/// synchronously from the querying call, never via the event channel.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("layer container does not support bounds computation")]
    BoundsUnsupported,
    #[error("layer container is empty, bounds are undefined")]
    EmptyBounds,
}

// ============================================================================
// Host Traits
// ============================================================================

/// The render container the layer draws into. Exactly one marker set is
/// live at a time: every refresh pass calls `clear` before re-adding.
pub trait LayerContainer: Send + Sync {
    /// Remove all markers.
    fn clear(&self);

    /// Add one marker to the current render set.
    fn add_marker(&self, marker: Marker);

    /// Snapshot of the current render set.
    fn markers(&self) -> Vec<Marker>;

    /// Bounding box of the current render set.
    ///
    /// # Errors
    ///
    /// [`CapabilityError::BoundsUnsupported`] when the container cannot
    /// compute bounds at all, [`CapabilityError::EmptyBounds`] when it can
    /// but holds no markers.
    fn bounds(&self) -> Result<LatLngBounds, CapabilityError>;
}

/// The host map the layer's container is composed into.
pub trait MapHost {
    fn add_layer(&self, container: &dyn LayerContainer);
    fn remove_layer(&self, container: &dyn LayerContainer);
}

// ============================================================================
// In-Memory Container
// ============================================================================

/// A plain vector-backed [`LayerContainer`].
#[derive(Default)]
pub struct VectorContainer {
    markers: RwLock<Vec<Marker>>,
}

impl VectorContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.markers.read().expect("container lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LayerContainer for VectorContainer {
    fn clear(&self) {
        self.markers.write().expect("container lock poisoned").clear();
    }

    fn add_marker(&self, marker: Marker) {
        self.markers
            .write()
            .expect("container lock poisoned")
            .push(marker);
    }

    fn markers(&self) -> Vec<Marker> {
        self.markers.read().expect("container lock poisoned").clone()
    }

    fn bounds(&self) -> Result<LatLngBounds, CapabilityError> {
        let markers = self.markers.read().expect("container lock poisoned");
        let mut positions = markers.iter().map(|m| m.position);
        let first = positions.next().ok_or(CapabilityError::EmptyBounds)?;
        let mut bounds = LatLngBounds::of(first);
        for position in positions {
            bounds.extend(position);
        }
        Ok(bounds)
    }
}

// ============================================================================
// Tests
// ============================================================================
