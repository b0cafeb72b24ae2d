//! Live GBFS bikeshare and scooter availability as a map overlay.
//!
//! The crate polls a GBFS feed (General Bikeshare Feed Specification),
//! merges fast-changing station status with cached station metadata, and
//! rebuilds a set of renderable markers on every refresh pass. The host
//! map engine stays outside: it supplies a [`map::LayerContainer`] to draw
//! into and receives marker interactions back through
//! [`layer::GbfsLayer::marker_clicked`].
//!
//! # Example
//!
//! ```no_run
//! use gbfs_layer::{EventKind, GbfsEvent, GbfsLayer, GbfsLayerOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut options = GbfsLayerOptions::default();
//! options.gbfs_url = Some("https://gbfs.example.com/gbfs.json".to_string());
//!
//! let layer = GbfsLayer::new(options)?;
//! layer.on(EventKind::Data, |event| {
//!     if let GbfsEvent::Data(update) = event {
//!         println!("stations feed present: {}", update.station_status.is_some());
//!     }
//! });
//! if let Err(error) = layer.start().await {
//!     eprintln!("start failed: {error}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod feed;
pub mod layer;
pub mod map;
pub mod options;
pub mod render;

pub use events::{DataUpdate, EventBus, EventKind, GbfsEvent, Subscription};
pub use feed::{DiscoveryError, FeedFile, FeedSource, FeedText, FetchError};
pub use layer::{GbfsLayer, LayerError, RefreshError};
pub use map::{
    CapabilityError, LatLng, LatLngBounds, LayerContainer, MapHost, PointerEvent, VectorContainer,
};
pub use options::{GbfsLayerOptions, OptionsError};
pub use render::{Marker, MarkerIcon, MarkerPayload};
