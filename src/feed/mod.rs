//! GBFS feed handling: wire models, feed handles, and discovery.
//!
//! This module covers everything between "a GBFS system exists somewhere"
//! and "the layer holds typed payloads":
//!
//! - [`types`] - serde models for the GBFS JSON contract
//! - [`source`] - feed handles (URL or in-memory) and the bounded
//!   fetch/parse path
//! - [`discovery`] - resolving the feed-handle table from a manifest URL or
//!   from pre-supplied files

pub mod discovery;
pub mod source;
pub mod types;

pub use discovery::{DiscoveryError, FeedSet, Resolved};
pub use source::{fetch_json, FeedFile, FeedSource, FeedText, FetchError};
pub use types::{
    FeedDescriptor, FreeBike, FreeBikeFeed, GbfsManifest, LanguageFeeds, StationInformation,
    StationInformationFeed, StationStatus, StationStatusFeed, SystemInformation,
    SystemInformationFeed, VehicleTypesFeed,
};
