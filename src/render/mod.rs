//! Converting merged feed data into map-displayable entities.
//!
//! - [`icon`] - the pure ratio-ring markup generator
//! - [`marker`] - marker assembly (position, icon, popup, click payload)

pub mod icon;
pub mod marker;

pub use icon::station_icon_html;
pub use marker::{
    bike_marker, station_marker, Marker, MarkerIcon, MarkerPayload, BIKE_ICON_NAME,
};
