//! Marker assembly: position, icon, popup, and the click payload that lets
//! the layer re-emit interactions with their originating feed records.

use crate::feed::types::{FreeBike, StationInformation, StationStatus};
use crate::map::LatLng;
use crate::options::GbfsLayerOptions;
use crate::render::icon::station_icon_html;

pub const STATION_ICON_SIZE: (u32, u32) = (32, 32);
pub const STATION_POPUP_ANCHOR: (i32, i32) = (0, -21);
pub const STATION_ICON_CLASS: &str = "station-icon";

/// Name of the shared static vehicle bitmap the host map resolves.
pub const BIKE_ICON_NAME: &str = "bike";
pub const BIKE_ICON_SIZE: (u32, u32) = (32, 32);
pub const BIKE_POPUP_ANCHOR: (i32, i32) = (0, -20);

// ============================================================================
// Marker Types
// ============================================================================

/// How a marker is drawn.
#[derive(Debug, Clone)]
pub enum MarkerIcon {
    /// Generated markup (the station ratio ring).
    Html {
        html: String,
        size: (u32, u32),
        popup_anchor: (i32, i32),
        class_name: &'static str,
    },
    /// A named bitmap provided by the host map (the shared bike icon).
    Bitmap {
        name: &'static str,
        size: (u32, u32),
        popup_anchor: (i32, i32),
    },
}

/// The feed records a marker was built from, carried so interactions can be
/// re-emitted with their original data.
#[derive(Debug, Clone)]
pub enum MarkerPayload {
    Station {
        station: StationInformation,
        status: StationStatus,
    },
    Bike {
        bike: FreeBike,
    },
}

/// One renderable map marker.
#[derive(Debug, Clone)]
pub struct Marker {
    pub position: LatLng,
    pub icon: MarkerIcon,
    pub popup: Option<String>,
    pub payload: MarkerPayload,
}

// ============================================================================
// Assembly
// ============================================================================

/// Build the marker for one installed station.
pub fn station_marker(
    station: &StationInformation,
    status: &StationStatus,
    options: &GbfsLayerOptions,
) -> Marker {
    let icon = MarkerIcon::Html {
        html: station_icon_html(
            status.num_bikes_available,
            status.num_docks_available,
            options,
        ),
        size: STATION_ICON_SIZE,
        popup_anchor: STATION_POPUP_ANCHOR,
        class_name: STATION_ICON_CLASS,
    };
    let popup = options.show_station_popup.then(|| {
        format!(
            "<b>{}</b><br>Available bikes: <b>{}</b>",
            station.name, status.num_bikes_available
        )
    });
    Marker {
        position: LatLng::new(station.lat, station.lon),
        icon,
        popup,
        payload: MarkerPayload::Station {
            station: station.clone(),
            status: status.clone(),
        },
    }
}

/// Build the marker for one free-floating vehicle.
pub fn bike_marker(bike: &FreeBike, options: &GbfsLayerOptions) -> Marker {
    let popup = options
        .show_bike_popup
        .then(|| "Bike available".to_string());
    Marker {
        position: LatLng::new(bike.lat, bike.lon),
        icon: MarkerIcon::Bitmap {
            name: BIKE_ICON_NAME,
            size: BIKE_ICON_SIZE,
            popup_anchor: BIKE_POPUP_ANCHOR,
        },
        popup,
        payload: MarkerPayload::Bike { bike: bike.clone() },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn station(name: &str, lat: f64, lon: f64) -> StationInformation {
        StationInformation {
            station_id: "s1".to_string(),
            name: name.to_string(),
            lat,
            lon,
            capacity: None,
            extra: serde_json::Map::new(),
        }
    }

    fn status(bikes: u32, docks: u32) -> StationStatus {
        StationStatus {
            station_id: "s1".to_string(),
            is_installed: true,
            num_bikes_available: bikes,
            num_docks_available: docks,
            extra: serde_json::Map::new(),
        }
    }

    fn bike(lat: f64, lon: f64) -> FreeBike {
        FreeBike {
            bike_id: Some("b1".to_string()),
            lat,
            lon,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_station_marker_position_and_popup() {
        let marker = station_marker(
            &station("Alpha", 52.0, 13.0),
            &status(3, 7),
            &GbfsLayerOptions::default(),
        );
        assert_eq!(marker.position, LatLng::new(52.0, 13.0));
        let popup = marker.popup.unwrap();
        assert!(popup.contains("Alpha"));
        assert!(popup.contains("3"));
        assert!(matches!(marker.payload, MarkerPayload::Station { .. }));
    }

    #[test]
    fn test_station_popup_suppressed_by_option() {
        let mut options = GbfsLayerOptions::default();
        options.show_station_popup = false;
        let marker = station_marker(&station("Alpha", 52.0, 13.0), &status(3, 7), &options);
        assert!(marker.popup.is_none());
    }

    #[test]
    fn test_station_marker_carries_ratio_icon() {
        let marker = station_marker(
            &station("Alpha", 52.0, 13.0),
            &status(3, 7),
            &GbfsLayerOptions::default(),
        );
        match marker.icon {
            MarkerIcon::Html {
                html,
                size,
                popup_anchor,
                class_name,
            } => {
                assert!(html.contains("station-icon-ring"));
                assert_eq!(size, STATION_ICON_SIZE);
                assert_eq!(popup_anchor, STATION_POPUP_ANCHOR);
                assert_eq!(class_name, STATION_ICON_CLASS);
            }
            other => panic!("expected html icon, got {other:?}"),
        }
    }

    #[test]
    fn test_bike_marker_uses_shared_bitmap() {
        let marker = bike_marker(&bike(48.1, 11.5), &GbfsLayerOptions::default());
        assert_eq!(marker.position, LatLng::new(48.1, 11.5));
        assert_eq!(marker.popup.as_deref(), Some("Bike available"));
        assert!(matches!(
            marker.icon,
            MarkerIcon::Bitmap {
                name: BIKE_ICON_NAME,
                ..
            }
        ));
    }

    #[test]
    fn test_bike_popup_suppressed_by_option() {
        let mut options = GbfsLayerOptions::default();
        options.show_bike_popup = false;
        let marker = bike_marker(&bike(48.1, 11.5), &options);
        assert!(marker.popup.is_none());
    }
}
