//! Serde models for the GBFS JSON feed contract.
//!
//! Every feed shares the `{last_updated, ttl, data: {...}}` envelope. The
//! models are deliberately tolerant: unknown fields are captured in `extra`
//! maps instead of rejected, and `is_installed` accepts both the boolean of
//! GBFS v2 and the 0/1 integer still served by many v1 systems.

use serde::{Deserialize, Deserializer};

// ============================================================================
// Manifest (auto-discovery document)
// ============================================================================

/// The root discovery document: per-language lists of named sub-feed URLs.
///
/// `data` keeps the manifest's own key order (`serde_json` with
/// `preserve_order`); when no language is configured, the first key wins.
#[derive(Debug, Clone, Deserialize)]
pub struct GbfsManifest {
    #[serde(default)]
    pub last_updated: Option<i64>,
    #[serde(default)]
    pub ttl: Option<u32>,
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl GbfsManifest {
    /// Language keys in document order.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }
}

/// The feed list published for one language.
#[derive(Debug, Clone, Deserialize)]
pub struct LanguageFeeds {
    pub feeds: Vec<FeedDescriptor>,
}

/// One named sub-feed entry in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedDescriptor {
    pub name: String,
    pub url: String,
}

// ============================================================================
// System information
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SystemInformationFeed {
    #[serde(default)]
    pub last_updated: Option<i64>,
    #[serde(default)]
    pub ttl: Option<u32>,
    pub data: SystemInformation,
}

/// Slow-changing operator metadata. Only loosely typed; the layer stores it
/// for observers and never interprets it beyond the name.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemInformation {
    #[serde(default)]
    pub system_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ============================================================================
// Station information (metadata, cached for the layer's lifetime)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StationInformationFeed {
    #[serde(default)]
    pub last_updated: Option<i64>,
    #[serde(default)]
    pub ttl: Option<u32>,
    pub data: StationInformationData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationInformationData {
    pub stations: Vec<StationInformation>,
}

/// Fixed docking location metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct StationInformation {
    pub station_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ============================================================================
// Station status (ephemeral, rebuilt every refresh pass)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StationStatusFeed {
    #[serde(default)]
    pub last_updated: Option<i64>,
    #[serde(default)]
    pub ttl: Option<u32>,
    pub data: StationStatusData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationStatusData {
    pub stations: Vec<StationStatus>,
}

/// Live availability for one station.
#[derive(Debug, Clone, Deserialize)]
pub struct StationStatus {
    pub station_id: String,
    #[serde(deserialize_with = "bool_or_int")]
    pub is_installed: bool,
    pub num_bikes_available: u32,
    pub num_docks_available: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ============================================================================
// Free-floating vehicles
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct FreeBikeFeed {
    #[serde(default)]
    pub last_updated: Option<i64>,
    #[serde(default)]
    pub ttl: Option<u32>,
    pub data: FreeBikeData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FreeBikeData {
    pub bikes: Vec<FreeBike>,
}

/// A vehicle not tied to a station, located by raw coordinates.
#[derive(Debug, Clone, Deserialize)]
pub struct FreeBike {
    #[serde(default)]
    pub bike_id: Option<String>,
    pub lat: f64,
    pub lon: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ============================================================================
// Vehicle types (opaque passthrough)
// ============================================================================

/// The `vehicle_types` feed is fetched and handed to observers verbatim;
/// the layer itself renders nothing from it.
#[derive(Debug, Clone, Deserialize)]
pub struct VehicleTypesFeed {
    #[serde(default)]
    pub last_updated: Option<i64>,
    #[serde(default)]
    pub ttl: Option<u32>,
    pub data: serde_json::Value,
}

/// GBFS v1 serves `is_installed` as 0/1, v2 as a boolean. Accept both.
fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrInt {
        Bool(bool),
        Int(i64),
    }

    Ok(match BoolOrInt::deserialize(deserializer)? {
        BoolOrInt::Bool(b) => b,
        BoolOrInt::Int(i) => i != 0,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_preserves_language_order() {
        let json = r#"{
            "last_updated": 1700000000,
            "ttl": 60,
            "data": {
                "nb": {"feeds": [{"name": "system_information", "url": "https://x/nb/si.json"}]},
                "en": {"feeds": [{"name": "system_information", "url": "https://x/en/si.json"}]}
            }
        }"#;
        let manifest: GbfsManifest = serde_json::from_str(json).unwrap();
        let languages: Vec<&str> = manifest.languages().collect();
        assert_eq!(languages, vec!["nb", "en"]);
        assert_eq!(manifest.last_updated, Some(1_700_000_000));
        assert_eq!(manifest.ttl, Some(60));
    }

    #[test]
    fn test_manifest_without_languages() {
        let manifest: GbfsManifest = serde_json::from_str(r#"{"data": {}}"#).unwrap();
        assert_eq!(manifest.languages().count(), 0);
    }

    #[test]
    fn test_station_status_accepts_integer_is_installed() {
        let json = r#"{
            "data": {"stations": [
                {"station_id": "a", "is_installed": 1, "num_bikes_available": 3, "num_docks_available": 7},
                {"station_id": "b", "is_installed": 0, "num_bikes_available": 0, "num_docks_available": 10}
            ]}
        }"#;
        let feed: StationStatusFeed = serde_json::from_str(json).unwrap();
        assert!(feed.data.stations[0].is_installed);
        assert!(!feed.data.stations[1].is_installed);
    }

    #[test]
    fn test_station_status_accepts_boolean_is_installed() {
        let json = r#"{
            "data": {"stations": [
                {"station_id": "a", "is_installed": true, "num_bikes_available": 5, "num_docks_available": 5,
                 "num_ebikes_available": 2}
            ]}
        }"#;
        let feed: StationStatusFeed = serde_json::from_str(json).unwrap();
        let status = &feed.data.stations[0];
        assert!(status.is_installed);
        assert_eq!(status.num_bikes_available, 5);
        // Unknown fields land in the catch-all instead of failing the parse
        assert_eq!(
            status.extra.get("num_ebikes_available"),
            Some(&serde_json::json!(2))
        );
    }

    #[test]
    fn test_station_information_round_trip() {
        let json = r#"{
            "last_updated": 1700000100,
            "data": {"stations": [
                {"station_id": "s1", "name": "Alpha", "lat": 52.0, "lon": 13.0, "capacity": 12,
                 "region_id": "r1"}
            ]}
        }"#;
        let feed: StationInformationFeed = serde_json::from_str(json).unwrap();
        let station = &feed.data.stations[0];
        assert_eq!(station.station_id, "s1");
        assert_eq!(station.name, "Alpha");
        assert_eq!(station.lat, 52.0);
        assert_eq!(station.lon, 13.0);
        assert_eq!(station.capacity, Some(12));
        assert!(station.extra.contains_key("region_id"));
    }

    #[test]
    fn test_free_bike_without_id() {
        let json = r#"{"data": {"bikes": [{"lat": 48.1, "lon": 11.5}]}}"#;
        let feed: FreeBikeFeed = serde_json::from_str(json).unwrap();
        assert!(feed.data.bikes[0].bike_id.is_none());
        assert_eq!(feed.data.bikes[0].lat, 48.1);
    }

    #[test]
    fn test_system_information_keeps_extra_fields() {
        let json = r#"{"data": {"system_id": "demo", "name": "Demo Ride",
                       "timezone": "Europe/Berlin"}}"#;
        let feed: SystemInformationFeed = serde_json::from_str(json).unwrap();
        assert_eq!(feed.data.system_id.as_deref(), Some("demo"));
        assert_eq!(feed.data.name.as_deref(), Some("Demo Ride"));
        assert!(feed.data.extra.contains_key("timezone"));
    }

    #[test]
    fn test_malformed_status_is_rejected() {
        // num_bikes_available is required
        let json = r#"{"data": {"stations": [{"station_id": "a", "is_installed": true}]}}"#;
        assert!(serde_json::from_str::<StationStatusFeed>(json).is_err());
    }
}
