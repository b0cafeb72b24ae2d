//! Typed layer options with explicit defaults, validation, and optional
//! TOML loading.
//!
//! The options struct replaces an open-ended option bag: every field has a
//! default, `validate` rejects unusable combinations up front, and a missing
//! options file yields `GbfsLayerOptions::default()`. Unknown keys in the
//! file are ignored (with a warning), so older files keep working.

use crate::feed::FeedFile;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default polling period in milliseconds (one minute).
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 60_000;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML in options file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Options file exceeds the maximum allowed size.
    #[error("options file too large: {0}")]
    TooLarge(String),

    /// The option values do not describe a usable layer.
    #[error("invalid options: {0}")]
    Invalid(String),
}

// ============================================================================
// Options Struct
// ============================================================================

/// Configuration for a [`GbfsLayer`](crate::layer::GbfsLayer).
///
/// All fields use `#[serde(default)]` so any subset of keys can be given in
/// an options file. `gbfs_files` cannot come from a file; it is set
/// programmatically for offline/pre-fetched feed mode and takes precedence
/// over `gbfs_url` when both are present.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GbfsLayerOptions {
    /// GBFS auto-discovery (manifest) URL.
    pub gbfs_url: Option<String>,

    /// Pre-supplied feed payloads, matched by fixed file name
    /// (`station_status.json` and friends). Discovery does no network
    /// access when these are set.
    #[serde(skip)]
    pub gbfs_files: Option<Vec<FeedFile>>,

    /// Feed language to select from the manifest. Unset picks the first
    /// language the manifest lists.
    pub language: Option<String>,

    /// Start polling when the layer is added to a map.
    pub auto_start: bool,

    /// Polling period in milliseconds. 0 disables the timer; refresh passes
    /// then only happen through manual `update()` calls.
    pub refresh_interval_ms: u64,

    /// Stop polling when the layer is removed from the map.
    pub only_run_when_added: bool,

    /// Fill color of the ratio ring (the "bikes" share).
    pub bike_marker_color: String,

    /// Background color of the ratio ring (the "docks" share).
    pub bike_marker_bg_color: String,

    /// Background color of the inner station badge.
    pub station_marker_bg_color: String,

    /// Text color of the bike count inside the station badge.
    pub station_marker_color: String,

    /// Bind a name/availability popup to station markers.
    pub show_station_popup: bool,

    /// Bind a "Bike available" popup to free-floating vehicle markers.
    pub show_bike_popup: bool,
}

impl Default for GbfsLayerOptions {
    fn default() -> Self {
        Self {
            gbfs_url: None,
            gbfs_files: None,
            language: None,
            auto_start: true,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            only_run_when_added: false,
            bike_marker_color: "white".to_string(),
            bike_marker_bg_color: "silver".to_string(),
            station_marker_bg_color: "#8C2BF2".to_string(),
            station_marker_color: "white".to_string(),
            show_station_popup: true,
            show_bike_popup: true,
        }
    }
}

impl GbfsLayerOptions {
    /// Maximum options file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Polling period as a [`Duration`], or `None` when polling is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        if self.refresh_interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.refresh_interval_ms))
        }
    }

    /// Check that the options describe a usable layer.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::Invalid`] when neither a manifest URL nor
    /// pre-supplied feed files are configured, when `gbfs_url` does not
    /// parse as an absolute URL, or when a styling color is empty.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.gbfs_url.is_none() && self.gbfs_files.is_none() {
            return Err(OptionsError::Invalid(
                "either gbfs_url or gbfs_files must be configured".to_string(),
            ));
        }
        if let Some(raw) = &self.gbfs_url {
            url::Url::parse(raw)
                .map_err(|e| OptionsError::Invalid(format!("gbfs_url `{raw}` is invalid: {e}")))?;
        }
        if let Some(language) = &self.language {
            if language.trim().is_empty() {
                return Err(OptionsError::Invalid(
                    "language must not be empty when set".to_string(),
                ));
            }
        }
        for (name, value) in [
            ("bike_marker_color", &self.bike_marker_color),
            ("bike_marker_bg_color", &self.bike_marker_bg_color),
            ("station_marker_bg_color", &self.station_marker_bg_color),
            ("station_marker_color", &self.station_marker_color),
        ] {
            if value.trim().is_empty() {
                return Err(OptionsError::Invalid(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Load options from a TOML file.
    ///
    /// - Missing file → `Ok(GbfsLayerOptions::default())`
    /// - Empty file → `Ok(GbfsLayerOptions::default())`
    /// - Invalid TOML → `Err(OptionsError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as a warning
    ///
    /// Loading does not validate; callers typically overlay CLI arguments
    /// first and then call [`validate`](Self::validate) (the layer
    /// constructor does this).
    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(OptionsError::TooLarge(format!(
                    "options file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no options file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(OptionsError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "options file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "gbfs_url",
                "language",
                "auto_start",
                "refresh_interval_ms",
                "only_run_when_added",
                "bike_marker_color",
                "bike_marker_bg_color",
                "station_marker_bg_color",
                "station_marker_color",
                "show_station_popup",
                "show_bike_popup",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "unknown key in options file, ignoring");
                }
            }
        }

        let options: GbfsLayerOptions = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded layer options");
        Ok(options)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = GbfsLayerOptions::default();
        assert!(options.gbfs_url.is_none());
        assert!(options.gbfs_files.is_none());
        assert!(options.language.is_none());
        assert!(options.auto_start);
        assert_eq!(options.refresh_interval_ms, 60_000);
        assert!(!options.only_run_when_added);
        assert_eq!(options.bike_marker_color, "white");
        assert_eq!(options.bike_marker_bg_color, "silver");
        assert_eq!(options.station_marker_bg_color, "#8C2BF2");
        assert_eq!(options.station_marker_color, "white");
        assert!(options.show_station_popup);
        assert!(options.show_bike_popup);
    }

    #[test]
    fn test_refresh_interval_zero_disables_polling() {
        let mut options = GbfsLayerOptions::default();
        options.refresh_interval_ms = 0;
        assert!(options.refresh_interval().is_none());

        options.refresh_interval_ms = 1_500;
        assert_eq!(options.refresh_interval(), Some(Duration::from_millis(1_500)));
    }

    #[test]
    fn test_validate_requires_a_feed_location() {
        let options = GbfsLayerOptions::default();
        let err = options.validate().unwrap_err();
        assert!(matches!(err, OptionsError::Invalid(_)));
    }

    #[test]
    fn test_validate_accepts_url_mode() {
        let mut options = GbfsLayerOptions::default();
        options.gbfs_url = Some("https://gbfs.example.com/gbfs.json".to_string());
        options.validate().unwrap();
    }

    #[test]
    fn test_validate_accepts_file_mode() {
        let mut options = GbfsLayerOptions::default();
        options.gbfs_files = Some(vec![FeedFile::new("system_information.json", "{}")]);
        options.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut options = GbfsLayerOptions::default();
        options.gbfs_url = Some("not a url".to_string());
        assert!(matches!(
            options.validate().unwrap_err(),
            OptionsError::Invalid(_)
        ));
    }

    #[test]
    fn test_validate_rejects_empty_language() {
        let mut options = GbfsLayerOptions::default();
        options.gbfs_url = Some("https://gbfs.example.com/gbfs.json".to_string());
        options.language = Some("  ".to_string());
        assert!(matches!(
            options.validate().unwrap_err(),
            OptionsError::Invalid(_)
        ));
    }

    #[test]
    fn test_validate_rejects_empty_color() {
        let mut options = GbfsLayerOptions::default();
        options.gbfs_url = Some("https://gbfs.example.com/gbfs.json".to_string());
        options.station_marker_bg_color = String::new();
        assert!(matches!(
            options.validate().unwrap_err(),
            OptionsError::Invalid(_)
        ));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/gbfs_layer_test_nonexistent_options.toml");
        let options = GbfsLayerOptions::load(path).unwrap();
        assert_eq!(options.refresh_interval_ms, DEFAULT_REFRESH_INTERVAL_MS);
    }

    #[test]
    fn test_partial_file_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("gbfs_layer_options_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("options.toml");
        std::fs::write(&path, "refresh_interval_ms = 5000\n").unwrap();

        let options = GbfsLayerOptions::load(&path).unwrap();
        assert_eq!(options.refresh_interval_ms, 5_000);
        assert_eq!(options.bike_marker_color, "white"); // default
        assert!(options.auto_start); // default

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_file() {
        let dir = std::env::temp_dir().join("gbfs_layer_options_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("options.toml");

        let content = r##"
gbfs_url = "https://gbfs.example.com/gbfs.json"
language = "en"
auto_start = false
refresh_interval_ms = 30000
only_run_when_added = true
bike_marker_color = "#ffffff"
station_marker_bg_color = "teal"
show_bike_popup = false
"##;
        std::fs::write(&path, content).unwrap();

        let options = GbfsLayerOptions::load(&path).unwrap();
        assert_eq!(
            options.gbfs_url.as_deref(),
            Some("https://gbfs.example.com/gbfs.json")
        );
        assert_eq!(options.language.as_deref(), Some("en"));
        assert!(!options.auto_start);
        assert_eq!(options.refresh_interval_ms, 30_000);
        assert!(options.only_run_when_added);
        assert_eq!(options.bike_marker_color, "#ffffff");
        assert_eq!(options.station_marker_bg_color, "teal");
        assert!(options.show_station_popup); // default
        assert!(!options.show_bike_popup);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("gbfs_layer_options_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("options.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let err = GbfsLayerOptions::load(&path).unwrap_err();
        assert!(matches!(err, OptionsError::Parse(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = std::env::temp_dir().join("gbfs_layer_options_test_unknown");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("options.toml");
        std::fs::write(&path, "totally_fake_key = 42\nlanguage = \"en\"\n").unwrap();

        let options = GbfsLayerOptions::load(&path).unwrap();
        assert_eq!(options.language.as_deref(), Some("en"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("gbfs_layer_options_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("options.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = GbfsLayerOptions::load(&path).unwrap_err();
        assert!(matches!(err, OptionsError::TooLarge(_)));

        std::fs::remove_dir_all(&dir).ok();
    }
}
