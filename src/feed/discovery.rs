//! Feed discovery: resolve which GBFS sub-feeds exist and where they live.
//!
//! Two modes. With pre-supplied feed files, handles are matched by fixed
//! file name and nothing touches the network. Otherwise the manifest at the
//! configured root URL is fetched, a language is selected, and the named
//! sub-feeds are looked up: `system_information` is required and parsed
//! eagerly, the rest are optional and stored as URL-bearing handles for
//! lazy reads during refresh passes.

use crate::feed::source::{fetch_json, FeedFile, FeedSource, FeedText, FetchError};
use crate::feed::types::{FeedDescriptor, GbfsManifest, LanguageFeeds, SystemInformationFeed};
use crate::options::GbfsLayerOptions;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

// Fixed file names matched in pre-supplied (offline) mode.
pub const SYSTEM_INFORMATION_FILE: &str = "system_information.json";
pub const STATION_INFORMATION_FILE: &str = "station_information.json";
pub const STATION_STATUS_FILE: &str = "station_status.json";
pub const FREE_BIKE_STATUS_FILE: &str = "free_bike_status.json";
pub const VEHICLE_TYPES_FILE: &str = "vehicle_types.json";

// Feed names looked up in the manifest's per-language feed list.
const SYSTEM_INFORMATION_FEED: &str = "system_information";
const STATION_INFORMATION_FEED: &str = "station_information";
const STATION_STATUS_FEED: &str = "station_status";
const FREE_BIKE_STATUS_FEED: &str = "free_bike_status";
const VEHICLE_TYPES_FEED: &str = "vehicle_types";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while resolving the feed set.
///
/// All of these are fatal to `start()` but leave the layer unstarted, so a
/// later `start()` retries discovery from scratch.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Neither a manifest URL nor feed files were configured
    #[error("no GBFS manifest URL or feed files configured")]
    NotConfigured,
    /// The manifest URL or a feed URL inside it does not parse
    #[error("invalid GBFS URL: {0}")]
    InvalidUrl(String),
    /// Fetching or parsing a discovery payload failed
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The configured language has no entry in the manifest
    #[error("configured language `{language}` missing in GBFS manifest")]
    UnknownLanguage { language: String },
    /// The manifest defines zero languages
    #[error("GBFS manifest has no languages defined")]
    NoLanguagesAvailable,
    /// The selected language's feed list has no `system_information` entry
    #[error("GBFS manifest has no system_information feed")]
    MissingSystemInformation,
    /// A language entry exists but is not a `{feeds: [...]}` object
    #[error("malformed feed list in GBFS manifest: {0}")]
    MalformedManifest(#[source] serde_json::Error),
}

// ============================================================================
// Resolved Feed Set
// ============================================================================

/// The feed roles the refresh pass consumes. Immutable once resolved.
#[derive(Debug, Clone, Default)]
pub struct FeedSet {
    pub station_information: Option<FeedSource>,
    pub station_status: Option<FeedSource>,
    pub free_bike_status: Option<FeedSource>,
    pub vehicle_types: Option<FeedSource>,
}

/// Discovery output: system metadata (parsed eagerly when present) plus the
/// handle table for lazy reads.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub system_information: Option<SystemInformationFeed>,
    pub feeds: FeedSet,
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the feed set described by `options`.
///
/// # Errors
///
/// Returns [`DiscoveryError`] when the manifest cannot be fetched or
/// parsed, the language selection fails, or the required
/// `system_information` feed is absent or unreadable.
pub async fn resolve(
    client: &reqwest::Client,
    options: &GbfsLayerOptions,
) -> Result<Resolved, DiscoveryError> {
    if let Some(files) = &options.gbfs_files {
        return resolve_local(files).await;
    }
    match &options.gbfs_url {
        Some(url) => resolve_remote(client, url, options.language.as_deref()).await,
        None => Err(DiscoveryError::NotConfigured),
    }
}

/// Offline mode: scan pre-supplied payloads by fixed file name. Unmatched
/// names are ignored so callers can pass a whole feed directory.
async fn resolve_local(files: &[FeedFile]) -> Result<Resolved, DiscoveryError> {
    let mut feeds = FeedSet::default();
    let mut system_information = None;

    for file in files {
        match file.name.as_str() {
            SYSTEM_INFORMATION_FILE => {
                let text = file.text().await.map_err(FetchError::LocalRead)?;
                system_information = Some(serde_json::from_str(&text).map_err(FetchError::Parse)?);
            }
            STATION_INFORMATION_FILE => {
                feeds.station_information = Some(local_source(file));
            }
            STATION_STATUS_FILE => {
                feeds.station_status = Some(local_source(file));
            }
            FREE_BIKE_STATUS_FILE => {
                feeds.free_bike_status = Some(local_source(file));
            }
            VEHICLE_TYPES_FILE => {
                feeds.vehicle_types = Some(local_source(file));
            }
            other => {
                tracing::debug!(file = other, "ignoring unrecognized feed file");
            }
        }
    }

    tracing::info!(
        station_status = feeds.station_status.is_some(),
        free_bike_status = feeds.free_bike_status.is_some(),
        "resolved feed set from pre-supplied files"
    );
    Ok(Resolved {
        system_information,
        feeds,
    })
}

/// Auto-discovery mode: fetch the manifest, select a language, and look up
/// the named sub-feeds.
async fn resolve_remote(
    client: &reqwest::Client,
    gbfs_url: &str,
    language: Option<&str>,
) -> Result<Resolved, DiscoveryError> {
    let root = Url::parse(gbfs_url).map_err(|e| DiscoveryError::InvalidUrl(e.to_string()))?;
    let manifest: GbfsManifest = fetch_json(client, &FeedSource::Url(root)).await?;

    let (selected, entry) = match language {
        Some(language) => {
            let entry =
                manifest
                    .data
                    .get(language)
                    .ok_or_else(|| DiscoveryError::UnknownLanguage {
                        language: language.to_string(),
                    })?;
            (language.to_string(), entry)
        }
        None => {
            // First language key in the manifest's own document order
            let (key, entry) = manifest
                .data
                .iter()
                .next()
                .ok_or(DiscoveryError::NoLanguagesAvailable)?;
            (key.clone(), entry)
        }
    };

    let listing: LanguageFeeds =
        serde_json::from_value(entry.clone()).map_err(DiscoveryError::MalformedManifest)?;
    let lookup = |name: &str| listing.feeds.iter().find(|f| f.name == name);

    let system = lookup(SYSTEM_INFORMATION_FEED).ok_or(DiscoveryError::MissingSystemInformation)?;
    let system_source = url_source(&system.url)?;
    let system_information: SystemInformationFeed = fetch_json(client, &system_source).await?;

    let feeds = FeedSet {
        station_information: optional_source(lookup(STATION_INFORMATION_FEED))?,
        station_status: optional_source(lookup(STATION_STATUS_FEED))?,
        free_bike_status: optional_source(lookup(FREE_BIKE_STATUS_FEED))?,
        vehicle_types: optional_source(lookup(VEHICLE_TYPES_FEED))?,
    };

    tracing::info!(
        language = %selected,
        system = system_information.data.name.as_deref().unwrap_or("<unnamed>"),
        station_status = feeds.station_status.is_some(),
        free_bike_status = feeds.free_bike_status.is_some(),
        "resolved feed set from manifest"
    );
    Ok(Resolved {
        system_information: Some(system_information),
        feeds,
    })
}

fn local_source(file: &FeedFile) -> FeedSource {
    FeedSource::Local(Arc::new(file.clone()))
}

fn url_source(raw: &str) -> Result<FeedSource, DiscoveryError> {
    Url::parse(raw)
        .map(FeedSource::Url)
        .map_err(|e| DiscoveryError::InvalidUrl(format!("{raw}: {e}")))
}

/// Absence of an optional sub-feed is not an error; a present entry with an
/// unparseable URL is.
fn optional_source(
    descriptor: Option<&FeedDescriptor>,
) -> Result<Option<FeedSource>, DiscoveryError> {
    descriptor.map(|d| url_source(&d.url)).transpose()
}

// ============================================================================
// Tests
// ============================================================================
