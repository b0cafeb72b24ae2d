//! Watcher binary: drive a [`GbfsLayer`] against a live or file-based GBFS
//! system and log what each refresh pass renders.

use anyhow::{Context, Result};
use clap::Parser;
use gbfs_layer::{
    EventKind, FeedFile, GbfsEvent, GbfsLayer, GbfsLayerOptions, VectorContainer,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "gbfs-layer",
    about = "Watch a GBFS feed and log rendered marker updates"
)]
struct Args {
    /// GBFS auto-discovery (manifest) URL
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Pre-fetched GBFS feed file (repeatable); the file name selects the
    /// feed role, e.g. station_status.json
    #[arg(long, value_name = "FILE")]
    file: Vec<PathBuf>,

    /// Feed language to select from the manifest
    #[arg(long)]
    language: Option<String>,

    /// Refresh interval in seconds (0 disables polling)
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,

    /// Optional TOML options file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run a single refresh pass and exit
    #[arg(long)]
    once: bool,
}

async fn load_feed_files(paths: &[PathBuf]) -> Result<Vec<FeedFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read feed file {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("feed file {} has no usable name", path.display()))?;
        files.push(FeedFile::new(name, contents));
    }
    Ok(files)
}

fn feed_age_secs(last_updated: Option<i64>) -> Option<i64> {
    let reported = chrono::DateTime::from_timestamp(last_updated?, 0)?;
    Some((chrono::Utc::now() - reported).num_seconds())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut options = match &args.config {
        Some(path) => GbfsLayerOptions::load(path)?,
        None => GbfsLayerOptions::default(),
    };
    if let Some(url) = args.url {
        options.gbfs_url = Some(url);
    }
    if let Some(language) = args.language {
        options.language = Some(language);
    }
    if let Some(interval) = args.interval {
        options.refresh_interval_ms = interval * 1_000;
    }
    if !args.file.is_empty() {
        options.gbfs_files = Some(load_feed_files(&args.file).await?);
    }
    if args.once {
        // polling disabled; the single pass below is driven manually
        options.refresh_interval_ms = 0;
    }

    let container = Arc::new(VectorContainer::new());
    let watched = Arc::clone(&container);
    let layer =
        GbfsLayer::with_container(options, watched).context("invalid layer options")?;

    layer.on(EventKind::Data, |event| {
        if let GbfsEvent::Data(update) = event {
            let stations = update
                .station_status
                .as_ref()
                .map(|f| f.data.stations.len())
                .unwrap_or(0);
            let bikes = update
                .free_bike_status
                .as_ref()
                .map(|f| f.data.bikes.len())
                .unwrap_or(0);
            let age_secs =
                feed_age_secs(update.station_status.as_ref().and_then(|f| f.last_updated));
            tracing::info!(stations, bikes, age_secs, "refresh pass completed");
        }
    });
    layer.on(EventKind::Error, |event| {
        if let GbfsEvent::Error(error) = event {
            tracing::warn!(error = %error, "layer reported an error");
        }
    });

    if let Err(e) = layer.start().await {
        anyhow::bail!("failed to start GBFS layer: {e}");
    }

    if let Some(system) = layer.system_information() {
        if let Some(name) = system.data.name {
            tracing::info!(system = %name, "connected");
        }
    }

    if args.once {
        layer.update().await;
        println!("rendered {} markers", container.len());
        return Ok(());
    }

    tracing::info!("polling; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    layer.stop();
    println!("Goodbye!");
    Ok(())
}
