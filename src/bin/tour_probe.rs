//! tour-probe - classify room photos as panoramic or flat
//!
//! Probes the given image ids against the image store, or every room photo
//! of the current listings when none are given.

use clap::Parser;
use estate_tour::domain::types::ImageId;
use estate_tour::infra::{Config, Metrics};
use estate_tour::io::listings::referenced_images;
use estate_tour::io::{ApiEndpoints, HttpImageProbe, ImageProbe, ListingsClient};
use std::sync::Arc;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tour-probe", version, about = "Classify tour images as panoramic or flat")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Override the backend base URL from the config
    #[arg(long)]
    base_url: Option<String>,

    /// Image ids to probe
    ids: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::load_from_path(&args.config);
    if let Some(url) = &args.base_url {
        config = config.with_api_base_url(url);
    }

    let api = ApiEndpoints::new(config.api_base_url());
    let metrics = Arc::new(Metrics::new());

    let mut ids: Vec<ImageId> = args.ids.into_iter().map(ImageId).collect();
    if ids.is_empty() {
        let listings = ListingsClient::new(api.clone(), config.api_timeout())?.load().await;
        if listings.from_fallback {
            eprintln!("listings unavailable, probing sample listings");
        }
        for id in referenced_images(&listings.properties) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
    }

    let probe =
        HttpImageProbe::new(api, config.probe_timeout(), config.panorama_ratio(), metrics.clone())?;

    println!("{:<28} {:>11} {:>6}  kind", "image", "size", "ratio");
    for id in &ids {
        let result = probe.probe(id).await;
        let kind = if result.is_unloaded() {
            "unloaded"
        } else if result.is_panoramic {
            "panoramic"
        } else {
            "flat"
        };
        println!(
            "{:<28} {:>11} {:>6.2}  {}",
            id.as_str(),
            format!("{}x{}", result.width, result.height),
            result.aspect_ratio(),
            kind
        );
    }

    let summary = metrics.report();
    eprintln!(
        "probed {} image(s), {} failed, p95 {} ms",
        summary.probes_total, summary.probe_failures, summary.probe_latency_p95_ms
    );
    Ok(())
}
