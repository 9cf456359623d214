//! estate-tour - headless virtual tour driver
//!
//! Loads the listings, mounts a tour for one property on a headless scene,
//! and drives it by voice: each stdin line is one recognition result
//! (`~text` interim, `@0.42 text` final with confidence, plain text final).
//!
//! Module structure:
//! - `domain/` - Core tour types (Property, RoomCatalog, TourState, VoiceCommand)
//! - `io/` - External interfaces (listings, image probe, scene, speech, metrics)
//! - `services/` - Tour logic (TourController, interpreter, capture, assistant)
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use estate_tour::infra::{Config, Metrics};
use estate_tour::io::{ApiEndpoints, HeadlessScene, HttpImageProbe, ImageProbe, LineRecognizer, ListingsClient};
use estate_tour::services::{
    CachedProbe, CaptureSettings, ControllerSettings, TourAssistant, TourController,
    VoiceCaptureSession,
};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Virtual property tour driven by voice commands
#[derive(Parser, Debug)]
#[command(name = "estate-tour", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Listing id to tour (defaults to the first listing)
    #[arg(short, long)]
    property: Option<String>,
}

const GREETING: &str = "Voice assistant activated. How can I help with your property tour?";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for scene and probe detail
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(git_hash = env!("GIT_HASH"), "estate-tour starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        api_base_url = %config.api_base_url(),
        settle_delay_ms = config.settle_delay().as_millis() as u64,
        probe_cache = config.probe_cache(),
        voice_lang = %config.voice_lang(),
        idle_timeout_ms = config.voice_idle_timeout().as_millis() as u64,
        prometheus_port = %config.prometheus_port(),
        "config_loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let metrics = Arc::new(Metrics::new());
    let api = ApiEndpoints::new(config.api_base_url());

    // Listings (sample data when the backend is unreachable)
    let listings = ListingsClient::new(api.clone(), config.api_timeout())?.load().await;
    let property = match &args.property {
        Some(id) => listings.find(id).cloned(),
        None => listings.properties.first().cloned(),
    };
    let Some(property) = property else {
        return Err(format!("no listing matches {:?}", args.property).into());
    };
    info!(
        property = %property.id,
        name = %property.name,
        from_fallback = listings.from_fallback,
        "property_selected"
    );

    // Image probe, memoized per image id when enabled
    let http_probe =
        HttpImageProbe::new(api.clone(), config.probe_timeout(), config.panorama_ratio(), metrics.clone())?;
    let probe: Arc<dyn ImageProbe> = if config.probe_cache() {
        Arc::new(CachedProbe::new(http_probe, metrics.clone()))
    } else {
        Arc::new(http_probe)
    };

    // Headless scene is ready as soon as it exists
    let scene = HeadlessScene::new();
    let (scene_ready_tx, scene_ready_rx) = watch::channel(false);
    let controller = Arc::new(TourController::new(
        &property,
        probe,
        Box::new(scene),
        api,
        ControllerSettings::from_config(&config),
        metrics.clone(),
    ));
    let _ = scene_ready_tx.send(true);

    // Log every published state change
    let mut state_rx = controller.subscribe();
    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = state_rx.borrow_and_update().clone();
            info!(phase = state.phase.as_str(), room = %state.current_room, "tour_state");
        }
    });

    // Start Prometheus metrics HTTP server (if port > 0)
    let prometheus_port = config.prometheus_port();
    if prometheus_port > 0 {
        let prom_metrics = metrics.clone();
        let prom_property = property.id.to_string();
        let prom_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = estate_tour::io::prometheus::start_metrics_server(
                prometheus_port,
                prom_metrics,
                prom_property,
                prom_shutdown,
            )
            .await
            {
                tracing::error!(error = %e, "Prometheus metrics server error");
            }
        });
    }

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    let outcome = controller.mount(scene_ready_rx).await;
    info!(outcome = outcome.as_str(), "tour_initial_room");

    // Voice input from stdin, replies to stdout
    let recognizer = LineRecognizer::spawn(BufReader::new(tokio::io::stdin()));
    let mut capture = VoiceCaptureSession::new(
        Some(Box::new(recognizer)),
        CaptureSettings::from_config(&config),
        metrics.clone(),
    );

    let (reply_tx, mut reply_rx) = mpsc::channel::<estate_tour::services::assistant::AssistantReply>(16);
    let printer = tokio::spawn(async move {
        println!("{GREETING}");
        while let Some(reply) = reply_rx.recv().await {
            println!("{}", reply.text);
        }
    });

    let mut assistant = TourAssistant::new(controller.clone(), property, &config, metrics.clone());
    let session = assistant.run(&mut capture, reply_tx, shutdown_rx.clone()).await;
    let _ = printer.await;

    info!(record = %session.to_json(), "tour_session_record");

    let _ = shutdown_tx.send(true);
    metrics.report().log();
    info!("estate-tour shutdown complete");
    Ok(())
}
