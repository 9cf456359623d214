//! Prometheus metrics HTTP endpoint
//!
//! Exposes tour metrics in Prometheus text format at /metrics.
//! Uses hyper for the HTTP server.

use crate::infra::metrics::{Metrics, MetricsSummary, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS};
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with property label
fn write_metric(
    output: &mut String,
    name: &str,
    help: &str,
    typ: MetricType,
    property: &str,
    val: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{property=\"{property}\"}} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    property: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    bounds: &[u64; 10],
    sum: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in bounds.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{property=\"{property}\",le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{property=\"{property}\",le=\"+Inf\"}} {cumulative}");

    let count: u64 = buckets.iter().sum();
    let _ = writeln!(output, "{name}_sum{{property=\"{property}\"}} {sum}");
    let _ = writeln!(output, "{name}_count{{property=\"{property}\"}} {count}");
}

/// Format metrics in Prometheus text exposition format. Scrapes read the
/// lifetime histogram and leave the periodic report untouched.
fn format_prometheus_metrics(metrics: &Metrics, property: &str) -> String {
    let summary = metrics.snapshot();
    let mut output = String::with_capacity(4096);

    write_switch_metrics(&mut output, property, &summary);
    write_probe_metrics(&mut output, property, &summary);
    write_voice_metrics(&mut output, property, &summary);

    output
}

fn write_switch_metrics(output: &mut String, property: &str, summary: &MetricsSummary) {
    let counters = [
        ("tour_switch_requests_total", "Room switches requested", summary.switch_requests),
        ("tour_switch_applied_total", "Room images applied to the scene", summary.switch_applied),
        ("tour_switch_rejected_total", "Switches to unavailable rooms", summary.switch_rejected),
        ("tour_switch_superseded_total", "Switches dropped for a later one", summary.switch_superseded),
        ("tour_switch_failed_total", "Switches that ended in error", summary.switch_failed),
        ("tour_panoramic_renders_total", "Rooms rendered as sky texture", summary.panoramic_renders),
        ("tour_flat_renders_total", "Rooms rendered on the flat plane", summary.flat_renders),
    ];
    for (name, help, val) in counters {
        write_metric(output, name, help, MetricType::Counter, property, val);
    }
}

fn write_probe_metrics(output: &mut String, property: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "tour_probes_total",
        "Image probes issued",
        MetricType::Counter,
        property,
        summary.probes_total,
    );
    write_metric(
        output,
        "tour_probe_failures_total",
        "Image probes that fell back to flat",
        MetricType::Counter,
        property,
        summary.probe_failures,
    );
    write_metric(
        output,
        "tour_probe_cache_hits_total",
        "Image probe results served from cache",
        MetricType::Counter,
        property,
        summary.probe_cache_hits,
    );
    write_histogram(
        output,
        "tour_probe_latency_ms",
        "Image probe latency in milliseconds",
        property,
        &summary.probe_latency_buckets,
        &METRICS_BUCKET_BOUNDS,
        summary.probe_latency_sum_ms,
    );
    write_metric(
        output,
        "tour_probe_latency_p95_ms",
        "95th percentile image probe latency",
        MetricType::Gauge,
        property,
        summary.probe_latency_p95_ms,
    );
}

fn write_voice_metrics(output: &mut String, property: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "tour_transcripts_forwarded_total",
        "Final transcripts forwarded to the interpreter",
        MetricType::Counter,
        property,
        summary.transcripts_forwarded,
    );
    write_metric(
        output,
        "tour_transcripts_gated_total",
        "Final transcripts below the recognizer confidence gate",
        MetricType::Counter,
        property,
        summary.transcripts_gated,
    );
    write_metric(
        output,
        "tour_commands_dispatched_total",
        "Voice commands dispatched",
        MetricType::Counter,
        property,
        summary.commands_dispatched,
    );
    write_metric(
        output,
        "tour_commands_discarded_total",
        "Voice commands below the command threshold",
        MetricType::Counter,
        property,
        summary.commands_discarded,
    );
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
    property: Arc<String>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(&metrics, &property);
            Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
        }
        (&Method::GET, "/health") => {
            Response::builder().status(StatusCode::OK).body(Full::new(Bytes::from("ok")))
        }
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found"))),
    };
    // Builder only fails on invalid header values; all of ours are static
    Ok(response.unwrap_or_else(|_| Response::new(Full::new(Bytes::new()))))
}

/// Start the Prometheus metrics HTTP server
pub async fn start_metrics_server(
    port: u16,
    metrics: Arc<Metrics>,
    property: String,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let property = Arc::new(property);

    info!(port = %port, property = %property, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();
                        let property = property.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                let property = property.clone();
                                async move { handle_request(req, metrics, property).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "prometheus_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "prometheus_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("prometheus_metrics_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
