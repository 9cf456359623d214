//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! Monotonic counters are only ever loaded. The probe latency histogram is
//! kept twice: a periodic copy swapped to zero on each `report()`, and a
//! lifetime copy read by `snapshot()` for scrapers that expect cumulative
//! histograms.
//!
//! All atomics use Relaxed ordering. The controller keeps its own sequence
//! counter for switch ordering; nothing here drives tour logic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Probe latency bucket boundaries (milliseconds)
/// Buckets: ≤25, ≤50, ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, >12800
const BUCKET_BOUNDS: [u64; 10] = [25, 50, 100, 200, 400, 800, 1600, 3200, 6400, 12800];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_ms: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_ms)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [25, 50, 100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Room switches requested (monotonic)
    switch_requests: AtomicU64,
    /// Switches rejected because the room had no image
    switch_rejected: AtomicU64,
    /// Switches whose image reached the scene
    switch_applied: AtomicU64,
    /// Switches dropped because a later one won
    switch_superseded: AtomicU64,
    /// Switches that ended in the error phase
    switch_failed: AtomicU64,
    /// Rooms rendered as sky texture
    panoramic_renders: AtomicU64,
    /// Rooms rendered on the flat plane
    flat_renders: AtomicU64,
    /// Image probes issued (cache misses)
    probes_total: AtomicU64,
    /// Probes that fell back to the unloaded result
    probe_failures: AtomicU64,
    /// Probe results served from the memo cache
    probe_cache_hits: AtomicU64,
    /// Probe latency histogram buckets (reset on report)
    probe_latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Sum of probe latencies in ms (reset on report)
    probe_latency_sum_ms: AtomicU64,
    /// Max probe latency in ms (reset on report)
    probe_latency_max_ms: AtomicU64,
    /// Probe latency histogram since start (never reset)
    probe_latency_lifetime_buckets: [AtomicU64; NUM_BUCKETS],
    /// Sum of probe latencies in ms since start (never reset)
    probe_latency_lifetime_sum_ms: AtomicU64,
    /// Final transcripts forwarded to the interpreter
    transcripts_forwarded: AtomicU64,
    /// Final transcripts held back by the recognizer-confidence gate
    transcripts_gated: AtomicU64,
    /// Commands dispatched to the tour
    commands_dispatched: AtomicU64,
    /// Commands discarded below the command threshold
    commands_discarded: AtomicU64,
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            switch_requests: AtomicU64::new(0),
            switch_rejected: AtomicU64::new(0),
            switch_applied: AtomicU64::new(0),
            switch_superseded: AtomicU64::new(0),
            switch_failed: AtomicU64::new(0),
            panoramic_renders: AtomicU64::new(0),
            flat_renders: AtomicU64::new(0),
            probes_total: AtomicU64::new(0),
            probe_failures: AtomicU64::new(0),
            probe_cache_hits: AtomicU64::new(0),
            probe_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            probe_latency_sum_ms: AtomicU64::new(0),
            probe_latency_max_ms: AtomicU64::new(0),
            probe_latency_lifetime_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            probe_latency_lifetime_sum_ms: AtomicU64::new(0),
            transcripts_forwarded: AtomicU64::new(0),
            transcripts_gated: AtomicU64::new(0),
            commands_dispatched: AtomicU64::new(0),
            commands_discarded: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_switch_requested(&self) {
        self.switch_requests.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_switch_rejected(&self) {
        self.switch_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a room image reaching the scene
    #[inline]
    pub fn record_switch_applied(&self, panoramic: bool) {
        self.switch_applied.fetch_add(1, Ordering::Relaxed);
        if panoramic {
            self.panoramic_renders.fetch_add(1, Ordering::Relaxed);
        } else {
            self.flat_renders.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_switch_superseded(&self) {
        self.switch_superseded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_switch_failed(&self) {
        self.switch_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed probe with its latency (lock-free)
    #[inline]
    pub fn record_probe(&self, latency_ms: u64, failed: bool) {
        self.probes_total.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.probe_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.probe_latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.probe_latency_lifetime_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        let bucket = bucket_index(latency_ms);
        self.probe_latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.probe_latency_lifetime_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.probe_latency_max_ms, latency_ms);
    }

    #[inline]
    pub fn record_probe_cache_hit(&self) {
        self.probe_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_transcript(&self, forwarded: bool) {
        if forwarded {
            self.transcripts_forwarded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.transcripts_gated.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_command(&self, dispatched: bool) {
        if dispatched {
            self.commands_dispatched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.commands_discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn switch_superseded(&self) -> u64 {
        self.switch_superseded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn switch_rejected(&self) -> u64 {
        self.switch_rejected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn probe_cache_hits(&self) -> u64 {
        self.probe_cache_hits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn probes_total(&self) -> u64 {
        self.probes_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn transcripts_gated(&self) -> u64 {
        self.transcripts_gated.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn commands_discarded(&self) -> u64 {
        self.commands_discarded.load(Ordering::Relaxed)
    }

    /// Generate a summary and reset the periodic probe histogram
    pub fn report(&self) -> MetricsSummary {
        let now = Instant::now();
        let interval_secs = {
            let mut last = self.last_report_time.lock();
            let elapsed = now.duration_since(*last).as_secs_f64();
            *last = now;
            elapsed
        };

        let buckets = swap_buckets(&self.probe_latency_buckets);
        let sum_ms = self.probe_latency_sum_ms.swap(0, Ordering::Relaxed);
        let max_ms = self.probe_latency_max_ms.swap(0, Ordering::Relaxed);
        self.summary(interval_secs, buckets, sum_ms, max_ms)
    }

    /// Summary with the lifetime probe histogram; resets nothing
    pub fn snapshot(&self) -> MetricsSummary {
        let interval_secs = self.last_report_time.lock().elapsed().as_secs_f64();
        let buckets = std::array::from_fn(|i| {
            self.probe_latency_lifetime_buckets[i].load(Ordering::Relaxed)
        });
        let sum_ms = self.probe_latency_lifetime_sum_ms.load(Ordering::Relaxed);
        let max_ms = self.probe_latency_max_ms.load(Ordering::Relaxed);
        self.summary(interval_secs, buckets, sum_ms, max_ms)
    }

    fn summary(
        &self,
        interval_secs: f64,
        probe_latency_buckets: [u64; NUM_BUCKETS],
        probe_latency_sum_ms: u64,
        probe_latency_max_ms: u64,
    ) -> MetricsSummary {
        let probe_count: u64 = probe_latency_buckets.iter().sum();
        let probe_latency_avg_ms =
            if probe_count > 0 { probe_latency_sum_ms / probe_count } else { 0 };

        MetricsSummary {
            interval_secs,
            switch_requests: self.switch_requests.load(Ordering::Relaxed),
            switch_rejected: self.switch_rejected.load(Ordering::Relaxed),
            switch_applied: self.switch_applied.load(Ordering::Relaxed),
            switch_superseded: self.switch_superseded.load(Ordering::Relaxed),
            switch_failed: self.switch_failed.load(Ordering::Relaxed),
            panoramic_renders: self.panoramic_renders.load(Ordering::Relaxed),
            flat_renders: self.flat_renders.load(Ordering::Relaxed),
            probes_total: self.probes_total.load(Ordering::Relaxed),
            probe_failures: self.probe_failures.load(Ordering::Relaxed),
            probe_cache_hits: self.probe_cache_hits.load(Ordering::Relaxed),
            probe_latency_buckets,
            probe_latency_sum_ms,
            probe_latency_avg_ms,
            probe_latency_max_ms,
            probe_latency_p95_ms: percentile_from_buckets(&probe_latency_buckets, 0.95),
            transcripts_forwarded: self.transcripts_forwarded.load(Ordering::Relaxed),
            transcripts_gated: self.transcripts_gated.load(Ordering::Relaxed),
            commands_dispatched: self.commands_dispatched.load(Ordering::Relaxed),
            commands_discarded: self.commands_discarded.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of histogram buckets (exported for Prometheus formatting)
pub const METRICS_NUM_BUCKETS: usize = NUM_BUCKETS;

/// Exported bucket bounds for Prometheus formatting
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = BUCKET_BOUNDS;

#[derive(Debug)]
pub struct MetricsSummary {
    /// Seconds since the previous report
    pub interval_secs: f64,
    pub switch_requests: u64,
    pub switch_rejected: u64,
    pub switch_applied: u64,
    pub switch_superseded: u64,
    pub switch_failed: u64,
    pub panoramic_renders: u64,
    pub flat_renders: u64,
    pub probes_total: u64,
    pub probe_failures: u64,
    pub probe_cache_hits: u64,
    /// Probe latency histogram buckets (this interval from `report()`,
    /// since start from `snapshot()`)
    /// Bounds: ≤25, ≤50, ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, >12800 ms
    pub probe_latency_buckets: [u64; NUM_BUCKETS],
    pub probe_latency_sum_ms: u64,
    pub probe_latency_avg_ms: u64,
    pub probe_latency_max_ms: u64,
    pub probe_latency_p95_ms: u64,
    pub transcripts_forwarded: u64,
    pub transcripts_gated: u64,
    pub commands_dispatched: u64,
    pub commands_discarded: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            interval_secs = format!("{:.1}", self.interval_secs),
            switches = %self.switch_requests,
            applied = %self.switch_applied,
            rejected = %self.switch_rejected,
            superseded = %self.switch_superseded,
            failed = %self.switch_failed,
            probes = %self.probes_total,
            probe_failures = %self.probe_failures,
            probe_cache_hits = %self.probe_cache_hits,
            probe_p95_ms = %self.probe_latency_p95_ms,
            transcripts = %self.transcripts_forwarded,
            commands = %self.commands_dispatched,
            "metrics"
        );
    }
}
