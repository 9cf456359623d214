//! Per-image memoization of probe results
//!
//! Only successful classifications are kept; an unloaded result is retried on
//! the next switch. Entries are never evicted: the key space is the photo ids
//! of the loaded listings.

use crate::domain::types::{ImageId, ImageTypeResult};
use crate::infra::metrics::Metrics;
use crate::io::image_probe::ImageProbe;
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

pub struct CachedProbe<P> {
    inner: P,
    cache: Mutex<FxHashMap<ImageId, ImageTypeResult>>,
    metrics: Arc<Metrics>,
}

impl<P: ImageProbe> CachedProbe<P> {
    pub fn new(inner: P, metrics: Arc<Metrics>) -> Self {
        Self { inner, cache: Mutex::new(FxHashMap::default()), metrics }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

#[async_trait]
impl<P: ImageProbe> ImageProbe for CachedProbe<P> {
    async fn probe(&self, id: &ImageId) -> ImageTypeResult {
        let cached = self.cache.lock().get(id).copied();
        if let Some(hit) = cached {
            self.metrics.record_probe_cache_hit();
            debug!(image_id = %id, panoramic = hit.is_panoramic, "probe_cache_hit");
            return hit;
        }

        // Concurrent misses on one id may both probe; the results are identical
        let result = self.inner.probe(id).await;
        if !result.is_unloaded() {
            self.cache.lock().insert(id.clone(), result);
        }
        result
    }
}
