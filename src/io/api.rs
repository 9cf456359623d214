//! Backend endpoint construction

use crate::domain::types::ImageId;

/// URLs of the listing backend and image store, derived from one base URL
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    base_url: String,
}

impl ApiEndpoints {
    pub fn new(base_url: &str) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string() }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}/api/images/{id}` returns the raw image bytes
    pub fn image_url(&self, id: &ImageId) -> String {
        format!("{}/api/images/{}", self.base_url, id)
    }

    pub fn listings_url(&self) -> String {
        format!("{}/api/getListings", self.base_url)
    }
}
