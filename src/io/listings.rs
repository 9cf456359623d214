//! Listing backend client
//!
//! Fetches `GET /api/getListings` and maps each record onto a `Property`.
//! Any failure (transport, status, malformed payload) falls back to the
//! built-in sample listings so a tour can always start.

use crate::domain::property::{sample_properties, Property, RoomKind};
use crate::domain::types::{ImageId, PropertyId};
use crate::io::api::ApiEndpoints;
use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct ListingsPayload {
    #[serde(default)]
    success: bool,
    properties: Option<Vec<ListingRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingRecord {
    id: Value,
    #[serde(default)]
    title: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    area: Option<Value>,
    #[serde(default)]
    features: Vec<Value>,
    #[serde(default)]
    kitchen_photo_id: Option<String>,
    #[serde(default)]
    drawing_room_photo_id: Option<String>,
    #[serde(default)]
    room_photo_id: Option<String>,
    #[serde(default)]
    bathroom_photo_id: Option<String>,
}

/// Render a scalar JSON value as text; empty strings and non-scalars are absent
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn photo_id(raw: Option<String>) -> Option<ImageId> {
    raw.filter(|id| !id.trim().is_empty()).map(ImageId)
}

impl ListingRecord {
    fn into_property(self) -> Property {
        Property {
            id: PropertyId(scalar_text(&self.id).unwrap_or_default()),
            name: self.title,
            address: self.location,
            kitchen_image: photo_id(self.kitchen_photo_id),
            living_room_image: photo_id(self.drawing_room_photo_id),
            bedroom_image: photo_id(self.room_photo_id),
            bathroom_image: photo_id(self.bathroom_photo_id),
            price: self.price.as_ref().and_then(scalar_text),
            area: self.area.as_ref().and_then(scalar_text),
            features: self.features.iter().filter_map(scalar_text).collect(),
        }
    }
}

/// Parse a listings response body
pub fn parse_listings(body: &[u8]) -> anyhow::Result<Vec<Property>> {
    let payload: ListingsPayload =
        serde_json::from_slice(body).context("listings payload is not valid JSON")?;
    if !payload.success {
        anyhow::bail!("listings payload reports success=false");
    }
    let Some(records) = payload.properties else {
        anyhow::bail!("listings payload has no properties");
    };
    Ok(records.into_iter().map(ListingRecord::into_property).collect())
}

/// Result of loading listings
#[derive(Debug, Clone)]
pub struct ListingsLoad {
    pub properties: Vec<Property>,
    /// True when the sample listings were substituted
    pub from_fallback: bool,
    pub error: Option<String>,
}

impl ListingsLoad {
    pub fn find(&self, id: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.id.0 == id)
    }
}

pub struct ListingsClient {
    client: reqwest::Client,
    api: ApiEndpoints,
}

impl ListingsClient {
    pub fn new(api: ApiEndpoints, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .http1_only()
            .build()
            .context("failed to build listings client")?;
        Ok(Self { client, api })
    }

    pub async fn fetch(&self) -> anyhow::Result<Vec<Property>> {
        let url = self.api.listings_url();
        let response = self.client.get(&url).send().await.with_context(|| format!("GET {url}"))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("listing backend returned {status}");
        }
        let body = response.bytes().await.context("failed to read listings body")?;
        parse_listings(&body)
    }

    /// Fetch listings, substituting the sample data on any failure
    pub async fn load(&self) -> ListingsLoad {
        match self.fetch().await {
            Ok(properties) => {
                info!(count = properties.len(), "listings_loaded");
                ListingsLoad { properties, from_fallback: false, error: None }
            }
            Err(e) => {
                let error = format!("{e:#}");
                warn!(error = %error, "listings_fallback");
                ListingsLoad { properties: sample_properties(), from_fallback: true, error: Some(error) }
            }
        }
    }
}

/// Room photo ids referenced by a set of listings
pub fn referenced_images(properties: &[Property]) -> impl Iterator<Item = &ImageId> {
    properties.iter().flat_map(|p| RoomKind::ALL.into_iter().filter_map(move |k| p.image_for(k)))
}
