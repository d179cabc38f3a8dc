//! Indicator name to id resolution and resource listings
//!
//! The provider has no search endpoint: resolving a name means downloading the full
//! indicator listing, which routinely takes more than 20 seconds. Results are never
//! cached, so callers that know the id should pass it directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::transport::{Endpoints, Transport, TransportError};

/// Lookup errors
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// No indicator has this exact name
    #[error("no indicator named '{0}'")]
    NotFound(String),

    /// Listing could not be fetched
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Listing payload is malformed
    #[error("malformed indicator listing: {0}")]
    Listing(String),
}

/// Resolves a logical name to a numeric id
#[async_trait]
pub trait NameLookup: Send + Sync {
    /// Id of the resource named exactly `name`
    async fn lookup_id(&self, name: &str) -> Result<u32, LookupError>;
}

/// Key of the array in the indicator listing
pub const INDICATOR_LISTING_KEY: &str = "indicators";

/// One entry of the indicator or JSON archive listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    /// Numeric id
    pub id: u32,
    /// Exact name
    pub name: String,
    /// Archive type tag, when the listing carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_type: Option<String>,
}

/// Parse a listing document: the array under `key`, or under the first key when `None`
///
/// # Errors
/// [`LookupError::Listing`] when the document has no such array or its entries
/// lack an id or a name.
pub fn parse_summaries(body: &[u8], key: Option<&str>) -> Result<Vec<ResourceSummary>, LookupError> {
    let document: serde_json::Map<String, Value> =
        serde_json::from_slice(body).map_err(|e| LookupError::Listing(e.to_string()))?;
    let entries = match key {
        Some(key) => document.get(key),
        None => document.values().next(),
    }
    .ok_or_else(|| LookupError::Listing(format!("no '{}' listing", key.unwrap_or("*"))))?;
    Vec::<ResourceSummary>::deserialize(entries).map_err(|e| LookupError::Listing(e.to_string()))
}

/// Lookup through the indicator listing endpoint
pub struct IndicatorSearch {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
}

impl IndicatorSearch {
    /// Search indicators through `transport`
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }
}

#[async_trait]
impl NameLookup for IndicatorSearch {
    async fn lookup_id(&self, name: &str) -> Result<u32, LookupError> {
        warn!(name, "Resolving indicator by name downloads the full listing; pass the id to skip this");
        let started = Instant::now();

        let payload = self
            .transport
            .get(&self.endpoints.indicator_listing(), &[])
            .await?;
        let listing = parse_summaries(&payload.body, Some(INDICATOR_LISTING_KEY))?;

        let id = listing
            .into_iter()
            .find(|i| i.name == name)
            .map(|i| i.id)
            .ok_or_else(|| LookupError::NotFound(name.to_string()))?;

        info!(name, id, elapsed_ms = started.elapsed().as_millis() as u64, "Indicator resolved");
        Ok(id)
    }
}
