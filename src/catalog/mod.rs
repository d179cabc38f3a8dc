//! Archive catalog
//!
//! In-memory copy of the provider's archive listing. Files are published with a
//! delay, so a listing fetched early may not contain an entry yet; callers refresh
//! explicitly and the whole list is replaced on every refresh.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::decode::{FileFormat, FormatError};
use crate::transport::endpoints::split_location;
use crate::transport::{Endpoints, Transport, TransportError};

pub mod known;

pub use known::{KnownResource, KnownResources, KnownResourcesError};

/// Period an archive covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Horizon {
    /// One local calendar day (`D`)
    Daily,
    /// One local calendar month (`M`)
    Monthly,
}

impl Horizon {
    /// Interpret the listing's horizon code; anything but `M` is daily
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "M" | "m" => Horizon::Monthly,
            _ => Horizon::Daily,
        }
    }

    /// True if an entry dated `entry` covers the local day `day`
    pub fn covers(&self, entry: NaiveDate, day: NaiveDate) -> bool {
        match self {
            Horizon::Daily => entry == day,
            Horizon::Monthly => entry.year() == day.year() && entry.month() == day.month(),
        }
    }
}

/// One row of the archive listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    /// Numeric archive id
    pub id: u32,
    /// Logical name, matched exactly
    pub name: String,
    /// Download path relative to the API base URL
    pub location: String,
    /// Raw format tag (`archive_type`)
    pub format_tag: String,
    /// Container layout derived from the tag or the download file name
    pub format: Option<FileFormat>,
    /// Covered period
    pub horizon: Horizon,
    /// Local date the file applies to
    pub date: NaiveDate,
    /// Publication timestamp as sent by the provider
    pub publication_date: Option<String>,
    /// Whether the file can be downloaded
    pub available: bool,
}

impl CatalogEntry {
    /// True if the entry is available and applies to the local day of `date`
    pub fn applies_to(&self, date: &DateTime<FixedOffset>) -> bool {
        self.available && self.horizon.covers(self.date, date.date_naive())
    }
}

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Listing could not be fetched
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Listing payload is malformed
    #[error("malformed archive listing: {0}")]
    Listing(#[from] FormatError),
}

/// Listing cache the resolver consults for archive references
///
/// Mutation goes through `&mut self`; the catalog is never refreshed behind the
/// caller's back.
#[async_trait]
pub trait ArchiveCatalog: Send + Sync {
    /// True once any refresh has completed
    fn is_loaded(&self) -> bool;

    /// Fetch the listing (for `date`, or the current one) and replace the cache
    async fn refresh(&mut self, date: Option<&DateTime<FixedOffset>>) -> Result<(), CatalogError>;

    /// Exact, case-sensitive lookup among available entries applicable to `date`
    fn find(&self, name: &str, date: &DateTime<FixedOffset>) -> Option<CatalogEntry>;

    /// Current entry list
    fn entries(&self) -> &[CatalogEntry];

    /// True if any entry has this name, whatever its date or availability
    fn contains_name(&self, name: &str) -> bool {
        self.entries().iter().any(|e| e.name == name)
    }
}

/// Listing-backed catalog
pub struct Catalog {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    entries: Vec<CatalogEntry>,
    loaded: bool,
}

impl Catalog {
    /// Empty catalog that fetches listings through `transport`
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
            entries: Vec::new(),
            loaded: false,
        }
    }
}

#[async_trait]
impl ArchiveCatalog for Catalog {
    fn is_loaded(&self) -> bool {
        self.loaded
    }

    async fn refresh(&mut self, date: Option<&DateTime<FixedOffset>>) -> Result<(), CatalogError> {
        let params: Vec<(&str, String)> = date
            .map(|d| vec![(self.endpoints.date_param, d.to_rfc3339())])
            .unwrap_or_default();

        let payload = self
            .transport
            .get(&self.endpoints.archive_listing(), &params)
            .await?;
        let entries = parse_listing(&payload.body, &self.endpoints)?;

        info!(
            entries = entries.len(),
            date = date.map(|d| d.to_rfc3339()).unwrap_or_else(|| "current".to_string()),
            "Archive listing refreshed"
        );
        self.entries = entries;
        self.loaded = true;
        Ok(())
    }

    fn find(&self, name: &str, date: &DateTime<FixedOffset>) -> Option<CatalogEntry> {
        let found = self
            .entries
            .iter()
            .find(|e| e.name == name && e.applies_to(date))
            .cloned();
        debug!(name, date = %date, hit = found.is_some(), "Catalog lookup");
        found
    }

    fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }
}

#[derive(Debug, Deserialize)]
struct RawListing {
    archives: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    id: u32,
    name: String,
    #[serde(default)]
    archive_type: String,
    #[serde(default)]
    horizon: String,
    date: RawDate,
    #[serde(default)]
    download: Option<RawDownload>,
    #[serde(default)]
    publication_date: Option<RawDate>,
    #[serde(default = "default_available")]
    available: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDate {
    Nested { date: String },
    Plain(String),
}

impl RawDate {
    fn as_str(&self) -> &str {
        match self {
            RawDate::Nested { date } | RawDate::Plain(date) => date,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDownload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

fn default_available() -> bool {
    true
}

/// Local calendar date of a listing timestamp (`2021-06-01T00:00:00.000+02:00`
/// or a bare `2021-06-01`)
fn listing_date(raw: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok())
}

/// Parse an archive listing document
///
/// # Errors
/// [`FormatError::Json`] when the document or an entry is malformed.
pub fn parse_listing(body: &[u8], endpoints: &Endpoints) -> Result<Vec<CatalogEntry>, FormatError> {
    let listing: RawListing = serde_json::from_slice(body)
        .map_err(|e| FormatError::Json(format!("archive listing: {e}")))?;

    listing
        .archives
        .into_iter()
        .map(|raw| {
            let date = listing_date(raw.date.as_str()).ok_or_else(|| {
                FormatError::Json(format!(
                    "archive '{}': unreadable date '{}'",
                    raw.name,
                    raw.date.as_str()
                ))
            })?;
            let (url, file_name) = match raw.download {
                Some(d) => (d.url, d.name),
                None => (None, None),
            };
            let location = url
                .map(|u| split_location(&u).0)
                .unwrap_or_else(|| endpoints.archive_download(&raw.id.to_string()));
            let format = FileFormat::from_tag(&raw.archive_type)
                .or_else(|| file_name.as_deref().and_then(FileFormat::from_file_name));

            Ok(CatalogEntry {
                id: raw.id,
                name: raw.name,
                location,
                format_tag: raw.archive_type,
                format,
                horizon: Horizon::from_code(&raw.horizon),
                date,
                publication_date: raw.publication_date.map(|d| d.as_str().to_string()),
                available: raw.available,
            })
        })
        .collect()
}
