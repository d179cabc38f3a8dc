//! Resource resolution and fetch orchestration
//!
//! A request is classified once into a [`Resource`], resolved to a date-bound
//! [`ResourceReference`], fetched with one transport call and decoded according to
//! its kind:
//!
//! | Resource      | Endpoint                          | Result            |
//! |---------------|-----------------------------------|-------------------|
//! | indicator     | `/indicators/{id}`                | `Table`           |
//! | archive JSON  | `/archives_json/{name}`           | `Nested`          |
//! | archive       | listing entry download path       | `Tables`          |
//! | program       | `/archives/{name}/download`       | `Table`           |
//!
//! Archive references come from the catalog. A miss triggers exactly one refresh
//! for the requested date and one more lookup before failing with
//! [`ClientError::NotAvailable`].

use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{ArchiveCatalog, Catalog, KnownResource, KnownResources};
use crate::config::{ClientConfig, ConfigError};
use crate::decode::{self, ArchiveLayout, FormatError};
use crate::lookup::{self, IndicatorSearch, NameLookup, ResourceSummary};
use crate::program::{self, ProgramOptions};
use crate::timezone::Timezone;
use crate::transport::{Endpoints, HttpTransport, Payload, Transport};
use crate::{DecodedResult, ResourceKind, ResourceReference, ResourceTarget, Table};

mod error;

pub use error::{ClientError, ClientResult, RequestContext};

/// JSON archive listing programming units and their owner
pub const UNITS_ARCHIVE: &str = "UnidadesProgramacion";

/// JSON archive listing market participants
pub const PARTICIPANTS_ARCHIVE: &str = "SujetosMercado";

/// What the caller asks for: a numeric id or a logical name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Numeric id, always an indicator
    Id(u32),
    /// Logical name, classified before fetching
    Name(String),
}

impl From<u32> for Query {
    fn from(id: u32) -> Self {
        Query::Id(id)
    }
}

impl From<&str> for Query {
    fn from(name: &str) -> Self {
        Query::Name(name.to_string())
    }
}

impl From<String> for Query {
    fn from(name: String) -> Self {
        Query::Name(name)
    }
}

/// How an indicator is identified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndicatorKey {
    /// Numeric id, fetched directly
    Id(u32),
    /// Name, resolved through the name lookup first
    Name(String),
}

/// Classified resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Time series from the indicator endpoint
    Indicator(IndicatorKey),
    /// Date-scoped file from the archive listing
    Archive(String),
    /// JSON document fetched by name
    ArchiveJson(String),
    /// Program report
    Program(String),
}

impl Resource {
    /// Resource kind
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Indicator(_) => ResourceKind::Indicator,
            Resource::Archive(_) => ResourceKind::Archive,
            Resource::ArchiveJson(_) => ResourceKind::ArchiveJson,
            Resource::Program(_) => ResourceKind::Program,
        }
    }

    /// Name or id as requested
    pub fn target(&self) -> ResourceTarget {
        match self {
            Resource::Indicator(IndicatorKey::Id(id)) => ResourceTarget::Id(*id),
            Resource::Indicator(IndicatorKey::Name(name))
            | Resource::Archive(name)
            | Resource::ArchiveJson(name)
            | Resource::Program(name) => ResourceTarget::Name(name.clone()),
        }
    }

    fn context(&self, date: &DateTime<FixedOffset>) -> RequestContext {
        RequestContext::new(self.kind(), self.target(), date)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.target())
    }
}

/// ESIOS client
///
/// Holds the archive catalog, so catalog-touching calls take `&mut self`. Every
/// call is one sequential fetch-and-decode; nothing is cached between calls except
/// the listing.
pub struct EsiosClient {
    transport: Arc<dyn Transport>,
    catalog: Box<dyn ArchiveCatalog>,
    lookup: Box<dyn NameLookup>,
    timezone: Arc<dyn Timezone>,
    endpoints: Endpoints,
    known: KnownResources,
}

impl EsiosClient {
    /// Client with the default HTTP transport, listing catalog and indicator search
    ///
    /// # Errors
    /// Fails when no token is configured or the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config)?);
        let mut client = Self::with_transport(transport, config.timezone.clone());
        client.known = KnownResources::load_embedded()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        Ok(client)
    }

    /// Client over any transport, with the default catalog and name lookup
    pub fn with_transport(transport: Arc<dyn Transport>, timezone: Arc<dyn Timezone>) -> Self {
        let endpoints = Endpoints::default();
        let catalog = Box::new(Catalog::new(transport.clone(), endpoints.clone()));
        let lookup = Box::new(IndicatorSearch::new(transport.clone(), endpoints.clone()));
        Self::with_collaborators(transport, catalog, lookup, timezone)
    }

    /// Client with every collaborator supplied by the caller
    pub fn with_collaborators(
        transport: Arc<dyn Transport>,
        catalog: Box<dyn ArchiveCatalog>,
        lookup: Box<dyn NameLookup>,
        timezone: Arc<dyn Timezone>,
    ) -> Self {
        let known = KnownResources::load_embedded().unwrap_or_else(|e| {
            warn!("Embedded resource registry unusable, starting empty: {e}");
            KnownResources::default()
        });
        Self {
            transport,
            catalog,
            lookup,
            timezone,
            endpoints: Endpoints::default(),
            known,
        }
    }

    /// Local timezone used for dates and decoded timestamps
    pub fn timezone(&self) -> &dyn Timezone {
        self.timezone.as_ref()
    }

    /// Archive catalog
    pub fn catalog(&self) -> &dyn ArchiveCatalog {
        self.catalog.as_ref()
    }

    /// Registry of known resources
    pub fn known_resources(&self) -> &KnownResources {
        &self.known
    }

    /// Register a resource kind and layout for a name
    pub fn register(&mut self, resource: KnownResource) -> Option<KnownResource> {
        self.known.register(resource)
    }

    /// Fetch the archive listing (for `date`, or the current one) into the catalog
    ///
    /// # Errors
    /// [`ClientError::Transport`] or [`ClientError::Format`] when the listing cannot be
    /// fetched or read.
    pub async fn refresh_catalog(&mut self, date: Option<&DateTime<FixedOffset>>) -> ClientResult<()> {
        let context = RequestContext {
            kind: ResourceKind::Archive,
            resource: ResourceTarget::Name(self.endpoints.archive_listing()),
            date: date.copied(),
        };
        self.catalog
            .refresh(date)
            .await
            .map_err(|e| ClientError::from_catalog(context, e))
    }

    /// Resolve an indicator name to its id (slow: downloads the full listing)
    ///
    /// # Errors
    /// [`ClientError::NotFound`] when no indicator has this exact name.
    pub async fn lookup_id(&self, name: &str) -> ClientResult<u32> {
        let context =
            RequestContext::undated(ResourceKind::Indicator, ResourceTarget::Name(name.to_string()));
        self.lookup
            .lookup_id(name)
            .await
            .map_err(|e| ClientError::from_lookup(context, e))
    }

    /// Every published indicator (slow: downloads the full listing)
    ///
    /// # Errors
    /// [`ClientError::Transport`] or [`ClientError::Format`].
    pub async fn list_indicators(&self) -> ClientResult<Vec<ResourceSummary>> {
        let location = self.endpoints.indicator_listing();
        self.list(ResourceKind::Indicator, location, Some(lookup::INDICATOR_LISTING_KEY))
            .await
    }

    /// Every JSON archive
    ///
    /// # Errors
    /// [`ClientError::Transport`] or [`ClientError::Format`].
    pub async fn list_json_archives(&self) -> ClientResult<Vec<ResourceSummary>> {
        let location = self.endpoints.archive_json_listing();
        self.list(ResourceKind::ArchiveJson, location, None).await
    }

    /// Programming units with the name of the market participant owning them
    ///
    /// Downloads [`UNITS_ARCHIVE`] and [`PARTICIPANTS_ARCHIVE`] for `date` and joins
    /// them, see [`decode::json::join_unit_owners`].
    ///
    /// # Errors
    /// Any error of the two downloads, or [`ClientError::Format`] when they do
    /// not hold records.
    pub async fn programming_unit_owners(
        &mut self,
        date: &DateTime<FixedOffset>,
    ) -> ClientResult<Table> {
        let units = self.nested(UNITS_ARCHIVE, date).await?;
        let participants = self.nested(PARTICIPANTS_ARCHIVE, date).await?;

        let context = RequestContext::new(
            ResourceKind::ArchiveJson,
            ResourceTarget::Name(UNITS_ARCHIVE.to_string()),
            date,
        );
        let table = decode::json::join_unit_owners(&units, &participants)
            .map_err(|source| ClientError::Format { context, source })?;
        info!(date = %date.to_rfc3339(), units = table.len(), "Joined unit owners");
        Ok(table)
    }

    /// Fetch and decode a resource by id or name
    ///
    /// An id is always an indicator and never touches the catalog. A name is
    /// classified first, see [`EsiosClient::classify`].
    ///
    /// # Errors
    /// See [`ClientError`].
    pub async fn download_by(
        &mut self,
        query: impl Into<Query>,
        date: &DateTime<FixedOffset>,
    ) -> ClientResult<DecodedResult> {
        let resource = self.classify(query.into(), date).await?;
        self.download(resource, date).await
    }

    /// Decide the kind of a requested resource
    ///
    /// Order: ids are indicators; registered names take their registered kind; a
    /// name present in the archive listing is an archive; anything else is taken as
    /// an indicator name.
    ///
    /// The listing consulted here is the undated one loaded on first use. An
    /// unregistered archive that is missing from it (for instance one published
    /// with a delay) is therefore taken as an indicator name and ends in
    /// [`ClientError::NotFound`]. [`EsiosClient::register`] such names as archives
    /// so they go through the dated refresh in [`EsiosClient::resolve`] instead.
    ///
    /// # Errors
    /// Fails only if the archive listing has to be loaded and cannot be.
    pub async fn classify(
        &mut self,
        query: Query,
        date: &DateTime<FixedOffset>,
    ) -> ClientResult<Resource> {
        let name = match query {
            Query::Id(id) => return Ok(Resource::Indicator(IndicatorKey::Id(id))),
            Query::Name(name) => name,
        };

        let resource = match self.known.kind_of(&name) {
            Some(ResourceKind::Archive) => Resource::Archive(name),
            Some(ResourceKind::ArchiveJson) => Resource::ArchiveJson(name),
            Some(ResourceKind::Program) => Resource::Program(name),
            Some(ResourceKind::Indicator) => Resource::Indicator(IndicatorKey::Name(name)),
            None => {
                let context = RequestContext::new(
                    ResourceKind::Archive,
                    ResourceTarget::Name(name.clone()),
                    date,
                );
                self.ensure_catalog(context).await?;
                if self.catalog.contains_name(&name) {
                    Resource::Archive(name)
                } else {
                    Resource::Indicator(IndicatorKey::Name(name))
                }
            }
        };
        debug!(resource = %resource, "Classified");
        Ok(resource)
    }

    /// Resolve a classified resource to a date-bound reference without fetching it
    ///
    /// # Errors
    /// [`ClientError::NotAvailable`] for archives missing after one refresh,
    /// [`ClientError::NotFound`] for unknown indicator names, and transport or
    /// listing failures on the way.
    pub async fn resolve(
        &mut self,
        resource: &Resource,
        date: &DateTime<FixedOffset>,
    ) -> ClientResult<ResourceReference> {
        let reference = match resource {
            Resource::Indicator(key) => {
                let id = match key {
                    IndicatorKey::Id(id) => *id,
                    IndicatorKey::Name(name) => self.lookup_id(name).await?,
                };
                ResourceReference {
                    kind: ResourceKind::Indicator,
                    target: ResourceTarget::Id(id),
                    location: self.endpoints.indicator(id),
                    date: *date,
                    format: None,
                }
            }
            Resource::ArchiveJson(name) => ResourceReference {
                kind: ResourceKind::ArchiveJson,
                target: ResourceTarget::Name(name.clone()),
                location: self.endpoints.archive_json(name),
                date: *date,
                format: None,
            },
            Resource::Program(name) => ResourceReference {
                kind: ResourceKind::Program,
                target: ResourceTarget::Name(name.clone()),
                location: self.endpoints.program(name),
                date: *date,
                format: None,
            },
            Resource::Archive(name) => self.resolve_archive(name, date).await?,
        };
        debug!(location = %reference.location, "Resolved {resource}");
        Ok(reference)
    }

    /// Fetch and decode a classified resource
    ///
    /// # Errors
    /// See [`ClientError`].
    pub async fn download(
        &mut self,
        resource: Resource,
        date: &DateTime<FixedOffset>,
    ) -> ClientResult<DecodedResult> {
        let context = resource.context(date);
        let reference = self.resolve(&resource, date).await?;
        let payload = self.fetch(&reference, &context).await?;

        let result = match &resource {
            Resource::Indicator(_) => {
                decode::json::decode_indicator(&payload.body, self.timezone.as_ref())
                    .map(DecodedResult::Table)
            }
            Resource::ArchiveJson(_) => decode::decode_nested(&payload.body),
            Resource::Archive(name) => {
                decode::decode_archive(&payload.body, reference.format, &self.layout_of(name))
            }
            Resource::Program(name) => program::decode_program(
                name,
                &payload.body,
                self.timezone.as_ref(),
                ProgramOptions::default(),
            )
            .map(DecodedResult::Table),
        }
        .map_err(|source| ClientError::Format { context, source })?;

        info!(
            kind = %resource.kind(),
            resource = %resource.target(),
            date = %date.to_rfc3339(),
            shape = result.shape(),
            "Downloaded"
        );
        Ok(result)
    }

    /// Fetch a program report as one table
    ///
    /// # Errors
    /// See [`ClientError`].
    pub async fn get_program(&self, name: &str, date: &DateTime<FixedOffset>) -> ClientResult<Table> {
        self.get_program_with(name, date, ProgramOptions::default())
            .await
    }

    /// Fetch a program report with post-processing options
    ///
    /// # Errors
    /// See [`ClientError`].
    pub async fn get_program_with(
        &self,
        name: &str,
        date: &DateTime<FixedOffset>,
        options: ProgramOptions,
    ) -> ClientResult<Table> {
        let resource = Resource::Program(name.to_string());
        let context = resource.context(date);
        let reference = ResourceReference {
            kind: ResourceKind::Program,
            target: resource.target(),
            location: self.endpoints.program(name),
            date: *date,
            format: None,
        };
        let payload = self.fetch(&reference, &context).await?;

        let table = program::decode_program(name, &payload.body, self.timezone.as_ref(), options)
            .map_err(|source| ClientError::Format { context, source })?;
        info!(
            program = name,
            date = %date.to_rfc3339(),
            rows = table.len(),
            columns = table.columns().len(),
            aggregate_daily = options.aggregate_daily,
            "Downloaded program"
        );
        Ok(table)
    }

    async fn resolve_archive(
        &mut self,
        name: &str,
        date: &DateTime<FixedOffset>,
    ) -> ClientResult<ResourceReference> {
        let context =
            RequestContext::new(ResourceKind::Archive, ResourceTarget::Name(name.to_string()), date);
        self.ensure_catalog(context.clone()).await?;

        // listing days are local days, whatever offset the caller wrote
        let local = self.timezone.to_local(date);
        let entry = match self.catalog.find(name, &local) {
            Some(entry) => entry,
            None => {
                info!(name, date = %local.to_rfc3339(), "Archive not in listing, refreshing");
                self.catalog
                    .refresh(Some(&local))
                    .await
                    .map_err(|e| ClientError::from_catalog(context.clone(), e))?;
                self.catalog
                    .find(name, &local)
                    .ok_or(ClientError::NotAvailable { context })?
            }
        };

        let declared = self.known.get(name).and_then(|r| r.format);
        Ok(ResourceReference {
            kind: ResourceKind::Archive,
            target: ResourceTarget::Name(name.to_string()),
            location: entry.location,
            date: *date,
            format: declared.or(entry.format),
        })
    }

    async fn list(
        &self,
        kind: ResourceKind,
        location: String,
        key: Option<&str>,
    ) -> ClientResult<Vec<ResourceSummary>> {
        let context = RequestContext::undated(kind, ResourceTarget::Name(location.clone()));
        let payload = self
            .transport
            .get(&location, &[])
            .await
            .map_err(|source| ClientError::Transport {
                context: context.clone(),
                source,
            })?;
        let entries = lookup::parse_summaries(&payload.body, key)
            .map_err(|e| ClientError::from_lookup(context, e))?;
        debug!(%kind, entries = entries.len(), "Listed");
        Ok(entries)
    }

    async fn nested(
        &mut self,
        name: &str,
        date: &DateTime<FixedOffset>,
    ) -> ClientResult<Map<String, Value>> {
        let resource = Resource::ArchiveJson(name.to_string());
        let context = resource.context(date);
        match self.download(resource, date).await? {
            DecodedResult::Nested(map) => Ok(map),
            other => Err(ClientError::Format {
                context,
                source: FormatError::Json(format!("expected a JSON object, got {}", other.shape())),
            }),
        }
    }

    async fn ensure_catalog(&mut self, context: RequestContext) -> ClientResult<()> {
        if self.catalog.is_loaded() {
            return Ok(());
        }
        debug!("Loading archive listing");
        self.catalog
            .refresh(None)
            .await
            .map_err(|e| ClientError::from_catalog(context, e))
    }

    fn layout_of(&self, name: &str) -> ArchiveLayout {
        self.known
            .get(name)
            .map(KnownResource::layout)
            .unwrap_or_default()
    }

    async fn fetch(
        &self,
        reference: &ResourceReference,
        context: &RequestContext,
    ) -> ClientResult<Payload> {
        let params = [(self.endpoints.date_param, reference.date.to_rfc3339())];
        self.transport
            .get(&reference.location, &params)
            .await
            .map_err(|source| ClientError::Transport {
                context: context.clone(),
                source,
            })
    }
}
