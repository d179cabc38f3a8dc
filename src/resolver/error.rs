//! Client error types

use chrono::{DateTime, FixedOffset};
use std::fmt;

use crate::catalog::CatalogError;
use crate::decode::FormatError;
use crate::lookup::LookupError;
use crate::transport::TransportError;
use crate::{ResourceKind, ResourceTarget};

/// What was being fetched when an error happened
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    /// Resource kind
    pub kind: ResourceKind,
    /// Name or id requested
    pub resource: ResourceTarget,
    /// Target date, when the request has one
    pub date: Option<DateTime<FixedOffset>>,
}

impl RequestContext {
    /// Context for a dated request
    pub fn new(kind: ResourceKind, resource: ResourceTarget, date: &DateTime<FixedOffset>) -> Self {
        Self {
            kind,
            resource,
            date: Some(*date),
        }
    }

    /// Context for a request without date
    pub fn undated(kind: ResourceKind, resource: ResourceTarget) -> Self {
        Self {
            kind,
            resource,
            date: None,
        }
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.resource)?;
        if let Some(date) = &self.date {
            write!(f, " for {}", date.to_rfc3339())?;
        }
        Ok(())
    }
}

/// Errors returned by [`crate::EsiosClient`]
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failed (after the transport's own retries)
    #[error("failed to fetch {context}: {source}")]
    Transport {
        /// Request being served
        context: RequestContext,
        /// Underlying transport error
        source: TransportError,
    },

    /// Archive absent from the listing even after one refresh
    ///
    /// Covers both "not yet published" and "never exists".
    #[error("{context} is not available")]
    NotAvailable {
        /// Request being served
        context: RequestContext,
    },

    /// Payload did not have the expected structure
    #[error("failed to decode {context}: {source}")]
    Format {
        /// Request being served
        context: RequestContext,
        /// Underlying decoding error
        source: FormatError,
    },

    /// Name lookup found nothing
    #[error("no resource named '{name}'")]
    NotFound {
        /// Name that was looked up
        name: String,
    },
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Attach context to a catalog failure
    pub(crate) fn from_catalog(context: RequestContext, error: CatalogError) -> Self {
        match error {
            CatalogError::Transport(source) => ClientError::Transport { context, source },
            CatalogError::Listing(source) => ClientError::Format { context, source },
        }
    }

    /// Attach context to a lookup failure
    pub(crate) fn from_lookup(context: RequestContext, error: LookupError) -> Self {
        match error {
            LookupError::NotFound(name) => ClientError::NotFound { name },
            LookupError::Transport(source) => ClientError::Transport { context, source },
            LookupError::Listing(message) => ClientError::Format {
                context,
                source: FormatError::Json(message),
            },
        }
    }

    /// Request context, when the error has one
    pub fn context(&self) -> Option<&RequestContext> {
        match self {
            ClientError::Transport { context, .. }
            | ClientError::NotAvailable { context }
            | ClientError::Format { context, .. } => Some(context),
            ClientError::NotFound { .. } => None,
        }
    }
}
