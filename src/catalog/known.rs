//! Registry of known resources
//!
//! Names whose kind cannot be told from the listing alone (JSON archives, program
//! reports) or whose archives need a specific layout (skipped title rows, an inner
//! file prefix) are declared in an embedded JSON registry. Callers may register
//! more at runtime.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::decode::{ArchiveLayout, FileFormat};
use crate::ResourceKind;

/// Embedded registry data
const REGISTRY_JSON: &str = include_str!("known_resources.json");

/// Global registry instance (loaded once)
static REGISTRY: Lazy<Result<KnownResources, KnownResourcesError>> =
    Lazy::new(|| KnownResources::from_json(REGISTRY_JSON));

/// Registry errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum KnownResourcesError {
    /// Registry JSON is malformed
    #[error("registry parse error: {0}")]
    ParseError(String),
}

/// One registered resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownResource {
    /// Exact resource name
    pub name: String,
    /// Resource kind
    pub kind: ResourceKind,
    /// Declared archive layout, overriding the listing's tag
    #[serde(default)]
    pub format: Option<FileFormat>,
    /// Title rows above each sheet's header
    #[serde(default)]
    pub skip_rows: usize,
    /// Required inner file name prefix
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Header row of the leading index sheet, for workbooks that have one
    #[serde(default)]
    pub index_header_row: Option<usize>,
    /// Human readable description
    #[serde(default)]
    pub description: String,
}

impl KnownResource {
    /// Resource of `kind` with no special layout
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            format: None,
            skip_rows: 0,
            file_prefix: None,
            index_header_row: None,
            description: String::new(),
        }
    }

    /// Archive layout used when decoding this resource
    pub fn layout(&self) -> ArchiveLayout {
        ArchiveLayout {
            skip_rows: self.skip_rows,
            file_prefix: self.file_prefix.clone(),
            index_header_row: self.index_header_row,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRegistry {
    #[allow(dead_code)]
    schema_version: String,
    resources: Vec<KnownResource>,
}

/// Name-keyed registry of known resources
#[derive(Debug, Clone, Default)]
pub struct KnownResources {
    resources: HashMap<String, KnownResource>,
}

impl KnownResources {
    /// Shared embedded registry, parsed once
    pub fn load() -> Result<&'static Self, &'static KnownResourcesError> {
        REGISTRY.as_ref()
    }

    /// Owned copy of the embedded registry, for callers that register extra names
    pub fn load_embedded() -> Result<Self, KnownResourcesError> {
        Self::load().cloned().map_err(Clone::clone)
    }

    fn from_json(json: &str) -> Result<Self, KnownResourcesError> {
        let raw: RawRegistry = serde_json::from_str(json).map_err(|e| {
            KnownResourcesError::ParseError(format!("Failed to parse registry: {e}"))
        })?;

        let mut registry = Self::default();
        for resource in raw.resources {
            registry.register(resource);
        }
        Ok(registry)
    }

    /// Registered resource by exact name
    pub fn get(&self, name: &str) -> Option<&KnownResource> {
        self.resources.get(name)
    }

    /// Kind of a registered resource
    pub fn kind_of(&self, name: &str) -> Option<ResourceKind> {
        self.get(name).map(|r| r.kind)
    }

    /// Add or replace a resource; returns the previous definition
    pub fn register(&mut self, resource: KnownResource) -> Option<KnownResource> {
        self.resources.insert(resource.name.clone(), resource)
    }

    /// All resources, sorted by name
    pub fn entries(&self) -> Vec<&KnownResource> {
        let mut entries: Vec<_> = self.resources.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}
