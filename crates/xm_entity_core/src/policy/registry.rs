//! Entity-type definitions as a link policy source.
//!
//! # Responsibility
//! - Parse entity-type definitions (JSON) into a lookup table of link delete
//!   actions.
//! - Answer [`LinkPolicySource`] queries from that table.
//!
//! # Invariants
//! - Type-level link entries override top-level link defaults.
//! - Type keys and link keys are unique within their scope.

use super::{DeleteAction, LinkPolicySource, PolicyError};
use log::info;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Link entry inside a definition document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkTypeDefinition {
    pub key: String,
    #[serde(default)]
    pub on_delete: DeleteAction,
}

/// Entity type entry inside a definition document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeDefinition {
    pub key: String,
    #[serde(default)]
    pub links: Vec<LinkTypeDefinition>,
}

/// Root of a definition document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeDocument {
    /// Link defaults applied regardless of source type.
    #[serde(default)]
    pub links: Vec<LinkTypeDefinition>,
    #[serde(default)]
    pub types: Vec<EntityTypeDefinition>,
}

#[derive(Debug)]
pub enum RegistryError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    BlankKey,
    DuplicateType(String),
    DuplicateLink { scope: String, key: String },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read entity types `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid entity type document: {err}"),
            Self::BlankKey => write!(f, "entity type and link keys must not be blank"),
            Self::DuplicateType(key) => write!(f, "duplicate entity type `{key}`"),
            Self::DuplicateLink { scope, key } => {
                write!(f, "duplicate link `{key}` in `{scope}`")
            }
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

const DEFAULT_SCOPE: &str = "<defaults>";

/// In-memory link policy table built from entity-type definitions.
#[derive(Debug, Clone, Default)]
pub struct EntityTypeRegistry {
    defaults: HashMap<String, DeleteAction>,
    by_type: HashMap<String, HashMap<String, DeleteAction>>,
}

impl EntityTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a parsed document.
    pub fn from_document(document: EntityTypeDocument) -> Result<Self, RegistryError> {
        let defaults = collect_links(DEFAULT_SCOPE, document.links)?;
        let mut by_type = HashMap::new();
        for entity_type in document.types {
            if entity_type.key.trim().is_empty() {
                return Err(RegistryError::BlankKey);
            }
            let links = collect_links(&entity_type.key, entity_type.links)?;
            if by_type.insert(entity_type.key.clone(), links).is_some() {
                return Err(RegistryError::DuplicateType(entity_type.key));
            }
        }
        Ok(Self { defaults, by_type })
    }

    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let document: EntityTypeDocument =
            serde_json::from_str(json).map_err(RegistryError::Parse)?;
        Self::from_document(document)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_json_str(&raw)?;
        info!(
            "event=entity_types_load module=policy status=ok types={} default_links={}",
            registry.by_type.len(),
            registry.defaults.len()
        );
        Ok(registry)
    }

    /// Sets the action for a link type regardless of source type.
    pub fn with_default(mut self, link_type_key: &str, action: DeleteAction) -> Self {
        self.defaults.insert(link_type_key.to_string(), action);
        self
    }

    /// Sets the action for a link type leaving entities of `type_key`.
    pub fn with_type_link(
        mut self,
        type_key: &str,
        link_type_key: &str,
        action: DeleteAction,
    ) -> Self {
        self.by_type
            .entry(type_key.to_string())
            .or_default()
            .insert(link_type_key.to_string(), action);
        self
    }

    pub fn lookup(&self, source_type_key: &str, link_type_key: &str) -> Option<DeleteAction> {
        self.by_type
            .get(source_type_key)
            .and_then(|links| links.get(link_type_key))
            .or_else(|| self.defaults.get(link_type_key))
            .copied()
    }
}

impl LinkPolicySource for EntityTypeRegistry {
    fn get_policy(
        &self,
        source_type_key: &str,
        link_type_key: &str,
    ) -> Result<Option<DeleteAction>, PolicyError> {
        Ok(self.lookup(source_type_key, link_type_key))
    }
}

fn collect_links(
    scope: &str,
    links: Vec<LinkTypeDefinition>,
) -> Result<HashMap<String, DeleteAction>, RegistryError> {
    let mut collected = HashMap::with_capacity(links.len());
    for link in links {
        if link.key.trim().is_empty() {
            return Err(RegistryError::BlankKey);
        }
        if collected.insert(link.key.clone(), link.on_delete).is_some() {
            return Err(RegistryError::DuplicateLink {
                scope: scope.to_string(),
                key: link.key,
            });
        }
    }
    Ok(collected)
}
