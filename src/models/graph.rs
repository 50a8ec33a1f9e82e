//! Knowledge graph types and on-disk record envelopes.
//!
//! The graph is an ordered list of entities plus an ordered list of directed
//! relations, scoped to one namespace. On disk each entity and relation
//! becomes one self-describing JSON record (one per line) carrying a `type`
//! discriminator, so a namespace file can be parsed line by line and
//! individual bad lines skipped without losing the rest.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Record discriminator for entity lines.
pub const RECORD_TYPE_ENTITY: &str = "entity";

/// Record discriminator for relation lines.
pub const RECORD_TYPE_RELATION: &str = "relation";

/// Maximum length of a namespace name.
const NAMESPACE_MAX_LEN: usize = 64;

/// A named node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Unique name within a namespace.
    pub name: String,
    /// Free-text category label.
    pub entity_type: String,
    /// Ordered list of free-text facts about the entity.
    #[serde(default)]
    pub observations: Vec<String>,
}

impl Entity {
    /// Creates an entity with no observations.
    #[must_use]
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            observations: Vec::new(),
        }
    }

    /// Sets the entity's observations.
    #[must_use]
    pub fn with_observations<I, S>(mut self, observations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.observations = observations.into_iter().map(Into::into).collect();
        self
    }
}

/// A directed, typed edge between two entities.
///
/// Identity for de-duplication is the ordered `(from, to, relation_type)`
/// triple; no two relations with an identical triple coexist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    /// Name of the source entity.
    pub from: String,
    /// Name of the target entity.
    pub to: String,
    /// Free-text edge label.
    pub relation_type: String,
}

impl Relation {
    /// Creates a relation between two entity names.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
        }
    }

    /// Returns the de-duplication key for this relation.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}->{}:{}", self.from, self.to, self.relation_type)
    }
}

/// The complete graph for one namespace: the unit of load and save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    /// All entities, in insertion order.
    pub entities: Vec<Entity>,
    /// All relations, in insertion order.
    pub relations: Vec<Relation>,
}

impl KnowledgeGraph {
    /// Creates an empty graph.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entities: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Returns true when the graph holds no entities and no relations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}

/// A validated namespace name.
///
/// Namespaces partition storage into independent graphs and become directory
/// components on disk, so they must be safe filenames: non-empty, at most 64
/// characters, only ASCII alphanumerics, dashes, and underscores. This
/// rejects path traversal (`..`, separators) before any storage access.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// The namespace used when none is specified.
    pub const DEFAULT: &'static str = "default";

    /// Creates a namespace after validating the name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for empty, overlong, or unsafe names.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidInput("namespace cannot be empty".to_string()));
        }
        if name.len() > NAMESPACE_MAX_LEN {
            return Err(Error::InvalidInput(format!(
                "namespace exceeds {NAMESPACE_MAX_LEN} characters"
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidInput(format!(
                "namespace contains invalid characters: {name}"
            )));
        }
        Ok(Self(name))
    }

    /// Returns the namespace as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An entity as stored in the JSON-Lines format.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntity {
    /// Record discriminator, always [`RECORD_TYPE_ENTITY`].
    #[serde(rename = "type")]
    pub record_type: String,
    /// Entity name.
    pub name: String,
    /// Entity type label.
    pub entity_type: String,
    /// Entity observations.
    #[serde(default)]
    pub observations: Vec<String>,
}

impl From<&Entity> for StoredEntity {
    fn from(entity: &Entity) -> Self {
        Self {
            record_type: RECORD_TYPE_ENTITY.to_string(),
            name: entity.name.clone(),
            entity_type: entity.entity_type.clone(),
            observations: entity.observations.clone(),
        }
    }
}

impl From<StoredEntity> for Entity {
    fn from(stored: StoredEntity) -> Self {
        Self {
            name: stored.name,
            entity_type: stored.entity_type,
            observations: stored.observations,
        }
    }
}

/// A relation as stored in the JSON-Lines format.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRelation {
    /// Record discriminator, always [`RECORD_TYPE_RELATION`].
    #[serde(rename = "type")]
    pub record_type: String,
    /// Source entity name.
    pub from: String,
    /// Target entity name.
    pub to: String,
    /// Edge label.
    pub relation_type: String,
}

impl From<&Relation> for StoredRelation {
    fn from(relation: &Relation) -> Self {
        Self {
            record_type: RECORD_TYPE_RELATION.to_string(),
            from: relation.from.clone(),
            to: relation.to.clone(),
            relation_type: relation.relation_type.clone(),
        }
    }
}

impl From<StoredRelation> for Relation {
    fn from(stored: StoredRelation) -> Self {
        Self {
            from: stored.from,
            to: stored.to,
            relation_type: stored.relation_type,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_entity_wire_format() {
        let entity = Entity::new("backend_api", "system").with_observations(["REST API"]);
        let json = serde_json::to_string(&StoredEntity::from(&entity)).unwrap();
        assert_eq!(
            json,
            r#"{"type":"entity","name":"backend_api","entityType":"system","observations":["REST API"]}"#
        );
    }

    #[test]
    fn test_relation_wire_format() {
        let relation = Relation::new("alice", "backend_api", "maintains");
        let json = serde_json::to_string(&StoredRelation::from(&relation)).unwrap();
        assert_eq!(
            json,
            r#"{"type":"relation","from":"alice","to":"backend_api","relationType":"maintains"}"#
        );
    }

    #[test]
    fn test_entity_missing_observations_defaults_to_empty() {
        let stored: StoredEntity =
            serde_json::from_str(r#"{"type":"entity","name":"a","entityType":"t"}"#).unwrap();
        let entity = Entity::from(stored);
        assert!(entity.observations.is_empty());
    }

    #[test]
    fn test_relation_key() {
        let relation = Relation::new("a", "b", "uses");
        assert_eq!(relation.key(), "a->b:uses");
    }

    #[test]
    fn test_namespace_validation() {
        assert!(Namespace::new("default").is_ok());
        assert!(Namespace::new("project_alpha-2").is_ok());

        assert!(Namespace::new("").is_err());
        assert!(Namespace::new("../escape").is_err());
        assert!(Namespace::new("a/b").is_err());
        assert!(Namespace::new("a\\b").is_err());
        assert!(Namespace::new("with space").is_err());
        assert!(Namespace::new("x".repeat(65)).is_err());
    }

    #[test]
    fn test_namespace_default() {
        assert_eq!(Namespace::default().as_str(), "default");
    }
}
