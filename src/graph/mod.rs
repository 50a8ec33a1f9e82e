//! Graph manager: the only component that mutates a [`KnowledgeGraph`].
//!
//! Every operation is one load → mutate → save cycle against storage; the
//! in-memory graph is discarded afterwards. The manager holds no namespace
//! state; the namespace is threaded through every call, so concurrent
//! namespaces never interfere.
//!
//! Within one process, overlapping operations on the same namespace are only
//! serialized by the OS advisory lock between the load and the save; callers
//! embedding this as a library with concurrent writers on one namespace must
//! add their own per-namespace serialization, or the last writer wins.

pub mod search;

use std::collections::{HashMap, HashSet};

use crate::config::MemoryConfig;
use crate::models::{
    Entity, KnowledgeGraph, Namespace, ObservationDeletion, ObservationInput, ObservationResult,
    Relation, SearchMatch,
};
use crate::storage::GraphStore;
use crate::{Error, Result};

/// Orchestrates load → mutate → save cycles and enforces every graph
/// invariant.
pub struct GraphManager {
    store: GraphStore,
    fuzzy_search: bool,
}

impl GraphManager {
    /// Creates a manager backed by filesystem storage.
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        let fuzzy_search = config.fuzzy_search;
        Self {
            store: GraphStore::new(config),
            fuzzy_search,
        }
    }

    /// Creates a manager over a caller-constructed store.
    #[must_use]
    pub const fn with_store(store: GraphStore, fuzzy_search: bool) -> Self {
        Self {
            store,
            fuzzy_search,
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Creates new entities, ignoring duplicates.
    ///
    /// Candidates with invalid names are skipped with a warning; candidates
    /// whose name already exists (in storage or earlier in the same batch)
    /// are silently discarded. Duplicate observations within one candidate
    /// are suppressed. Persists only when at least one entity was added.
    ///
    /// Returns exactly the entities that were newly created.
    pub fn create_entities(
        &self,
        namespace: &Namespace,
        entities: Vec<Entity>,
    ) -> Result<Vec<Entity>> {
        let mut graph = self.store.load(namespace)?;

        let mut existing: HashSet<String> =
            graph.entities.iter().map(|e| e.name.clone()).collect();

        let mut created = Vec::new();
        for mut entity in entities {
            if let Err(e) = validate_entity_name(&entity.name) {
                tracing::warn!(entity = %entity.name, error = %e, "invalid entity name, skipping");
                continue;
            }
            if existing.contains(&entity.name) {
                continue;
            }

            entity.observations = dedup_preserving_order(entity.observations);
            existing.insert(entity.name.clone());
            graph.entities.push(entity.clone());
            created.push(entity);
        }

        if !created.is_empty() {
            self.store.save(namespace, &graph)?;
            tracing::info!(namespace = %namespace, count = created.len(), "created new entities");
        }

        Ok(created)
    }

    /// Creates new relations, skipping duplicates and dangling endpoints.
    ///
    /// A relation whose `from` or `to` does not name an existing entity is
    /// skipped with a warning; a relation whose `(from, to, relation_type)`
    /// triple already exists is silently discarded. Persists only when at
    /// least one relation was added.
    ///
    /// Returns exactly the relations that were newly created.
    pub fn create_relations(
        &self,
        namespace: &Namespace,
        relations: Vec<Relation>,
    ) -> Result<Vec<Relation>> {
        let mut graph = self.store.load(namespace)?;

        let entity_names: HashSet<&str> =
            graph.entities.iter().map(|e| e.name.as_str()).collect();
        let mut existing: HashSet<String> = graph.relations.iter().map(Relation::key).collect();

        let mut created = Vec::new();
        for relation in relations {
            if !entity_names.contains(relation.from.as_str()) {
                tracing::warn!(entity = %relation.from, "source entity does not exist, skipping relation");
                continue;
            }
            if !entity_names.contains(relation.to.as_str()) {
                tracing::warn!(entity = %relation.to, "target entity does not exist, skipping relation");
                continue;
            }

            let key = relation.key();
            if existing.contains(&key) {
                continue;
            }
            existing.insert(key);
            created.push(relation);
        }

        if !created.is_empty() {
            graph.relations.extend(created.iter().cloned());
            self.store.save(namespace, &graph)?;
            tracing::info!(namespace = %namespace, count = created.len(), "created new relations");
        }

        Ok(created)
    }

    /// Adds observations to existing entities.
    ///
    /// Unlike relation creation, a missing target entity fails the whole
    /// call with no effect, since nothing has been persisted at that point.
    /// Empty
    /// strings and observations already present on the entity (or added
    /// earlier in the batch) are discarded. Persists only when at least one
    /// observation was added anywhere.
    ///
    /// Returns, per input entity, exactly the observations newly appended.
    pub fn add_observations(
        &self,
        namespace: &Namespace,
        inputs: Vec<ObservationInput>,
    ) -> Result<Vec<ObservationResult>> {
        let mut graph = self.store.load(namespace)?;

        let index_by_name: HashMap<String, usize> = graph
            .entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();

        let mut results = Vec::with_capacity(inputs.len());
        let mut modified = false;

        for input in inputs {
            let Some(&idx) = index_by_name.get(&input.entity_name) else {
                return Err(Error::EntityNotFound {
                    name: input.entity_name,
                });
            };
            let entity = &mut graph.entities[idx];

            let mut added = Vec::new();
            for content in input.contents {
                if content.is_empty() {
                    continue;
                }
                if entity.observations.contains(&content) {
                    continue;
                }
                entity.observations.push(content.clone());
                added.push(content);
            }

            if !added.is_empty() {
                modified = true;
            }
            results.push(ObservationResult {
                entity_name: input.entity_name,
                added_observations: added,
            });
        }

        if modified {
            self.store.save(namespace, &graph)?;
            tracing::info!(namespace = %namespace, entities = results.len(), "added observations to entities");
        }

        Ok(results)
    }

    /// Deletes entities and cascades to every relation referencing them.
    ///
    /// Names that match nothing are no-ops, not errors. Persists once when
    /// anything was removed.
    ///
    /// Returns the number of entities and relations removed.
    pub fn delete_entities(
        &self,
        namespace: &Namespace,
        names: &[String],
    ) -> Result<(usize, usize)> {
        let mut graph = self.store.load(namespace)?;

        let to_delete: HashSet<&str> = names.iter().map(String::as_str).collect();

        let entities_before = graph.entities.len();
        graph
            .entities
            .retain(|e| !to_delete.contains(e.name.as_str()));
        let entities_deleted = entities_before - graph.entities.len();

        let relations_before = graph.relations.len();
        graph.relations.retain(|r| {
            !to_delete.contains(r.from.as_str()) && !to_delete.contains(r.to.as_str())
        });
        let relations_deleted = relations_before - graph.relations.len();

        if entities_deleted > 0 || relations_deleted > 0 {
            self.store.save(namespace, &graph)?;
            tracing::info!(
                namespace = %namespace,
                entities = entities_deleted,
                relations = relations_deleted,
                "deleted entities and cascaded relations"
            );
        }

        Ok((entities_deleted, relations_deleted))
    }

    /// Deletes specific observations from entities.
    ///
    /// The permissive counterpart of [`Self::add_observations`]: deletions
    /// naming a non-existent entity are silently skipped. Remaining
    /// observations keep their order. Persists once when anything was
    /// removed.
    ///
    /// Returns the number of observations removed.
    pub fn delete_observations(
        &self,
        namespace: &Namespace,
        deletions: Vec<ObservationDeletion>,
    ) -> Result<usize> {
        let mut graph = self.store.load(namespace)?;

        let mut removed = 0;
        for deletion in deletions {
            let Some(entity) = graph
                .entities
                .iter_mut()
                .find(|e| e.name == deletion.entity_name)
            else {
                continue;
            };

            let to_delete: HashSet<&str> =
                deletion.observations.iter().map(String::as_str).collect();
            let before = entity.observations.len();
            entity
                .observations
                .retain(|obs| !to_delete.contains(obs.as_str()));
            removed += before - entity.observations.len();
        }

        if removed > 0 {
            self.store.save(namespace, &graph)?;
            tracing::info!(namespace = %namespace, count = removed, "deleted observations from entities");
        }

        Ok(removed)
    }

    /// Deletes relations matching the exact `(from, to, relation_type)`
    /// triple. Non-matching entries are no-ops.
    ///
    /// Returns the number of relations removed.
    pub fn delete_relations(
        &self,
        namespace: &Namespace,
        relations: &[Relation],
    ) -> Result<usize> {
        let mut graph = self.store.load(namespace)?;

        let to_delete: HashSet<String> = relations.iter().map(Relation::key).collect();

        let before = graph.relations.len();
        graph.relations.retain(|r| !to_delete.contains(&r.key()));
        let removed = before - graph.relations.len();

        if removed > 0 {
            self.store.save(namespace, &graph)?;
            tracing::info!(namespace = %namespace, count = removed, "deleted relations");
        }

        Ok(removed)
    }

    /// Returns the full current graph, no filtering.
    pub fn read_graph(&self, namespace: &Namespace) -> Result<KnowledgeGraph> {
        self.store.load(namespace)
    }

    /// Searches entities by query string.
    ///
    /// An empty query returns the full graph with no ranked result list.
    pub fn search_nodes(
        &self,
        namespace: &Namespace,
        query: &str,
    ) -> Result<(KnowledgeGraph, Vec<SearchMatch>)> {
        let graph = self.store.load(namespace)?;
        if query.is_empty() {
            return Ok((graph, Vec::new()));
        }
        Ok(search::search(&graph, query, self.fuzzy_search))
    }

    /// Returns the requested entities plus only the relations whose both
    /// endpoints are in the returned set.
    pub fn open_nodes(&self, namespace: &Namespace, names: &[String]) -> Result<KnowledgeGraph> {
        let graph = self.store.load(namespace)?;

        let requested: HashSet<&str> = names.iter().map(String::as_str).collect();
        let entities: Vec<Entity> = graph
            .entities
            .into_iter()
            .filter(|e| requested.contains(e.name.as_str()))
            .collect();

        let returned: HashSet<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        let relations: Vec<Relation> = graph
            .relations
            .into_iter()
            .filter(|r| returned.contains(r.from.as_str()) && returned.contains(r.to.as_str()))
            .collect();

        Ok(KnowledgeGraph {
            entities,
            relations,
        })
    }
}

/// Validates an entity name: non-empty, no surrounding whitespace, no
/// newlines.
fn validate_entity_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("entity name cannot be empty".to_string()));
    }
    if name.trim() != name {
        return Err(Error::InvalidInput(
            "entity name cannot have leading or trailing whitespace".to_string(),
        ));
    }
    if name.contains('\n') || name.contains('\r') {
        return Err(Error::InvalidInput(
            "entity name cannot contain newline characters".to_string(),
        ));
    }
    Ok(())
}

/// Removes duplicate strings, keeping first occurrences in order.
fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
