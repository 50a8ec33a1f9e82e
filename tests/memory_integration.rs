//! Memory subsystem integration tests.
//!
//! Exercises the graph manager and the tool façade end-to-end against
//! tempdir-backed storage: invariants, the intentional strict-vs-permissive
//! observation policies, search ranking, encryption at rest, and
//! partial-corruption tolerance.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use engram::config::MemoryConfig;
use engram::graph::GraphManager;
use engram::models::{
    Entity, MatchKind, Namespace, ObservationDeletion, ObservationInput, Relation,
};
use engram::storage::{FsLockManager, LockManager};
use engram::tools::ToolRegistry;
use engram::Error;
use serde_json::json;
use tempfile::TempDir;

/// Helper to create a manager over a temp directory.
fn create_manager(dir: &TempDir) -> GraphManager {
    GraphManager::new(MemoryConfig::new().with_base_path(dir.path()))
}

/// Helper seeding the alice/backend_api team used across tests.
fn seed_team(manager: &GraphManager, ns: &Namespace) {
    manager
        .create_entities(
            ns,
            vec![
                Entity::new("alice", "person"),
                Entity::new("backend_api", "system").with_observations(["REST API"]),
            ],
        )
        .unwrap();
    manager
        .create_relations(ns, vec![Relation::new("alice", "backend_api", "maintains")])
        .unwrap();
}

// ============================================================================
// Entity and Relation Invariants
// ============================================================================

#[test]
fn test_duplicate_entity_name_not_recreated() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();

    let first = manager
        .create_entities(&ns, vec![Entity::new("alice", "person")])
        .unwrap();
    assert_eq!(first.len(), 1);

    let second = manager
        .create_entities(&ns, vec![Entity::new("alice", "human")])
        .unwrap();
    assert!(second.is_empty());

    let graph = manager.read_graph(&ns).unwrap();
    assert_eq!(graph.entities.len(), 1);
    // The original entity is untouched.
    assert_eq!(graph.entities[0].entity_type, "person");
}

#[test]
fn test_duplicate_name_within_one_batch_stored_once() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();

    let created = manager
        .create_entities(
            &ns,
            vec![
                Entity::new("alice", "person"),
                Entity::new("alice", "person"),
            ],
        )
        .unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(manager.read_graph(&ns).unwrap().entities.len(), 1);
}

#[test]
fn test_invalid_entity_names_skipped_not_fatal() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();

    let created = manager
        .create_entities(
            &ns,
            vec![
                Entity::new("", "person"),
                Entity::new(" padded ", "person"),
                Entity::new("two\nlines", "person"),
                Entity::new("valid", "person"),
            ],
        )
        .unwrap();

    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name, "valid");
}

#[test]
fn test_duplicate_relation_triple_stored_once() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();
    seed_team(&manager, &ns);

    let again = manager
        .create_relations(&ns, vec![Relation::new("alice", "backend_api", "maintains")])
        .unwrap();
    assert!(again.is_empty());

    let graph = manager.read_graph(&ns).unwrap();
    assert_eq!(graph.relations.len(), 1);
}

#[test]
fn test_relation_with_missing_endpoint_skipped() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();

    manager
        .create_entities(&ns, vec![Entity::new("alice", "person")])
        .unwrap();

    let created = manager
        .create_relations(
            &ns,
            vec![
                Relation::new("alice", "ghost", "haunts"),
                Relation::new("ghost", "alice", "haunts"),
            ],
        )
        .unwrap();

    assert!(created.is_empty());
    assert!(manager.read_graph(&ns).unwrap().relations.is_empty());
}

#[test]
fn test_delete_entities_cascades_relations() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();
    seed_team(&manager, &ns);

    let (entities, relations) = manager
        .delete_entities(&ns, &["alice".to_string()])
        .unwrap();
    assert_eq!(entities, 1);
    assert_eq!(relations, 1);

    let graph = manager.read_graph(&ns).unwrap();
    assert_eq!(graph.entities.len(), 1);
    assert!(
        graph
            .relations
            .iter()
            .all(|r| r.from != "alice" && r.to != "alice")
    );
}

#[test]
fn test_delete_unknown_names_is_noop() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();
    seed_team(&manager, &ns);

    let (entities, relations) = manager
        .delete_entities(&ns, &["nobody".to_string()])
        .unwrap();
    assert_eq!(entities, 0);
    assert_eq!(relations, 0);
    assert_eq!(manager.read_graph(&ns).unwrap().entities.len(), 2);
}

// ============================================================================
// Observation Policies (strict add vs permissive delete)
// ============================================================================

#[test]
fn test_add_observations_returns_only_new_strings() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();
    seed_team(&manager, &ns);

    let results = manager
        .add_observations(
            &ns,
            vec![ObservationInput {
                entity_name: "backend_api".to_string(),
                contents: vec![
                    "REST API".to_string(),      // already present
                    String::new(),               // empty, discarded
                    "Uses PostgreSQL".to_string(),
                    "Uses PostgreSQL".to_string(), // in-batch duplicate
                ],
            }],
        )
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].added_observations, vec!["Uses PostgreSQL".to_string()]);

    let graph = manager.read_graph(&ns).unwrap();
    let api = graph
        .entities
        .iter()
        .find(|e| e.name == "backend_api")
        .unwrap();
    assert_eq!(
        api.observations,
        vec!["REST API".to_string(), "Uses PostgreSQL".to_string()]
    );
}

#[test]
fn test_add_observations_to_missing_entity_fails_without_side_effects() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();
    seed_team(&manager, &ns);

    let file = manager.store().file_path(&ns);
    let before = std::fs::read(&file).unwrap();

    let result = manager.add_observations(
        &ns,
        vec![
            ObservationInput {
                entity_name: "alice".to_string(),
                contents: vec!["Team Lead".to_string()],
            },
            ObservationInput {
                entity_name: "nobody".to_string(),
                contents: vec!["orphan".to_string()],
            },
        ],
    );

    assert!(matches!(result, Err(Error::EntityNotFound { name }) if name == "nobody"));

    // The whole call failed: the backing file is byte-for-byte unchanged.
    let after = std::fs::read(&file).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_delete_observations_on_missing_entity_is_silent_noop() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();
    seed_team(&manager, &ns);

    let file = manager.store().file_path(&ns);
    let before = std::fs::read(&file).unwrap();

    // The permissive counterpart of add_observations' strict policy: this
    // asymmetry is intentional, do not "fix" it into consistency.
    let removed = manager
        .delete_observations(
            &ns,
            vec![ObservationDeletion {
                entity_name: "nobody".to_string(),
                observations: vec!["anything".to_string()],
            }],
        )
        .unwrap();

    assert_eq!(removed, 0);
    assert_eq!(std::fs::read(&file).unwrap(), before);
}

#[test]
fn test_delete_observations_keeps_remainder_order() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();

    manager
        .create_entities(
            &ns,
            vec![Entity::new("doc", "document").with_observations(["one", "two", "three"])],
        )
        .unwrap();

    let removed = manager
        .delete_observations(
            &ns,
            vec![ObservationDeletion {
                entity_name: "doc".to_string(),
                observations: vec!["two".to_string()],
            }],
        )
        .unwrap();
    assert_eq!(removed, 1);

    let graph = manager.read_graph(&ns).unwrap();
    assert_eq!(
        graph.entities[0].observations,
        vec!["one".to_string(), "three".to_string()]
    );
}

#[test]
fn test_delete_relations_exact_triple_only() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();
    seed_team(&manager, &ns);

    // Same endpoints, different type: no-op.
    let removed = manager
        .delete_relations(&ns, &[Relation::new("alice", "backend_api", "wrote")])
        .unwrap();
    assert_eq!(removed, 0);
    assert_eq!(manager.read_graph(&ns).unwrap().relations.len(), 1);

    let removed = manager
        .delete_relations(&ns, &[Relation::new("alice", "backend_api", "maintains")])
        .unwrap();
    assert_eq!(removed, 1);
    assert!(manager.read_graph(&ns).unwrap().relations.is_empty());
}

// ============================================================================
// Search and Open
// ============================================================================

#[test]
fn test_search_exact_name_outranks_fuzzy_on_other_entity() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();

    manager
        .create_entities(
            &ns,
            vec![
                Entity::new("cache", "component"),
                Entity::new("cachr", "component"),
            ],
        )
        .unwrap();

    let (_, results) = manager.search_nodes(&ns, "cache").unwrap();
    assert_eq!(results[0].entity.name, "cache");
    assert!((results[0].score - 1.0).abs() < f64::EPSILON);
    assert_eq!(results[0].match_type, MatchKind::Exact);

    if let Some(fuzzy_hit) = results.iter().find(|m| m.entity.name == "cachr") {
        assert_eq!(fuzzy_hit.match_type, MatchKind::Fuzzy);
        assert!(fuzzy_hit.score < results[0].score);
    }
}

#[test]
fn test_search_empty_query_returns_full_graph_without_results() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();
    seed_team(&manager, &ns);

    let (graph, results) = manager.search_nodes(&ns, "").unwrap();
    assert!(results.is_empty());
    assert_eq!(graph.entities.len(), 2);
    assert_eq!(graph.relations.len(), 1);
}

#[test]
fn test_search_team_scenario_includes_relation() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();
    seed_team(&manager, &ns);

    let (graph, results) = manager.search_nodes(&ns, "API").unwrap();

    let api_hit = results
        .iter()
        .find(|m| m.entity.name == "backend_api")
        .unwrap();
    assert_eq!(api_hit.match_type, MatchKind::Partial);

    // Both endpoints matched, so the maintains relation survives filtering.
    assert!(
        graph
            .relations
            .iter()
            .any(|r| r.from == "alice" && r.to == "backend_api" && r.relation_type == "maintains")
    );
}

#[test]
fn test_search_fuzzy_disabled_only_direct_matches() {
    let dir = TempDir::new().unwrap();
    let manager = GraphManager::new(
        MemoryConfig::new()
            .with_base_path(dir.path())
            .with_fuzzy_search(false),
    );
    let ns = Namespace::default();
    seed_team(&manager, &ns);

    let (_, results) = manager.search_nodes(&ns, "alcie").unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_open_nodes_never_returns_dangling_relations() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();
    seed_team(&manager, &ns);

    // backend_api is related to alice, but alice was not requested and "c"
    // does not exist, so no relation can form a matched pair.
    let graph = manager
        .open_nodes(&ns, &["backend_api".to_string(), "c".to_string()])
        .unwrap();

    assert_eq!(graph.entities.len(), 1);
    assert_eq!(graph.entities[0].name, "backend_api");
    assert!(graph.relations.is_empty());

    let both = manager
        .open_nodes(&ns, &["alice".to_string(), "backend_api".to_string()])
        .unwrap();
    assert_eq!(both.relations.len(), 1);
}

// ============================================================================
// Storage Behaviour Through the Manager
// ============================================================================

#[test]
fn test_namespaces_do_not_interfere() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);

    let work = Namespace::new("work").unwrap();
    let home = Namespace::new("home").unwrap();

    seed_team(&manager, &work);
    manager
        .create_entities(&home, vec![Entity::new("garden", "hobby")])
        .unwrap();

    assert_eq!(manager.read_graph(&work).unwrap().entities.len(), 2);
    assert_eq!(manager.read_graph(&home).unwrap().entities.len(), 1);
}

#[test]
fn test_lock_busy_is_surfaced_and_retryable() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();
    seed_team(&manager, &ns);

    let lock_path = {
        let mut p = manager.store().file_path(&ns).into_os_string();
        p.push(".lock");
        std::path::PathBuf::from(p)
    };
    let guard = FsLockManager::new().try_exclusive(&lock_path).unwrap();

    let result = manager.read_graph(&ns);
    match result {
        Err(e @ Error::LockBusy { .. }) => assert!(e.is_retryable()),
        other => panic!("expected LockBusy, got {other:?}"),
    }

    drop(guard);
    assert!(manager.read_graph(&ns).is_ok());
}

#[test]
fn test_corrupt_lines_do_not_lose_the_rest() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir);
    let ns = Namespace::default();
    seed_team(&manager, &ns);

    // Corrupt one line in the middle of the file.
    let file = manager.store().file_path(&ns);
    let content = std::fs::read_to_string(&file).unwrap();
    let mangled: Vec<String> = content
        .lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                "{{{ not json".to_string()
            } else {
                line.to_string()
            }
        })
        .collect();
    std::fs::write(&file, mangled.join("\n")).unwrap();

    let graph = manager.read_graph(&ns).unwrap();
    assert_eq!(graph.entities.len(), 1);
    assert_eq!(graph.relations.len(), 1);
}

#[test]
fn test_encrypted_manager_roundtrip_and_tamper_rejection() {
    let dir = TempDir::new().unwrap();
    let manager = GraphManager::new(
        MemoryConfig::new()
            .with_base_path(dir.path())
            .with_encryption_password("passphrase"),
    );
    let ns = Namespace::default();
    seed_team(&manager, &ns);

    assert_eq!(manager.read_graph(&ns).unwrap().entities.len(), 2);

    // Flip one ciphertext byte: authentication must fail the whole load.
    let file = manager.store().file_path(&ns);
    let mut raw = std::fs::read(&file).unwrap();
    let last = raw.len() - 1;
    raw[last] ^= 0xff;
    std::fs::write(&file, raw).unwrap();

    let result = manager.read_graph(&ns);
    assert!(matches!(result, Err(Error::DecryptFailed(_))));
}

// ============================================================================
// Tool Façade
// ============================================================================

#[test]
fn test_facade_full_scenario() {
    let dir = TempDir::new().unwrap();
    let registry =
        ToolRegistry::with_memory_tool(MemoryConfig::new().with_base_path(dir.path()));

    let ns = "project_alpha";
    registry
        .execute(
            "memory",
            json!({
                "operation": "create_entities",
                "namespace": ns,
                "data": {"entities": [
                    {"name": "alice", "entityType": "person", "observations": ["Senior Developer", "Team Lead"]},
                    {"name": "backend_api", "entityType": "system", "observations": ["REST API"]},
                ]},
            }),
        )
        .unwrap();

    let relations = registry
        .execute(
            "memory",
            json!({
                "operation": "create_relations",
                "namespace": ns,
                "data": {"relations": [
                    {"from": "alice", "to": "backend_api", "relationType": "maintains"},
                ]},
            }),
        )
        .unwrap();
    assert_eq!(relations["createdRelations"][0]["relationType"], "maintains");

    let search = registry
        .execute(
            "memory",
            json!({
                "operation": "search_nodes",
                "namespace": ns,
                "data": {"query": "API"},
            }),
        )
        .unwrap();

    let hits = search["results"].as_array().unwrap();
    let api_hit = hits
        .iter()
        .find(|h| h["entity"]["name"] == "backend_api")
        .unwrap();
    assert_eq!(api_hit["matchType"], "partial");

    let graph_relations = search["graph"]["relations"].as_array().unwrap();
    assert!(
        graph_relations
            .iter()
            .any(|r| r["relationType"] == "maintains")
    );

    // The default namespace saw none of this.
    let default_graph = registry
        .execute("memory", json!({"operation": "read_graph"}))
        .unwrap();
    assert!(default_graph["entities"].as_array().unwrap().is_empty());
}

#[test]
fn test_facade_add_observations_reports_delta() {
    let dir = TempDir::new().unwrap();
    let registry =
        ToolRegistry::with_memory_tool(MemoryConfig::new().with_base_path(dir.path()));

    registry
        .execute(
            "memory",
            json!({
                "operation": "create_entities",
                "data": {"entities": [{"name": "alice", "entityType": "person"}]},
            }),
        )
        .unwrap();

    let response = registry
        .execute(
            "memory",
            json!({
                "operation": "add_observations",
                "data": {"observations": [
                    {"entityName": "alice", "contents": ["Knows Rust", "Knows Rust"]},
                ]},
            }),
        )
        .unwrap();

    let added = response["results"][0]["addedObservations"].as_array().unwrap();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0], "Knows Rust");
}

#[test]
fn test_facade_missing_payload_field_rejected() {
    let dir = TempDir::new().unwrap();
    let registry =
        ToolRegistry::with_memory_tool(MemoryConfig::new().with_base_path(dir.path()));

    // No data at all.
    let result = registry.execute("memory", json!({"operation": "create_entities"}));
    assert!(matches!(result, Err(Error::InvalidInput(_))));

    // Data present but the required field is missing.
    let result = registry.execute(
        "memory",
        json!({"operation": "create_entities", "data": {"wrong": []}}),
    );
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}
