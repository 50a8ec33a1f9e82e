//! Search ranking.
//!
//! Two layers, applied in order:
//!
//! 1. Direct matching per entity, stopping at the first hit in precedence
//!    order: exact name, substring name, exact type, substring type,
//!    substring observation. All comparisons are case-insensitive.
//! 2. An optional fuzzy layer over the entities the first pass missed,
//!    scoring the query against name, type, and every observation and
//!    keeping the best similarity at or above the relevance floor.
//!
//! An entity appears at most once; a direct hit is never demoted by the
//! fuzzy layer. Fuzzy hits are appended after all direct hits, ordered by
//! descending score.
//!
//! The score constants are load-bearing: downstream ranking expectations
//! depend on their exact ordering, so they are named here rather than
//! derived.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{Entity, KnowledgeGraph, MatchKind, SearchMatch};

/// Score for a case-insensitive exact name match.
pub const SCORE_NAME_EXACT: f64 = 1.0;

/// Score for a case-insensitive exact type match.
pub const SCORE_TYPE_EXACT: f64 = 0.9;

/// Score for a case-insensitive name substring match.
pub const SCORE_NAME_PARTIAL: f64 = 0.8;

/// Score for a case-insensitive type substring match.
pub const SCORE_TYPE_PARTIAL: f64 = 0.7;

/// Score for a case-insensitive observation substring match.
pub const SCORE_OBSERVATION_PARTIAL: f64 = 0.6;

/// Minimum fuzzy similarity kept in the result set.
pub const FUZZY_SCORE_FLOOR: f64 = 0.3;

/// Ranks the graph's entities against a non-empty query.
///
/// Returns the filtered sub-graph (matched entities plus only the relations
/// whose both endpoints matched) and the scored result list.
#[must_use]
pub fn search(
    graph: &KnowledgeGraph,
    query: &str,
    fuzzy_enabled: bool,
) -> (KnowledgeGraph, Vec<SearchMatch>) {
    let query_lower = query.to_lowercase();

    let mut matches: Vec<SearchMatch> = Vec::new();
    let mut matched_names: HashSet<&str> = HashSet::new();

    for entity in &graph.entities {
        if let Some((score, match_type)) = direct_match(entity, &query_lower) {
            matched_names.insert(entity.name.as_str());
            matches.push(SearchMatch {
                entity: entity.clone(),
                score,
                match_type,
            });
        }
    }

    if fuzzy_enabled {
        let mut fuzzy_hits: Vec<SearchMatch> = Vec::new();
        for entity in &graph.entities {
            if matched_names.contains(entity.name.as_str()) {
                continue;
            }
            let score = fuzzy_score(entity, &query_lower);
            if score >= FUZZY_SCORE_FLOOR {
                fuzzy_hits.push(SearchMatch {
                    entity: entity.clone(),
                    score,
                    match_type: MatchKind::Fuzzy,
                });
            }
        }
        fuzzy_hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        matches.extend(fuzzy_hits);
    }

    let entity_set: HashSet<&str> = matches.iter().map(|m| m.entity.name.as_str()).collect();
    let entities: Vec<Entity> = matches.iter().map(|m| m.entity.clone()).collect();
    let relations = graph
        .relations
        .iter()
        .filter(|r| entity_set.contains(r.from.as_str()) && entity_set.contains(r.to.as_str()))
        .cloned()
        .collect();

    (
        KnowledgeGraph {
            entities,
            relations,
        },
        matches,
    )
}

/// Checks the direct strategies in precedence order, stopping at the first.
fn direct_match(entity: &Entity, query_lower: &str) -> Option<(f64, MatchKind)> {
    let name_lower = entity.name.to_lowercase();
    if name_lower == query_lower {
        return Some((SCORE_NAME_EXACT, MatchKind::Exact));
    }
    if name_lower.contains(query_lower) {
        return Some((SCORE_NAME_PARTIAL, MatchKind::Partial));
    }

    let type_lower = entity.entity_type.to_lowercase();
    if type_lower == query_lower {
        return Some((SCORE_TYPE_EXACT, MatchKind::Exact));
    }
    if type_lower.contains(query_lower) {
        return Some((SCORE_TYPE_PARTIAL, MatchKind::Partial));
    }

    if entity
        .observations
        .iter()
        .any(|obs| obs.to_lowercase().contains(query_lower))
    {
        return Some((SCORE_OBSERVATION_PARTIAL, MatchKind::Partial));
    }

    None
}

/// Best Jaro-Winkler similarity of the query against the entity's candidate
/// strings (name, type, each observation).
fn fuzzy_score(entity: &Entity, query_lower: &str) -> f64 {
    let mut best = strsim::jaro_winkler(query_lower, &entity.name.to_lowercase());

    let type_score = strsim::jaro_winkler(query_lower, &entity.entity_type.to_lowercase());
    if type_score > best {
        best = type_score;
    }

    for obs in &entity.observations {
        let score = strsim::jaro_winkler(query_lower, &obs.to_lowercase());
        if score > best {
            best = score;
        }
    }

    best
}
