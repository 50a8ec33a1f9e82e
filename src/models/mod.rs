//! Data models for engram.
//!
//! This module contains the core graph structures and the operation
//! payload/result types shared between the graph manager and the tool façade.

pub mod graph;
pub mod ops;

pub use graph::{
    Entity, KnowledgeGraph, Namespace, Relation, StoredEntity, StoredRelation, RECORD_TYPE_ENTITY,
    RECORD_TYPE_RELATION,
};
pub use ops::{MatchKind, ObservationDeletion, ObservationInput, ObservationResult, SearchMatch};
