//! Waymark: a turn-aware routing engine for OpenStreetMap extracts
//!
//! Pipeline:
//! - Extract: PBF + profile -> compressed node-based graph -> restriction index
//!   -> intersection analysis -> edge-expanded graph artifacts
//! - Contract: edge-expanded graph -> contraction hierarchy (`.hsgr`, `.enw`)
//! - Query: bidirectional hierarchy search for routes, matrices, nearest,
//!   map matching and round trips
//!
//! Key principle: the edge-expanded graph is the single source of truth for
//! routing. Every query path (route, table, match, trip) runs over the same
//! hierarchy built from it.

pub mod contractor;
pub mod coord;
pub mod dataset;
pub mod ebg;
pub mod error;
pub mod extractor;
pub mod formats;
pub mod intersection;
pub mod matching;
pub mod nbg;
pub mod osm;
pub mod profile;
pub mod query;
pub mod restrictions;
pub mod spatial;
pub mod trip;
pub mod validate;

/// Compact id of a node-based (street) node.
pub type NodeId = u32;
/// Compact id of a compressed segment (one per undirected geometry).
pub type SegmentId = u32;
/// Id of an edge-expanded node, i.e. a directed segment.
pub type EegNodeId = u32;
/// Index into the packed geometry table. Identical to the segment id.
pub type GeometryId = u32;
/// Index into the interned name table.
pub type NameId = u32;
/// Traversal cost in deci-seconds (or profile-defined units).
pub type Weight = i32;

pub const INVALID_NODE: NodeId = u32::MAX;
pub const INVALID_EEG_NODE: EegNodeId = u32::MAX;
pub const INVALID_NAME: NameId = u32::MAX;
pub const INVALID_WEIGHT: Weight = i32::MAX;

/// Hierarchy level assigned to nodes left uncontracted.
pub const CORE_LEVEL: u32 = u32::MAX;

pub use coord::Coordinate;
pub use dataset::Dataset;
pub use error::{ArtifactError, ContractError, ExtractError};
pub use profile::{CarProfile, Profile};
