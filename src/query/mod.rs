//! Query engine over the contraction hierarchy
//!
//! All query paths (route, matrix, nearest, matching, trip) run over the same
//! hierarchy. Searches follow upward edges only; inside the core (level ==
//! sentinel) they degrade to plain bidirectional Dijkstra.

pub mod alternatives;
pub mod engine;
pub mod matrix;
pub mod scratch;
pub mod unpack;

use crate::formats::hsgr::{HsgrData, HsgrEdge};
use crate::{EegNodeId, CORE_LEVEL};

pub use engine::{Route, RoutingEngine};
pub use scratch::{QueryScratch, SearchSpace};

/// The loaded hierarchy, ready for bidirectional searches.
#[derive(Debug, Default)]
pub struct QueryGraph {
    pub checksum: u32,
    pub levels: Vec<u32>,
    first_edge: Vec<u32>,
    edges: Vec<HsgrEdge>,
}

impl QueryGraph {
    pub fn from_hsgr(data: HsgrData) -> Self {
        Self {
            checksum: data.checksum,
            levels: data.levels,
            first_edge: data.first_edge,
            edges: data.edges,
        }
    }

    pub fn node_count(&self) -> usize {
        self.levels.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_core(&self, node: EegNodeId) -> bool {
        self.levels[node as usize] == CORE_LEVEL
    }

    pub fn core_size(&self) -> usize {
        self.levels.iter().filter(|&&l| l == CORE_LEVEL).count()
    }

    pub fn edge_range(&self, node: EegNodeId) -> std::ops::Range<usize> {
        self.first_edge[node as usize] as usize..self.first_edge[node as usize + 1] as usize
    }

    pub fn edge(&self, idx: usize) -> &HsgrEdge {
        &self.edges[idx]
    }

    /// May a search expand from `u` to `v`? Strictly upward outside the
    /// core; unrestricted between core nodes (the core sentinel level makes
    /// edges into the core upward automatically).
    pub fn expansion_allowed(&self, u: EegNodeId, v: EegNodeId) -> bool {
        let lu = self.levels[u as usize];
        let lv = self.levels[v as usize];
        lv > lu || (lu == CORE_LEVEL && lv == CORE_LEVEL)
    }

    /// Cheapest forward edge `from` -> `to`, for shortcut unpacking.
    pub fn find_forward_edge(&self, from: EegNodeId, to: EegNodeId) -> Option<&HsgrEdge> {
        self.edge_range(from)
            .map(|i| &self.edges[i])
            .filter(|e| e.forward && e.target == to)
            .min_by_key(|e| e.weight)
    }
}
