//! Parser-facing input model
//!
//! The PBF parser is an external collaborator; the extraction pipeline consumes
//! this digested form of its output. `waymark-extract` fills it from `osmpbf`,
//! tests fill it by hand.

use crate::coord::Coordinate;
use crate::profile::WayProfile;

/// Tag list of an OSM element, preserving input order.
#[derive(Debug, Clone, Default)]
pub struct Tags(Vec<(String, String)>);

impl Tags {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for Tags {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A node of the street network as the parser reports it.
#[derive(Debug, Clone)]
pub struct RawNode {
    pub id: i64,
    pub coord: Coordinate,
    /// `barrier=*` value, if any.
    pub barrier: Option<String>,
    /// Element tags beyond the barrier value (access overrides etc).
    pub tags: Tags,
    pub traffic_signal: bool,
}

impl RawNode {
    pub fn plain(id: i64, coord: Coordinate) -> Self {
        Self {
            id,
            coord,
            barrier: None,
            tags: Tags::new(),
            traffic_signal: false,
        }
    }
}

/// A way that the active profile accepted, with its assessment attached.
#[derive(Debug, Clone)]
pub struct RawWay {
    pub id: i64,
    pub nodes: Vec<i64>,
    pub way: WayProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictionKind {
    /// Forbid exactly the from -> via -> to movement.
    No,
    /// Forbid every movement sharing from -> via except the given one.
    Only,
}

/// The via member of a turn restriction relation.
#[derive(Debug, Clone)]
pub enum RestrictionVia {
    Node(i64),
    /// Ordered way ids forming the via path.
    Ways(Vec<i64>),
}

#[derive(Debug, Clone)]
pub struct RawRestriction {
    pub kind: RestrictionKind,
    pub from_way: i64,
    pub via: RestrictionVia,
    pub to_way: i64,
}

impl RawRestriction {
    /// Map a `restriction=*` tag value onto a kind; `None` for values that
    /// are not turn restrictions (e.g. `no_exit`).
    pub fn kind_from_tag(value: &str) -> Option<RestrictionKind> {
        match value {
            "no_entry" | "no_exit" => None,
            v if v.starts_with("no_") => Some(RestrictionKind::No),
            v if v.starts_with("only_") => Some(RestrictionKind::Only),
            _ => None,
        }
    }
}

/// Everything the extraction pipeline needs from one OSM extract.
#[derive(Debug, Default)]
pub struct ExtractionInput {
    pub nodes: Vec<RawNode>,
    pub ways: Vec<RawWay>,
    pub restrictions: Vec<RawRestriction>,
}

impl ExtractionInput {
    pub fn new() -> Self {
        Self::default()
    }
}
