//! Spatial index over segment rectangles
//!
//! A static R-tree built bottom-up: leaf records (one rectangle per segment)
//! are packed into blocks of 128 in space-filling-curve order, and an rstar
//! tree with fan-out 16 indexes the block rectangles. The block index stays in
//! RAM; the leaf records live in `.fileIndex`, optionally memory-mapped.
//!
//! Snapping produces phantom nodes: positions interpolated along a segment
//! with the partial costs on either side of the projection.

use rstar::{RTree, RTreeObject, RTreeParams, AABB};

use crate::coord::{Coordinate, LocalProjection};
use crate::ebg::{EegNodeStore, GeometryTable};
use crate::formats::ScopedMmap;
use crate::{EegNodeId, SegmentId, Weight, INVALID_EEG_NODE};

/// Records per leaf block.
pub const LEAF_FANOUT: usize = 128;
/// Furthest a coordinate may sit from any road and still snap.
pub const MAX_SNAP_DISTANCE_M: f64 = 5_000.0;

/// Serialized size of one leaf record in `.fileIndex`.
pub const LEAF_RECORD_BYTES: usize = 29;

/// One spatial leaf: the bounding rectangle of a segment's polyline, tagged
/// with the edge-expanded nodes covering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafRecord {
    /// min_lon, min_lat, max_lon, max_lat in microdegrees.
    pub bbox: [i32; 4],
    pub segment: SegmentId,
    pub forward_node: EegNodeId,
    pub reverse_node: EegNodeId,
    /// Lies in a strongly-connected component below the pruning threshold.
    pub tiny: bool,
}

impl LeafRecord {
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.bbox[0] as i64 + self.bbox[2] as i64).div_euclid(2) as i32,
            (self.bbox[1] as i64 + self.bbox[3] as i64).div_euclid(2) as i32,
        )
    }

    pub fn write_to(&self, buf: &mut Vec<u8>) {
        for v in self.bbox {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf.extend_from_slice(&self.segment.to_le_bytes());
        buf.extend_from_slice(&self.forward_node.to_le_bytes());
        buf.extend_from_slice(&self.reverse_node.to_le_bytes());
        buf.push(self.tiny as u8);
    }

    pub fn read_from(raw: &[u8]) -> Self {
        let i32_at = |o: usize| i32::from_le_bytes([raw[o], raw[o + 1], raw[o + 2], raw[o + 3]]);
        let u32_at = |o: usize| u32::from_le_bytes([raw[o], raw[o + 1], raw[o + 2], raw[o + 3]]);
        Self {
            bbox: [i32_at(0), i32_at(4), i32_at(8), i32_at(12)],
            segment: u32_at(16),
            forward_node: u32_at(20),
            reverse_node: u32_at(24),
            tiny: raw[28] != 0,
        }
    }
}

/// Leaf records, resident or memory-mapped.
pub enum LeafStore {
    Ram(Vec<LeafRecord>),
    Mapped { map: ScopedMmap, offset: usize, count: usize },
}

impl LeafStore {
    pub fn len(&self) -> usize {
        match self {
            LeafStore::Ram(v) => v.len(),
            LeafStore::Mapped { count, .. } => *count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> LeafRecord {
        match self {
            LeafStore::Ram(v) => v[i],
            LeafStore::Mapped { map, offset, .. } => {
                let start = offset + i * LEAF_RECORD_BYTES;
                LeafRecord::read_from(&map.as_slice()[start..start + LEAF_RECORD_BYTES])
            }
        }
    }
}

/// Internal fan-out of the block tree.
pub struct BlockTreeParams;

impl RTreeParams for BlockTreeParams {
    const MIN_SIZE: usize = 8;
    const MAX_SIZE: usize = 16;
    const REINSERTION_COUNT: usize = 4;
    type DefaultInsertionStrategy = rstar::RStarInsertionStrategy;
}

/// RAM-resident index entry: the rectangle of one block of leaf records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeafBlock {
    /// Degrees: [min_lon, min_lat], [max_lon, max_lat].
    pub min: [f64; 2],
    pub max: [f64; 2],
    pub start: u32,
    pub count: u32,
}

impl RTreeObject for LeafBlock {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// A snapped position on a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct PhantomNode {
    pub segment: SegmentId,
    pub forward_node: EegNodeId,
    pub reverse_node: EegNodeId,
    pub snapped: Coordinate,
    /// Fraction of the segment's cost basis before the projection.
    pub fraction: f64,
    /// Cost from the geometry start to the projection (forward traversal).
    pub forward_offset_weight: Weight,
    pub forward_offset_duration: Weight,
    /// Cost from the geometry end to the projection (reverse traversal).
    pub reverse_offset_weight: Weight,
    pub reverse_offset_duration: Weight,
}

impl PhantomNode {
    pub fn has_forward(&self) -> bool {
        self.forward_node != INVALID_EEG_NODE
    }

    pub fn has_reverse(&self) -> bool {
        self.reverse_node != INVALID_EEG_NODE
    }
}

/// A phantom candidate with its snap distance.
#[derive(Debug, Clone)]
pub struct PhantomCandidate {
    pub phantom: PhantomNode,
    pub distance_m: f64,
}

pub struct SpatialIndex {
    tree: RTree<LeafBlock, BlockTreeParams>,
    leaves: LeafStore,
}

impl SpatialIndex {
    /// Assemble blocks from leaf records already in curve order.
    pub fn from_store(leaves: LeafStore) -> Self {
        let n = leaves.len();
        let mut blocks = Vec::with_capacity(n.div_ceil(LEAF_FANOUT));
        let mut start = 0usize;
        while start < n {
            let count = LEAF_FANOUT.min(n - start);
            let mut min = [f64::INFINITY; 2];
            let mut max = [f64::NEG_INFINITY; 2];
            for i in start..start + count {
                let rec = leaves.get(i);
                min[0] = min[0].min(rec.bbox[0] as f64 / 1e6);
                min[1] = min[1].min(rec.bbox[1] as f64 / 1e6);
                max[0] = max[0].max(rec.bbox[2] as f64 / 1e6);
                max[1] = max[1].max(rec.bbox[3] as f64 / 1e6);
            }
            blocks.push(LeafBlock {
                min,
                max,
                start: start as u32,
                count: count as u32,
            });
            start += count;
        }
        Self {
            tree: RTree::bulk_load_with_params(blocks),
            leaves,
        }
    }

    /// Reassemble from persisted block rectangles and leaf records.
    pub fn from_blocks(blocks: Vec<LeafBlock>, leaves: LeafStore) -> Self {
        Self {
            tree: RTree::bulk_load_with_params(blocks),
            leaves,
        }
    }

    /// Sort leaf records into space-filling-curve order for block packing.
    /// Must run once at build time, before serialization.
    pub fn curve_order(leaves: &mut [LeafRecord]) {
        leaves.sort_by_key(|l| {
            let c = l.center();
            morton(c.lon, c.lat)
        });
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &LeafBlock> {
        self.tree.iter()
    }

    /// All candidates within `radius_m` meters, nearest first. Ties break on
    /// segment id. Tiny-component candidates are kept only when nothing else
    /// qualifies.
    pub fn within_radius(
        &self,
        coord: Coordinate,
        radius_m: f64,
        geometry: &GeometryTable,
        store: &EegNodeStore,
    ) -> Vec<PhantomCandidate> {
        let proj = LocalProjection::new(coord);
        let lat_pad = radius_m / 111_132.0;
        let lon_pad = lat_pad / coord.lat_deg().to_radians().cos().abs().max(0.01);
        let envelope = AABB::from_corners(
            [coord.lon_deg() - lon_pad, coord.lat_deg() - lat_pad],
            [coord.lon_deg() + lon_pad, coord.lat_deg() + lat_pad],
        );

        let mut kept: Vec<PhantomCandidate> = Vec::new();
        let mut tiny_kept: Vec<PhantomCandidate> = Vec::new();

        for block in self.tree.locate_in_envelope_intersecting(&envelope) {
            for i in block.start..block.start + block.count {
                let rec = self.leaves.get(i as usize);
                if !bbox_intersects(&rec.bbox, &envelope) {
                    continue;
                }
                let Some(candidate) = snap_to_record(&rec, coord, &proj, geometry, store) else {
                    continue;
                };
                if candidate.distance_m > radius_m {
                    continue;
                }
                if rec.tiny {
                    tiny_kept.push(candidate);
                } else {
                    kept.push(candidate);
                }
            }
        }

        let mut result = if kept.is_empty() { tiny_kept } else { kept };
        result.sort_by(|a, b| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then(a.phantom.segment.cmp(&b.phantom.segment))
        });
        result
    }

    /// The `k` best candidates by snap distance, searching an expanding
    /// radius up to the maximum snap distance.
    pub fn nearest(
        &self,
        coord: Coordinate,
        k: usize,
        geometry: &GeometryTable,
        store: &EegNodeStore,
    ) -> Vec<PhantomCandidate> {
        let mut radius = 250.0;
        loop {
            let mut found = self.within_radius(coord, radius, geometry, store);
            if found.len() >= k || radius >= MAX_SNAP_DISTANCE_M {
                found.truncate(k);
                return found;
            }
            radius = (radius * 2.0).min(MAX_SNAP_DISTANCE_M);
        }
    }
}

fn bbox_intersects(bbox: &[i32; 4], envelope: &AABB<[f64; 2]>) -> bool {
    let lower = envelope.lower();
    let upper = envelope.upper();
    bbox[0] as f64 / 1e6 <= upper[0]
        && bbox[2] as f64 / 1e6 >= lower[0]
        && bbox[1] as f64 / 1e6 <= upper[1]
        && bbox[3] as f64 / 1e6 >= lower[1]
}

/// Project a coordinate onto one segment's polyline and build the phantom.
fn snap_to_record(
    rec: &LeafRecord,
    coord: Coordinate,
    proj: &LocalProjection,
    geometry: &GeometryTable,
    store: &EegNodeStore,
) -> Option<PhantomCandidate> {
    let polyline = geometry.polyline(rec.segment);
    if polyline.len() < 2 {
        return None;
    }

    let mut best: Option<(f64, usize, f64, Coordinate)> = None;
    for (leg, pair) in polyline.windows(2).enumerate() {
        let (snapped, ratio, dist) = proj.project_onto_segment(coord, pair[0], pair[1]);
        if best.as_ref().map_or(true, |(d, _, _, _)| dist < *d) {
            best = Some((dist, leg, ratio, snapped));
        }
    }
    let (dist, leg, ratio, snapped) = best?;

    let cums = geometry.cumulative_weights(rec.segment);
    let cum_durs = geometry.cumulative_durations(rec.segment);
    let basis_total = *cums.last()? as f64;

    let interp = |arr: &[Weight]| -> f64 {
        let prev = if leg == 0 { 0.0 } else { arr[leg - 1] as f64 };
        prev + (arr[leg] as f64 - prev) * ratio
    };
    let offset_w = interp(cums);
    let offset_d = interp(cum_durs);
    let fraction = if basis_total > 0.0 {
        (offset_w / basis_total).clamp(0.0, 1.0)
    } else {
        0.0
    };

    // Reverse-direction totals come from the node store; partials scale by
    // the remaining fraction (chain folding keeps per-direction speeds
    // uniform along a segment, so this is exact up to rounding).
    let (rev_off_w, rev_off_d) = if rec.reverse_node != INVALID_EEG_NODE {
        let total_w = store.weight(rec.reverse_node) as f64;
        let total_d = store.duration(rec.reverse_node) as f64;
        (
            (total_w * (1.0 - fraction)).round() as Weight,
            (total_d * (1.0 - fraction)).round() as Weight,
        )
    } else {
        (0, 0)
    };

    Some(PhantomCandidate {
        phantom: PhantomNode {
            segment: rec.segment,
            forward_node: rec.forward_node,
            reverse_node: rec.reverse_node,
            snapped,
            fraction,
            forward_offset_weight: offset_w.round() as Weight,
            forward_offset_duration: offset_d.round() as Weight,
            reverse_offset_weight: rev_off_w,
            reverse_offset_duration: rev_off_d,
        },
        distance_m: dist,
    })
}

/// Interleave the bits of the two fixed-point coordinates.
fn morton(lon: i32, lat: i32) -> u64 {
    let x = (lon as i64 - i32::MIN as i64) as u64 >> 16;
    let y = (lat as i64 - i32::MIN as i64) as u64 >> 16;
    spread(x) | (spread(y) << 1)
}

fn spread(mut v: u64) -> u64 {
    v &= 0xffff;
    v = (v | (v << 16)) & 0x0000_ffff_0000_ffff;
    v = (v | (v << 8)) & 0x00ff_00ff_00ff_00ff;
    v = (v | (v << 4)) & 0x0f0f_0f0f_0f0f_0f0f;
    v = (v | (v << 2)) & 0x3333_3333_3333_3333;
    v = (v | (v << 1)) & 0x5555_5555_5555_5555;
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_record_round_trip() {
        let rec = LeafRecord {
            bbox: [-1_000_000, 2_000_000, 3_000_000, 4_000_000],
            segment: 42,
            forward_node: 7,
            reverse_node: INVALID_EEG_NODE,
            tiny: true,
        };
        let mut buf = Vec::new();
        rec.write_to(&mut buf);
        assert_eq!(buf.len(), LEAF_RECORD_BYTES);
        assert_eq!(LeafRecord::read_from(&buf), rec);
    }

    #[test]
    fn morton_orders_locally() {
        // Nearby points should get closer codes than distant ones
        let near = morton(4_350_000, 50_850_000);
        let near2 = morton(4_351_000, 50_851_000);
        let far = morton(-70_000_000, -30_000_000);
        assert!(near.abs_diff(near2) < near.abs_diff(far));
    }

    #[test]
    fn curve_order_groups_neighbors() {
        let mk = |lon: i32, lat: i32, seg: u32| LeafRecord {
            bbox: [lon, lat, lon + 100, lat + 100],
            segment: seg,
            forward_node: seg,
            reverse_node: seg,
            tiny: false,
        };
        let mut leaves = vec![
            mk(0, 0, 0),
            mk(50_000_000, 50_000_000, 1),
            mk(100, 100, 2),
            mk(50_000_100, 50_000_100, 3),
        ];
        SpatialIndex::curve_order(&mut leaves);
        let pos = |seg: u32| leaves.iter().position(|l| l.segment == seg).unwrap();
        assert_eq!(pos(0).abs_diff(pos(2)), 1, "near-origin pair adjacent");
        assert_eq!(pos(1).abs_diff(pos(3)), 1, "far pair adjacent");
    }
}
