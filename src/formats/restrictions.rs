//! `.restrictions` — serialized restriction and barrier index

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::ArtifactError;
use crate::nbg::DirectedSegment;
use crate::osm::RestrictionKind;
use crate::restrictions::{RestrictionIndex, TrieLeaf, TrieNode, ViaWayTrie};
use crate::NodeId;

use super::{ArtifactReader, ArtifactWriter};

const MAGIC: u32 = 0x5352_4D57; // "WMRS"

fn write_ds(w: &mut ArtifactWriter, ds: DirectedSegment) -> Result<(), ArtifactError> {
    w.u32(ds.segment)?;
    w.u8(ds.forward as u8)
}

fn read_ds(r: &mut ArtifactReader) -> Result<DirectedSegment, ArtifactError> {
    let segment = r.u32()?;
    let forward = r.u8()? != 0;
    Ok(DirectedSegment::new(segment, forward))
}

pub fn write(path: &Path, index: &RestrictionIndex) -> Result<(), ArtifactError> {
    let (no_turns, only_turns, barriers) = index.node_restriction_parts();
    let mut w = ArtifactWriter::create(path, MAGIC)?;

    // `no` entries, sorted for byte-stable output
    let mut no_sorted: Vec<_> = no_turns.iter().collect();
    no_sorted.sort_by_key(|((ds, via), _)| (ds.segment, ds.forward, *via));
    w.u32(no_sorted.len() as u32)?;
    for ((from, via), targets) in no_sorted {
        write_ds(&mut w, *from)?;
        w.u32(*via)?;
        let mut targets: Vec<NodeId> = targets.iter().copied().collect();
        targets.sort_unstable();
        w.u32(targets.len() as u32)?;
        for t in targets {
            w.u32(t)?;
        }
    }

    let mut only_sorted: Vec<_> = only_turns.iter().collect();
    only_sorted.sort_by_key(|((ds, via), _)| (ds.segment, ds.forward, *via));
    w.u32(only_sorted.len() as u32)?;
    for ((from, via), target) in only_sorted {
        write_ds(&mut w, *from)?;
        w.u32(*via)?;
        w.u32(*target)?;
    }

    // Via-way trie
    let trie = &index.via_way;
    w.u32(trie.node_count() as u32)?;
    for i in 0..trie.node_count() as u32 {
        let node = trie.node(i);
        write_ds(&mut w, node.via_edge)?;
        w.u32(node.children.len() as u32)?;
        for &c in &node.children {
            w.u32(c)?;
        }
        w.u32(node.leaves.len() as u32)?;
        for leaf in &node.leaves {
            w.u8(matches!(leaf.kind, RestrictionKind::Only) as u8)?;
            w.u32(leaf.to_node)?;
        }
    }
    let mut roots: Vec<_> = trie.roots().map(|(k, v)| (*k, *v)).collect();
    roots.sort_by_key(|((f, v), _)| (f.segment, f.forward, v.segment, v.forward));
    w.u32(roots.len() as u32)?;
    for ((from, via), state) in roots {
        write_ds(&mut w, from)?;
        write_ds(&mut w, via)?;
        w.u32(state)?;
    }

    // Barriers
    let mut barrier_sorted: Vec<_> = barriers.iter().collect();
    barrier_sorted.sort_by_key(|(node, _)| **node);
    w.u32(barrier_sorted.len() as u32)?;
    for (node, passable) in barrier_sorted {
        w.u32(*node)?;
        w.u8(*passable as u8)?;
    }

    w.finish()
}

pub fn read(path: &Path) -> Result<RestrictionIndex, ArtifactError> {
    let mut r = ArtifactReader::open(path, MAGIC)?;

    let mut no_turns: FxHashMap<(DirectedSegment, NodeId), FxHashSet<NodeId>> =
        FxHashMap::default();
    for _ in 0..r.u32()? {
        let from = read_ds(&mut r)?;
        let via = r.u32()?;
        let n = r.u32()?;
        let mut targets = FxHashSet::default();
        for _ in 0..n {
            targets.insert(r.u32()?);
        }
        no_turns.insert((from, via), targets);
    }

    let mut only_turns: FxHashMap<(DirectedSegment, NodeId), NodeId> = FxHashMap::default();
    for _ in 0..r.u32()? {
        let from = read_ds(&mut r)?;
        let via = r.u32()?;
        let target = r.u32()?;
        only_turns.insert((from, via), target);
    }

    let n_trie = r.u32()? as usize;
    let mut nodes = Vec::with_capacity(n_trie);
    for _ in 0..n_trie {
        let via_edge = read_ds(&mut r)?;
        let n_children = r.u32()?;
        let mut children = Vec::with_capacity(n_children as usize);
        for _ in 0..n_children {
            children.push(r.u32()?);
        }
        let n_leaves = r.u32()?;
        let mut leaves = Vec::with_capacity(n_leaves as usize);
        for _ in 0..n_leaves {
            let kind = if r.u8()? != 0 {
                RestrictionKind::Only
            } else {
                RestrictionKind::No
            };
            leaves.push(TrieLeaf {
                kind,
                to_node: r.u32()?,
            });
        }
        nodes.push(TrieNode {
            via_edge,
            children,
            leaves,
        });
    }
    let mut roots = FxHashMap::default();
    for _ in 0..r.u32()? {
        let from = read_ds(&mut r)?;
        let via = read_ds(&mut r)?;
        let state = r.u32()?;
        if state as usize >= n_trie {
            return Err(r.corrupt("trie root points past the node table"));
        }
        roots.insert((from, via), state);
    }

    let mut barriers = FxHashMap::default();
    for _ in 0..r.u32()? {
        let node = r.u32()?;
        let passable = r.u8()? != 0;
        barriers.insert(node, passable);
    }
    r.verify()?;

    Ok(RestrictionIndex::from_parts(
        no_turns,
        only_turns,
        ViaWayTrie::from_parts(roots, nodes),
        barriers,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.wm.restrictions");

        let mut no_turns: FxHashMap<(DirectedSegment, NodeId), FxHashSet<NodeId>> =
            FxHashMap::default();
        let mut set = FxHashSet::default();
        set.insert(9u32);
        set.insert(11u32);
        no_turns.insert((DirectedSegment::new(3, true), 4), set);

        let mut only_turns = FxHashMap::default();
        only_turns.insert((DirectedSegment::new(5, false), 6), 7u32);

        let mut barriers = FxHashMap::default();
        barriers.insert(20u32, false);

        let nodes = vec![TrieNode {
            via_edge: DirectedSegment::new(8, true),
            children: vec![],
            leaves: vec![TrieLeaf {
                kind: RestrictionKind::No,
                to_node: 12,
            }],
        }];
        let mut roots = FxHashMap::default();
        roots.insert(
            (DirectedSegment::new(2, true), DirectedSegment::new(8, true)),
            0u32,
        );

        let index = RestrictionIndex::from_parts(
            no_turns,
            only_turns,
            ViaWayTrie::from_parts(roots, nodes),
            barriers,
        );
        write(&path, &index).unwrap();
        let back = read(&path).unwrap();

        assert!(back.forbids_turn(DirectedSegment::new(3, true), 4, 9));
        assert!(back.forbids_turn(DirectedSegment::new(3, true), 4, 11));
        assert!(!back.forbids_turn(DirectedSegment::new(3, true), 4, 10));
        assert!(back.forbids_turn(DirectedSegment::new(5, false), 6, 8));
        assert!(!back.forbids_turn(DirectedSegment::new(5, false), 6, 7));
        assert!(!back.can_traverse_through(20));
        let state = back
            .via_way
            .enter(DirectedSegment::new(2, true), DirectedSegment::new(8, true))
            .unwrap();
        assert_eq!(back.via_way.node(state).leaves.len(), 1);
    }
}
