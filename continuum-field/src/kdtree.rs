// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! KD-tree over RBF center positions.
//!
//! Each node splits on the axis of largest spread among the centers below it,
//! at the median. Nodes hold indices into the field's center table only; the
//! tree is tied to the field version it was built (or last re-stamped) at and
//! refuses queries against any other version.
//!
//! Centers appended after the last build live in an unindexed tail
//! `[indexed, len)` that every query scans linearly, so small appends do not
//! force a rebuild.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use continuum_math::{Point, DIM};
use serde::Serialize;

use crate::error::{FieldError, FieldResult};
use crate::field::{Center, RbfField};

/// A query result: center index and Euclidean distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

/// Shape summary of a built tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KdTreeStats {
    pub nodes: usize,
    pub depth: usize,
    pub indexed: usize,
    pub version: u64,
}

#[derive(Debug, Clone)]
struct KdNode {
    center: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Index-only KD-tree, see module docs.
#[derive(Debug, Clone)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    root: Option<usize>,
    version: u64,
    indexed: usize,
    depth: usize,
}

/// Max-heap entry ordered by (squared distance, index).
#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    dist_sq: f32,
    index: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist_sq
            .total_cmp(&other.dist_sq)
            .then_with(|| self.index.cmp(&other.index))
    }
}

impl KdTree {
    /// Build over every center of `field`, stamped with its current version.
    pub fn build(field: &RbfField) -> Self {
        Self::build_over(field.centers(), field.version())
    }

    /// Build, reporting `(placed, total)` after every node.
    pub fn build_with_progress(field: &RbfField, progress: &mut dyn FnMut(usize, usize)) -> Self {
        Self::build_over_with(field.centers(), field.version(), progress)
    }

    pub(crate) fn build_over(centers: &[Center], version: u64) -> Self {
        Self::build_over_with(centers, version, &mut |_, _| {})
    }

    fn build_over_with(centers: &[Center], version: u64, progress: &mut dyn FnMut(usize, usize)) -> Self {
        let mut tree = Self {
            nodes: Vec::with_capacity(centers.len()),
            root: None,
            version,
            indexed: centers.len(),
            depth: 0,
        };
        let mut order: Vec<usize> = (0..centers.len()).collect();
        tree.root = tree.build_recursive(centers, &mut order, 1, progress);
        tree
    }

    fn build_recursive(
        &mut self,
        centers: &[Center],
        idx: &mut [usize],
        depth: usize,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Option<usize> {
        if idx.is_empty() {
            return None;
        }
        self.depth = self.depth.max(depth);

        let axis = widest_axis(centers, idx);
        let mid = idx.len() / 2;
        idx.select_nth_unstable_by(mid, |&a, &b| {
            centers[a]
                .point()
                .get(axis)
                .total_cmp(&centers[b].point().get(axis))
                .then_with(|| a.cmp(&b))
        });

        let node_id = self.nodes.len();
        self.nodes.push(KdNode {
            center: idx[mid],
            axis,
            left: None,
            right: None,
        });
        progress(self.nodes.len(), centers.len());

        let (lo, rest) = idx.split_at_mut(mid);
        let hi = &mut rest[1..];
        let left = self.build_recursive(centers, lo, depth + 1, progress);
        let right = self.build_recursive(centers, hi, depth + 1, progress);
        self.nodes[node_id].left = left;
        self.nodes[node_id].right = right;
        Some(node_id)
    }

    /// Field version this tree describes.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of centers inside the tree (the rest are the linear tail).
    pub fn indexed(&self) -> usize {
        self.indexed
    }

    pub fn stats(&self) -> KdTreeStats {
        KdTreeStats {
            nodes: self.nodes.len(),
            depth: self.depth,
            indexed: self.indexed,
            version: self.version,
        }
    }

    /// Consistent iff the field version matches.
    pub fn is_consistent(&self, field: &RbfField) -> bool {
        self.version == field.version() && self.indexed <= field.len()
    }

    /// Carry the tree over a mutation that did not move or drop any center.
    pub(crate) fn restamp(&mut self, version: u64) {
        self.version = version;
    }

    fn check(&self, field: &RbfField) -> FieldResult<()> {
        if self.is_consistent(field) {
            Ok(())
        } else {
            Err(FieldError::StaleIndex {
                built: self.version,
                current: field.version(),
            })
        }
    }

    /// The `k` nearest centers by Euclidean distance, ascending.
    pub fn knn(&self, field: &RbfField, query: &Point, k: usize) -> FieldResult<Vec<Neighbor>> {
        self.check(field)?;
        Ok(self.knn_in(field.centers(), query, k))
    }

    /// All centers within Euclidean distance `r`, ascending by distance.
    pub fn radius(&self, field: &RbfField, query: &Point, r: f32) -> FieldResult<Vec<Neighbor>> {
        self.check(field)?;
        Ok(self.radius_in(field.centers(), query, r))
    }

    pub(crate) fn knn_in(&self, centers: &[Center], query: &Point, k: usize) -> Vec<Neighbor> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        if let Some(root) = self.root {
            self.knn_recursive(centers, root, query, k, &mut heap);
        }
        for index in self.indexed..centers.len() {
            offer(&mut heap, k, query.distance_sq(centers[index].point()), index);
        }
        heap.into_sorted_vec()
            .into_iter()
            .map(|e| Neighbor {
                index: e.index,
                distance: e.dist_sq.sqrt(),
            })
            .collect()
    }

    fn knn_recursive(
        &self,
        centers: &[Center],
        node_id: usize,
        query: &Point,
        k: usize,
        heap: &mut BinaryHeap<HeapEntry>,
    ) {
        let node = &self.nodes[node_id];
        let p = centers[node.center].point();
        offer(heap, k, query.distance_sq(p), node.center);

        let diff = query.get(node.axis) - p.get(node.axis);
        let (near, far) = if diff <= 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        if let Some(n) = near {
            self.knn_recursive(centers, n, query, k, heap);
        }
        if let Some(f) = far {
            let worst = if heap.len() < k {
                f32::INFINITY
            } else {
                heap.peek().map_or(f32::INFINITY, |e| e.dist_sq)
            };
            if diff * diff <= worst {
                self.knn_recursive(centers, f, query, k, heap);
            }
        }
    }

    pub(crate) fn radius_in(&self, centers: &[Center], query: &Point, r: f32) -> Vec<Neighbor> {
        let r_sq = r * r;
        let mut found = Vec::new();
        if let Some(root) = self.root {
            self.radius_recursive(centers, root, query, r_sq, &mut found);
        }
        for index in self.indexed..centers.len() {
            let d = query.distance_sq(centers[index].point());
            if d <= r_sq {
                found.push(HeapEntry { dist_sq: d, index });
            }
        }
        found.sort_unstable();
        found
            .into_iter()
            .map(|e| Neighbor {
                index: e.index,
                distance: e.dist_sq.sqrt(),
            })
            .collect()
    }

    fn radius_recursive(
        &self,
        centers: &[Center],
        node_id: usize,
        query: &Point,
        r_sq: f32,
        found: &mut Vec<HeapEntry>,
    ) {
        let node = &self.nodes[node_id];
        let p = centers[node.center].point();
        let d = query.distance_sq(p);
        if d <= r_sq {
            found.push(HeapEntry {
                dist_sq: d,
                index: node.center,
            });
        }
        let diff = query.get(node.axis) - p.get(node.axis);
        let (near, far) = if diff <= 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        if let Some(n) = near {
            self.radius_recursive(centers, n, query, r_sq, found);
        }
        if let Some(f) = far {
            if diff * diff <= r_sq {
                self.radius_recursive(centers, f, query, r_sq, found);
            }
        }
    }
}

fn offer(heap: &mut BinaryHeap<HeapEntry>, k: usize, dist_sq: f32, index: usize) {
    let entry = HeapEntry { dist_sq, index };
    if heap.len() < k {
        heap.push(entry);
    } else if let Some(worst) = heap.peek() {
        if entry < *worst {
            heap.pop();
            heap.push(entry);
        }
    }
}

fn widest_axis(centers: &[Center], idx: &[usize]) -> usize {
    let mut lo = [f32::INFINITY; DIM];
    let mut hi = [f32::NEG_INFINITY; DIM];
    for &i in idx {
        let c = centers[i].point().coords();
        for a in 0..DIM {
            lo[a] = lo[a].min(c[a]);
            hi[a] = hi[a].max(c[a]);
        }
    }
    let mut best = 0;
    for a in 1..DIM {
        if hi[a] - lo[a] > hi[best] - lo[best] {
            best = a;
        }
    }
    best
}
