// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Cluster structure of the center set.
//!
//! Centers closer than a fixed Euclidean threshold are joined with Union-Find;
//! the elder rule keeps the earliest-inserted center as the root, so cluster
//! labels follow insertion order. A *structure* is a cluster of size ≥ 2 and
//!
//!   complexity = #structures / #centers
//!
//! Stability across calls is an EWMA of min(new, old) / old over the structure
//! count.

use serde::{Deserialize, Serialize};

use crate::field::RbfField;

/// Default clustering threshold.
pub const CLUSTER_THRESHOLD: f32 = 1.0;

// ---------------------------------------------------------------------------
// Union-Find
// ---------------------------------------------------------------------------

struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
    num_components: usize,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
            num_components: n,
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]]; // path halving
            x = self.parent[x];
        }
        x
    }

    /// Elder rule union: the lower (earlier) root survives.
    /// Returns the absorbed root if a merge occurred.
    fn union(&mut self, a: usize, b: usize) -> Option<usize> {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return None;
        }
        let (elder, younger) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[younger] = elder;
        self.size[elder] += self.size[younger];
        self.num_components -= 1;
        Some(younger)
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Cluster statistics of one field state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyReport {
    /// Connected components, singletons included.
    pub clusters: usize,
    /// Components with at least two centers.
    pub structures: usize,
    pub largest: usize,
    /// structures / centers, 0 on an empty field
    pub complexity: f32,
    /// EWMA stability of the structure count (1 until a history exists)
    pub stability: f32,
    /// Cluster label of every center (index of its root), insertion order.
    pub labels: Vec<usize>,
}

/// Cluster the centers of `field` at `threshold`.
pub fn cluster_centers(field: &RbfField, threshold: f32) -> TopologyReport {
    let n = field.len();
    let mut uf = UnionFind::new(n);
    for (i, center) in field.centers().iter().enumerate() {
        for j in field.neighbors_within(center.point(), threshold) {
            if j > i {
                uf.union(i, j);
            }
        }
    }

    let labels: Vec<usize> = (0..n).map(|i| uf.find(i)).collect();
    let mut structures = 0;
    let mut largest = 0;
    for (i, &label) in labels.iter().enumerate() {
        if label == i {
            let size = uf.size[i];
            largest = largest.max(size);
            if size >= 2 {
                structures += 1;
            }
        }
    }

    TopologyReport {
        clusters: uf.num_components,
        structures,
        largest,
        complexity: if n == 0 { 0.0 } else { structures as f32 / n as f32 },
        stability: 1.0,
        labels,
    }
}

/// Tracks structure-count stability across successive measurements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyTracker {
    pub threshold: f32,
    /// EWMA weight of the newest ratio
    pub smoothing: f32,
    stability: f32,
    last_structures: Option<usize>,
}

impl Default for TopologyTracker {
    fn default() -> Self {
        Self {
            threshold: CLUSTER_THRESHOLD,
            smoothing: 0.1,
            stability: 1.0,
            last_structures: None,
        }
    }
}

impl TopologyTracker {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    /// Cluster and fold the new structure count into the stability EWMA,
    ///
    ///   s ← (1 − a)·s + a·min(new, old)/old,
    ///
    /// with the ratio taken as 1 when the previous count was zero.
    pub fn observe(&mut self, field: &RbfField) -> TopologyReport {
        let mut report = cluster_centers(field, self.threshold);
        if let Some(old) = self.last_structures {
            let ratio = if old == 0 {
                1.0
            } else {
                report.structures.min(old) as f32 / old as f32
            };
            self.stability = (1.0 - self.smoothing) * self.stability + self.smoothing * ratio;
        }
        self.last_structures = Some(report.structures);
        report.stability = self.stability;
        report
    }

    pub fn stability(&self) -> f32 {
        self.stability
    }

    pub fn reset(&mut self) {
        self.stability = 1.0;
        self.last_structures = None;
    }
}
