// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

pub mod error;
pub mod field;
pub mod kdtree;
pub mod geometry;
pub mod evolution;
pub mod monitor;
pub mod topology;
pub mod persistence;

pub use error::{FieldError, FieldResult};
pub use evolution::{evolve_step, EvolutionParams, Evolver, IntegratorMethod, StepReport};
pub use field::{Center, FieldJet, IndexPolicy, RbfField, VersionToken};
pub use kdtree::{KdTree, KdTreeStats, Neighbor};
pub use monitor::{DissonanceReport, Monitor, MonitorParams, MonitorReport, ReflexivityReport};
pub use persistence::{PersistenceError, PersistenceResult};
pub use topology::TopologyReport;
