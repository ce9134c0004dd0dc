// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Validation harness: capability scorers and the statistics they report.

pub mod capability;
pub mod statistics;

pub use capability::{Capability, CapabilityReport, CapabilityScore, CapabilityValidator, TrialFixture};
pub use statistics::{DistributionAnalysis, Reproducibility, StatisticalRun, TwoSampleTest};
