// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

pub mod config;
pub mod controller;
pub mod encoding;
pub mod engine;
pub mod harness;

pub use config::{ControllerConfig, EngineConfig, FieldConfig};
pub use controller::{AutopoieticController, DrcMetrics, DrcState, DrcTick, SelfCreateReport};
pub use encoding::{AudioEncoder, ImageEncoder, ImageFrame, Seed, SeedEncoder, TextEncoder};
pub use engine::{ContinuumEngine, EngineStats, EngineStep, IngestReport};
pub use harness::{CapabilityScore, CapabilityValidator, StatisticalRun};
