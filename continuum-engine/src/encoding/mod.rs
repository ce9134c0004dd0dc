// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Input encoding for the continuum engine
//!
//! Each encoder turns one kind of external data into an ordered list of
//! [`Seed`]s, the (point, coefficient, width) triples the engine feeds to
//! `add_center`:
//! 1. **Text**: continuous 4-gram statistics, modality = semantic
//! 2. **Audio**: STFT peaks, modality = auditory
//! 3. **Image**: Sobel keypoints, modality = visual

pub mod audio;
pub mod image;
pub mod text;

use anyhow::Result;
use continuum_math::Point;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

pub use audio::AudioEncoder;
pub use image::{ImageEncoder, ImageFrame};
pub use text::TextEncoder;

/// One center proposed by an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    pub point: Point,
    pub coeff: Complex<f32>,
    pub sigma: f32,
}

/// Trait for encoding external input into field seeds.
pub trait SeedEncoder {
    /// What this encoder reads.
    type Input: ?Sized;

    /// Encode input into seeds, in the order they should be added.
    fn encode(&self, input: &Self::Input) -> Result<Vec<Seed>>;

    /// Name of this encoding strategy.
    fn name(&self) -> &str;
}
