// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Image → seeds via Sobel keypoints.
//!
//! Keypoints are strict 3×3 local maxima of the Sobel gradient magnitude
//! above a threshold, strongest first. A keypoint at pixel (px, py) with mean
//! intensity I, gradient (gx, gy) and magnitude g maps to
//!
//!   (px/w, py/h, I, 1, 0, m = visual),  c = g·e^{i·atan2(gy, gx)},
//!   σ = 0.05 + 0.1·(1 − g)

use anyhow::{bail, Result};
use continuum_math::{Modality, Point};
use num_complex::Complex;

use super::{Seed, SeedEncoder};

/// Interleaved 8-bit image.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<u8>,
}

impl ImageFrame {
    pub fn new(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 || channels == 0 {
            bail!("image dimensions must be positive, got {}x{}x{}", width, height, channels);
        }
        if data.len() != width * height * channels {
            bail!(
                "image data has {} bytes, {}x{}x{} needs {}",
                data.len(),
                width,
                height,
                channels,
                width * height * channels
            );
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Mean channel intensity in [0, 1], clamping coordinates to the border.
    pub fn intensity(&self, x: isize, y: isize) -> f32 {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        let base = (y * self.width + x) * self.channels;
        let sum: u32 = self.data[base..base + self.channels].iter().map(|&v| v as u32).sum();
        sum as f32 / (self.channels as f32 * 255.0)
    }

    /// Sobel gradient (gx, gy) on normalized intensity.
    pub fn sobel(&self, x: usize, y: usize) -> (f32, f32) {
        let (x, y) = (x as isize, y as isize);
        let p = |dx: isize, dy: isize| self.intensity(x + dx, y + dy);
        let gx = -p(-1, -1) - 2.0 * p(-1, 0) - p(-1, 1) + p(1, -1) + 2.0 * p(1, 0) + p(1, 1);
        let gy = -p(-1, -1) - 2.0 * p(0, -1) - p(1, -1) + p(-1, 1) + 2.0 * p(0, 1) + p(1, 1);
        (gx, gy)
    }
}

/// One detected keypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: usize,
    pub y: usize,
    pub intensity: f32,
    pub gx: f32,
    pub gy: f32,
    pub magnitude: f32,
}

#[derive(Debug, Clone)]
pub struct ImageEncoder {
    /// Minimum gradient magnitude of a keypoint (default 0.01)
    pub threshold: f32,
    /// Keep at most this many keypoints (default 256)
    pub max_keypoints: usize,
}

impl Default for ImageEncoder {
    fn default() -> Self {
        Self {
            threshold: 0.01,
            max_keypoints: 256,
        }
    }
}

impl ImageEncoder {
    /// Local maxima of the gradient magnitude, strongest first; ties keep
    /// raster order.
    pub fn keypoints(&self, image: &ImageFrame) -> Vec<Keypoint> {
        let (w, h) = (image.width, image.height);
        let mut grad = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                let (gx, gy) = image.sobel(x, y);
                // Sobel weights sum to 4 per side
                grad.push((gx, gy, (gx * gx + gy * gy).sqrt() / 4.0));
            }
        }

        let mut found = Vec::new();
        for y in 0..h {
            for x in 0..w {
                let (gx, gy, m) = grad[y * w + x];
                if m < self.threshold {
                    continue;
                }
                let mut is_max = true;
                'nb: for dy in -1isize..=1 {
                    for dx in -1isize..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = x as isize + dx;
                        let ny = y as isize + dy;
                        if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                            continue;
                        }
                        let other = grad[ny as usize * w + nx as usize].2;
                        // Plateaus keep their first pixel in raster order.
                        let earlier = (dy, dx) < (0, 0);
                        if other > m || (other == m && earlier) {
                            is_max = false;
                            break 'nb;
                        }
                    }
                }
                if is_max {
                    found.push(Keypoint {
                        x,
                        y,
                        intensity: image.intensity(x as isize, y as isize),
                        gx,
                        gy,
                        magnitude: m,
                    });
                }
            }
        }
        found.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
        found.truncate(self.max_keypoints);
        found
    }
}

impl SeedEncoder for ImageEncoder {
    type Input = ImageFrame;

    fn encode(&self, input: &ImageFrame) -> Result<Vec<Seed>> {
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            bail!("image threshold must be non-negative, got {}", self.threshold);
        }
        let mut seeds = Vec::new();
        for kp in self.keypoints(input) {
            let g = kp.magnitude.min(1.0);
            let point = Point::new([
                kp.x as f32 / input.width as f32,
                kp.y as f32 / input.height as f32,
                kp.intensity,
                1.0,
                0.0,
                Modality::Visual.value(),
            ])?;
            seeds.push(Seed {
                point,
                coeff: Complex::from_polar(kp.magnitude, kp.gy.atan2(kp.gx)),
                sigma: 0.05 + 0.1 * (1.0 - g),
            });
        }
        Ok(seeds)
    }

    fn name(&self) -> &str {
        "image"
    }
}
