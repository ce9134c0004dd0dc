// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Audio → seeds via STFT peaks.
//!
//! Overlapping Hann-windowed frames (zero-padded to a power of two) go
//! through a forward FFT; each frame contributes its strongest bin f with
//! normalized magnitude e = |X_f| / n. Frames with e below the threshold are
//! skipped. A kept frame at time t of a clip lasting T maps to
//!
//!   (t/T, f/bins, e, 1 + t/T, look-ahead, m = auditory),  c = e·e^{2πi·f/bins}

use std::f32::consts::PI;

use anyhow::{bail, Result};
use continuum_math::{Modality, Point};
use num_complex::Complex;
use rustfft::FftPlanner;

use super::{Seed, SeedEncoder};

/// Spectral peak of one STFT frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePeak {
    pub frame: usize,
    /// Frame start in seconds
    pub time: f32,
    pub bin: usize,
    /// Normalized peak magnitude
    pub energy: f32,
}

#[derive(Debug, Clone)]
pub struct AudioEncoder {
    pub sample_rate: f32,
    /// Samples per frame (default 512)
    pub window: usize,
    /// Frame step, at most window/2 (default 256)
    pub hop: usize,
    /// Minimum peak energy for a frame to produce a seed (default 0.01)
    pub energy_threshold: f32,
    /// Width of every audio seed (default 0.1)
    pub sigma: f32,
}

impl Default for AudioEncoder {
    fn default() -> Self {
        Self {
            sample_rate: 16_000.0,
            window: 512,
            hop: 256,
            energy_threshold: 0.01,
            sigma: 0.1,
        }
    }
}

impl AudioEncoder {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            bail!("audio sample_rate must be positive, got {}", self.sample_rate);
        }
        if self.window < 2 {
            bail!("audio window must be at least 2 samples, got {}", self.window);
        }
        if self.hop == 0 || 2 * self.hop > self.window {
            bail!("audio hop {} must lie in [1, window/2 = {}]", self.hop, self.window / 2);
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            bail!("audio sigma must be positive, got {}", self.sigma);
        }
        Ok(())
    }

    /// FFT length: the next power of two at or above the window.
    pub fn fft_size(&self) -> usize {
        self.window.next_power_of_two()
    }

    /// Per-frame spectral peaks, all frames included.
    pub fn frame_peaks(&self, samples: &[f32]) -> Result<Vec<FramePeak>> {
        self.validate()?;
        if samples.len() < self.window {
            return Ok(Vec::new());
        }
        let n = self.fft_size();
        let bins = n / 2;
        let hann: Vec<f32> = (0..self.window)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (self.window - 1) as f32).cos()))
            .collect();

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);

        let num_frames = (samples.len() - self.window) / self.hop + 1;
        let mut peaks = Vec::with_capacity(num_frames);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n];
        for frame in 0..num_frames {
            let start = frame * self.hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = if i < self.window {
                    Complex::new(samples[start + i] * hann[i], 0.0)
                } else {
                    Complex::new(0.0, 0.0)
                };
            }
            fft.process(&mut buffer);

            let mut bin = 0;
            let mut energy = 0.0f32;
            for (f, x) in buffer.iter().take(bins).enumerate() {
                let e = x.norm() / n as f32;
                if e > energy {
                    energy = e;
                    bin = f;
                }
            }
            peaks.push(FramePeak {
                frame,
                time: start as f32 / self.sample_rate,
                bin,
                energy,
            });
        }
        Ok(peaks)
    }
}

impl SeedEncoder for AudioEncoder {
    type Input = [f32];

    fn encode(&self, input: &[f32]) -> Result<Vec<Seed>> {
        let peaks = self.frame_peaks(input)?;
        let duration = input.len() as f32 / self.sample_rate;
        let bins = (self.fft_size() / 2) as f32;
        let last = peaks.len().saturating_sub(1);

        let mut seeds = Vec::new();
        for peak in peaks.iter().filter(|p| p.energy >= self.energy_threshold) {
            let t = peak.time / duration;
            let f = peak.bin as f32 / bins;
            let point = Point::new([
                t,
                f,
                peak.energy,
                1.0 + t,
                if peak.frame < last { 0.1 } else { 0.0 },
                Modality::Auditory.value(),
            ])?;
            seeds.push(Seed {
                point,
                coeff: Complex::from_polar(peak.energy, 2.0 * PI * f),
                sigma: self.sigma,
            });
        }
        Ok(seeds)
    }

    fn name(&self) -> &str {
        "audio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use continuum_math::axis;

    fn tone(freq: f32, amplitude: f32, sample_rate: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_tone_peak_bin() {
        let enc = AudioEncoder::new(8000.0);
        // 1000 Hz at 8 kHz with n = 512 → bin 64
        let peaks = enc.frame_peaks(&tone(1000.0, 0.8, 8000.0, 4096)).unwrap();
        assert_eq!(peaks.len(), (4096 - 512) / 256 + 1);
        for p in &peaks {
            assert_eq!(p.bin, 64, "frame {} peaked at {}", p.frame, p.bin);
            // Hann-windowed sine: |X|/n ≈ A/4
            assert!((p.energy - 0.2).abs() < 0.02, "energy {}", p.energy);
        }
    }

    #[test]
    fn test_seeds_are_auditory() {
        let enc = AudioEncoder::new(8000.0);
        let seeds = enc.encode(&tone(500.0, 0.5, 8000.0, 2048)).unwrap();
        assert_eq!(seeds.len(), 7);
        for (i, s) in seeds.iter().enumerate() {
            assert_eq!(s.point.modality(), Modality::Auditory);
            assert!((s.point.get(axis::Y) - 32.0 / 256.0).abs() < 1e-6);
            assert!((s.coeff.norm() - s.point.get(axis::Z)).abs() < 1e-6);
            let lookahead = if i + 1 < seeds.len() { 0.1 } else { 0.0 };
            assert_eq!(s.point.get(axis::MEMORY), lookahead);
        }
    }

    #[test]
    fn test_quiet_frames_skipped() {
        let enc = AudioEncoder::new(8000.0);
        let mut samples = tone(1000.0, 0.8, 8000.0, 2048);
        for s in samples.iter_mut().skip(1024) {
            *s = 0.0;
        }
        let peaks = enc.frame_peaks(&samples).unwrap();
        let seeds = enc.encode(&samples).unwrap();
        assert!(seeds.len() < peaks.len());
        assert!(!seeds.is_empty());
        assert!(enc.encode(&[0.0; 4000]).unwrap().is_empty());
    }

    #[test]
    fn test_zero_padding_and_validation() {
        let enc = AudioEncoder {
            window: 400,
            hop: 200,
            ..AudioEncoder::new(8000.0)
        };
        assert_eq!(enc.fft_size(), 512);
        assert!(!enc.encode(&tone(1000.0, 0.8, 8000.0, 1600)).unwrap().is_empty());

        let bad = AudioEncoder {
            hop: 300,
            ..AudioEncoder::default()
        };
        assert!(bad.encode(&[0.0; 2048]).is_err());
        assert!(AudioEncoder::default().encode(&[0.1; 100]).unwrap().is_empty());
    }
}
