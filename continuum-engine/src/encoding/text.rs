// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Text → seeds by continuous n-gram statistics (no tokenization).
//!
//! A sliding window of `ngram` characters moves over the lowercased text in
//! steps of `stride`. Each window is hashed to a position in [0, 1]³:
//!
//!   x = vowels / (letters + 1)
//!   y = Σ ((31·cᵢ + cᵢ₊₁) mod 100) / (100·len)
//!   z = (min(1, len/15) + first/26 + last/26) / 3
//!
//! and pulled toward its neighbourhood by the semantic cluster score s (mean
//! Gaussian similarity to windows within ±20 characters):
//!
//!   (x, y, z)·(0.8 + 0.2·s),  τ₁ = base + 0.1·progress,
//!   τ₂ = 0.1·phonetic balance + 0.05·complexity,  m = semantic
//!
//! The coefficient is real, intensity·(1 − 0.15·progress)·content weight.

use anyhow::{bail, Result};
use continuum_math::{Modality, Point};
use num_complex::Complex;

use super::{Seed, SeedEncoder};

const CLUSTER_SPAN: usize = 20;
const CLUSTER_VARIANCE: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct TextEncoder {
    /// Window length in characters (default 4)
    pub ngram: usize,
    /// Window step in characters (default 2)
    pub stride: usize,
    /// Overall coefficient scale (default 1.0)
    pub intensity: f32,
    /// τ₁ of the first window (default 1.0)
    pub base_time: f32,
}

impl Default for TextEncoder {
    fn default() -> Self {
        Self {
            ngram: 4,
            stride: 2,
            intensity: 1.0,
            base_time: 1.0,
        }
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

fn letter_offset(c: char) -> f32 {
    (c as u32 as f32 - 'a' as u32 as f32) / 26.0
}

/// Continuous character hash of a window into [0, 1]³.
fn embed(window: &[char]) -> [f32; 3] {
    if window.is_empty() {
        return [0.5; 3];
    }
    let len = window.len() as f32;
    let vowels = window.iter().filter(|&&c| is_vowel(c)).count() as f32;
    let consonants = window.iter().filter(|&&c| c.is_alphabetic() && !is_vowel(c)).count() as f32;

    let bigrams: f32 = window
        .windows(2)
        .map(|w| ((w[0] as u32).wrapping_mul(31).wrapping_add(w[1] as u32) % 100) as f32)
        .sum();

    let first = letter_offset(window[0]);
    let last = letter_offset(window[window.len() - 1]);
    let e = [
        vowels / (vowels + consonants + 1.0),
        bigrams / (len * 100.0),
        ((len / 15.0).min(1.0) + first + last) / 3.0,
    ];
    e.map(|v| v.clamp(0.0, 1.0))
}

impl TextEncoder {
    fn validate(&self) -> Result<()> {
        if self.ngram == 0 || self.stride == 0 {
            bail!("text encoder ngram ({}) and stride ({}) must be positive", self.ngram, self.stride);
        }
        if !(self.intensity.is_finite() && self.base_time.is_finite()) {
            bail!("text encoder intensity and base_time must be finite");
        }
        Ok(())
    }

    fn cluster_score(&self, chars: &[char], i: usize, own: &[f32; 3]) -> f32 {
        let last_start = chars.len() - self.ngram;
        let lo = i.saturating_sub(CLUSTER_SPAN);
        let hi = (i + CLUSTER_SPAN).min(last_start);
        let mut sum = 0.0f32;
        let mut count = 0usize;
        let mut k = lo;
        while k < hi {
            if k != i {
                let other = embed(&chars[k..k + self.ngram]);
                let similarity: f32 = own
                    .iter()
                    .zip(other.iter())
                    .map(|(a, b)| (-(a - b) * (a - b) / CLUSTER_VARIANCE).exp())
                    .sum();
                sum += similarity / 3.0;
                count += 1;
            }
            k += self.stride;
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }
}

impl SeedEncoder for TextEncoder {
    type Input = str;

    fn encode(&self, input: &str) -> Result<Vec<Seed>> {
        self.validate()?;
        let chars: Vec<char> = input.to_lowercase().chars().collect();
        if chars.len() < self.ngram {
            return Ok(Vec::new());
        }
        let total = chars.len() as f32;
        let mut seeds = Vec::new();

        let mut i = 0;
        while i + self.ngram <= chars.len() {
            let window = &chars[i..i + self.ngram];
            if window.iter().all(|c| c.is_whitespace()) {
                i += self.stride;
                continue;
            }

            let pos = embed(window);
            let cluster = self.cluster_score(&chars, i, &pos);
            let progress = i as f32 / total;

            let vowels = window.iter().filter(|&&c| is_vowel(c)).count() as f32;
            let consonants = window.iter().filter(|&&c| c.is_alphabetic() && !is_vowel(c)).count() as f32;
            let phonetic = if vowels + consonants > 0.0 {
                vowels / (vowels + consonants)
            } else {
                0.5
            };
            let complexity = if window.len() > 1 {
                window
                    .windows(2)
                    .map(|w| (w[1] as i64 - w[0] as i64).unsigned_abs() as f32 / 26.0)
                    .sum::<f32>()
                    / (window.len() - 1) as f32
            } else {
                0.0
            };
            let diversity = if window.len() > 1 {
                window.windows(2).filter(|w| w[0] != w[1]).count() as f32 / (window.len() - 1) as f32
            } else {
                0.0
            };

            let pull = 0.8 + 0.2 * cluster;
            let point = Point::new([
                pos[0] * pull,
                pos[1] * pull,
                pos[2] * pull,
                self.base_time + 0.1 * progress,
                0.1 * phonetic + 0.05 * complexity,
                Modality::Semantic.value(),
            ])?;

            let position_weight = 1.0 - 0.15 * progress;
            let content_weight = 0.6 + 0.25 * phonetic + 0.15 * cluster;
            seeds.push(Seed {
                point,
                coeff: Complex::new(self.intensity * position_weight * content_weight, 0.0),
                sigma: 0.15 + 0.1 * diversity + 0.05 * (1.0 - cluster),
            });
            i += self.stride;
        }
        Ok(seeds)
    }

    fn name(&self) -> &str {
        "text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use continuum_math::axis;

    #[test]
    fn test_window_count_and_modality() {
        let enc = TextEncoder::default();
        // 12 chars, 4-grams at 0, 2, 4, 6, 8
        let seeds = enc.encode("hello worlds").unwrap();
        assert_eq!(seeds.len(), 5);
        for s in &seeds {
            assert_eq!(s.point.modality(), Modality::Semantic);
            assert!(s.sigma > 0.0);
            assert_eq!(s.coeff.im, 0.0);
            for a in [axis::X, axis::Y, axis::Z] {
                assert!((0.0..=1.0).contains(&s.point.get(a)), "axis {} = {}", a, s.point.get(a));
            }
        }
    }

    #[test]
    fn test_positional_weight_decays() {
        let enc = TextEncoder::default();
        let seeds = enc.encode("aaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        // Identical windows: only position changes the weight.
        let first = seeds[2].coeff.re;
        let later = seeds[6].coeff.re;
        assert!(later < first, "{} !< {}", later, first);
        let tau: Vec<f32> = seeds.iter().map(|s| s.point.get(axis::ANTICIPATION)).collect();
        assert!(tau.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_whitespace_windows_skipped() {
        let enc = TextEncoder::default();
        let seeds = enc.encode("ab        cd").unwrap();
        // windows at 0..8 step 2: "ab  ", "    ", "    ", "    ", "  cd"
        assert_eq!(seeds.len(), 2);
    }

    #[test]
    fn test_deterministic_and_case_insensitive() {
        let enc = TextEncoder::default();
        let a = enc.encode("Continuous Field").unwrap();
        let b = enc.encode("continuous field").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_and_invalid_input() {
        let enc = TextEncoder::default();
        assert!(enc.encode("abc").unwrap().is_empty());
        let bad = TextEncoder {
            stride: 0,
            ..TextEncoder::default()
        };
        assert!(bad.encode("some text").is_err());
        assert_eq!(enc.name(), "text");
    }
}
