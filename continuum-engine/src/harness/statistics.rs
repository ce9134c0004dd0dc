// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Sample statistics for repeated engine trials
//!
//! All tests are two-sided Student-t tests on sample (n − 1) variances:
//!
//!   one-sample   t = (x̄ − μ₀) / (s/√n),                df = n − 1
//!   two-sample   t = (x̄₁ − x̄₂) / √(s_p²(1/n₁ + 1/n₂)),  df = n₁ + n₂ − 2
//!   Cohen's d    (x̄₁ − x̄₂) / s_p

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// p below this is significant.
pub const SIGNIFICANCE_LEVEL: f64 = 0.001;

/// Inter-run variance below this counts as reproducible.
pub const REPRODUCIBLE_VARIANCE: f64 = 0.001;

fn mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Unbiased sample variance; callers guarantee n ≥ 2.
fn variance(samples: &[f64], mean: f64) -> f64 {
    samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (samples.len() - 1) as f64
}

fn check_samples(samples: &[f64], min: usize, what: &str) -> Result<()> {
    if samples.len() < min {
        bail!("{} needs at least {} samples, got {}", what, min, samples.len());
    }
    if let Some(bad) = samples.iter().find(|x| !x.is_finite()) {
        bail!("{} got non-finite sample {}", what, bad);
    }
    Ok(())
}

fn t_distribution(df: f64) -> Result<StudentsT> {
    StudentsT::new(0.0, 1.0, df).map_err(|e| anyhow!("student-t with {} degrees of freedom: {}", df, e))
}

/// Two-sided p-value of t under `dist`.
fn two_sided_p(dist: &StudentsT, t: f64) -> f64 {
    if t.is_infinite() {
        return 0.0;
    }
    (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0)
}

/// One-sample summary against a null mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticalRun {
    pub mean: f64,
    pub std_dev: f64,
    pub ci95: (f64, f64),
    pub ci99: (f64, f64),
    pub t_statistic: f64,
    pub p_value: f64,
    pub n: usize,
    pub is_significant: bool,
}

impl StatisticalRun {
    /// Mean, confidence intervals and a t-test of H₀: μ = `null_mean`.
    pub fn from_samples(samples: &[f64], null_mean: f64) -> Result<Self> {
        check_samples(samples, 2, "statistical run")?;
        let n = samples.len();
        let m = mean(samples);
        let sd = variance(samples, m).sqrt();
        let se = sd / (n as f64).sqrt();
        let dist = t_distribution((n - 1) as f64)?;

        let interval = |confidence: f64| {
            let margin = dist.inverse_cdf(1.0 - (1.0 - confidence) / 2.0) * se;
            (m - margin, m + margin)
        };

        let (t_statistic, p_value) = if se == 0.0 {
            // Constant samples: either exactly the null or infinitely far from it.
            if m == null_mean {
                (0.0, 1.0)
            } else {
                (f64::INFINITY.copysign(m - null_mean), 0.0)
            }
        } else {
            let t = (m - null_mean) / se;
            (t, two_sided_p(&dist, t))
        };

        Ok(Self {
            mean: m,
            std_dev: sd,
            ci95: interval(0.95),
            ci99: interval(0.99),
            t_statistic,
            p_value,
            n,
            is_significant: p_value < SIGNIFICANCE_LEVEL,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwoSampleTest {
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    /// Two-sided critical |t| at the requested alpha
    pub critical_value: f64,
    pub effect_size: f64,
    pub reject_null: bool,
}

/// Pooled standard deviation of two samples (each n ≥ 2).
fn pooled_std_dev(a: &[f64], b: &[f64]) -> f64 {
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let pooled = ((na - 1.0) * variance(a, mean(a)) + (nb - 1.0) * variance(b, mean(b))) / (na + nb - 2.0);
    pooled.sqrt()
}

/// Cohen's d; zero when both samples are constant.
pub fn cohens_d(a: &[f64], b: &[f64]) -> Result<f64> {
    check_samples(a, 2, "cohen's d")?;
    check_samples(b, 2, "cohen's d")?;
    let sp = pooled_std_dev(a, b);
    Ok(if sp > 0.0 { (mean(a) - mean(b)) / sp } else { 0.0 })
}

/// Pooled-variance two-sample t-test of H₀: μ_a = μ_b.
pub fn two_sample_t_test(a: &[f64], b: &[f64], alpha: f64) -> Result<TwoSampleTest> {
    check_samples(a, 2, "two-sample t-test")?;
    check_samples(b, 2, "two-sample t-test")?;
    if !(alpha > 0.0 && alpha < 1.0) {
        bail!("alpha must lie in (0, 1), got {}", alpha);
    }
    let df = (a.len() + b.len() - 2) as f64;
    let dist = t_distribution(df)?;
    let sp = pooled_std_dev(a, b);
    let diff = mean(a) - mean(b);
    let se = sp * (1.0 / a.len() as f64 + 1.0 / b.len() as f64).sqrt();

    let t = if se > 0.0 {
        diff / se
    } else if diff == 0.0 {
        0.0
    } else {
        f64::INFINITY.copysign(diff)
    };
    let critical_value = dist.inverse_cdf(1.0 - alpha / 2.0);
    let p_value = two_sided_p(&dist, t);
    Ok(TwoSampleTest {
        t_statistic: t,
        degrees_of_freedom: df,
        p_value,
        critical_value,
        effect_size: if sp > 0.0 { diff / sp } else { 0.0 },
        reject_null: t.abs() > critical_value,
    })
}

/// Shape of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionAnalysis {
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub skewness: f64,
    pub excess_kurtosis: f64,
    /// |skewness| < 1 and |excess kurtosis| < 1
    pub is_normal: bool,
}

/// Median, nearest-rank quartiles and standardized moments (n ≥ 4).
pub fn analyze_distribution(samples: &[f64]) -> Result<DistributionAnalysis> {
    check_samples(samples, 4, "distribution analysis")?;
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let median = if n % 2 == 0 {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    } else {
        sorted[n / 2]
    };
    let q1 = sorted[n / 4];
    let q3 = sorted[3 * n / 4];

    let m = mean(samples);
    let sd = variance(samples, m).sqrt();
    let (skewness, excess_kurtosis) = if sd > 0.0 {
        let z = |x: &f64| (x - m) / sd;
        let skew = samples.iter().map(|x| z(x).powi(3)).sum::<f64>() / n as f64;
        let kurt = samples.iter().map(|x| z(x).powi(4)).sum::<f64>() / n as f64 - 3.0;
        (skew, kurt)
    } else {
        (0.0, 0.0)
    };

    Ok(DistributionAnalysis {
        median,
        q1,
        q3,
        iqr: q3 - q1,
        skewness,
        excess_kurtosis,
        is_normal: skewness.abs() < 1.0 && excess_kurtosis.abs() < 1.0,
    })
}

/// Agreement between the means of independent runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reproducibility {
    pub inter_run_variance: f64,
    pub coefficient_of_variation: f64,
    /// clamp(1 − variance / mean², 0, 1); 1 when the mean is zero
    pub score: f64,
    pub is_reproducible: bool,
}

pub fn reproducibility(run_means: &[f64]) -> Result<Reproducibility> {
    check_samples(run_means, 2, "reproducibility")?;
    let m = mean(run_means);
    let var = variance(run_means, m);
    let worst = m * m;
    Ok(Reproducibility {
        inter_run_variance: var,
        coefficient_of_variation: if m != 0.0 { var.sqrt() / m.abs() } else { 0.0 },
        score: if worst > 0.0 { (1.0 - var / worst).clamp(0.0, 1.0) } else { 1.0 },
        is_reproducible: var < REPRODUCIBLE_VARIANCE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_sample_known_values() {
        let run = StatisticalRun::from_samples(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.0).unwrap();
        assert_eq!(run.n, 5);
        assert!((run.mean - 3.0).abs() < 1e-12);
        assert!((run.std_dev - 2.5f64.sqrt()).abs() < 1e-12);
        assert!((run.t_statistic - 4.2426).abs() < 1e-3, "t = {}", run.t_statistic);
        // t(4) two-sided
        assert!((run.p_value - 0.0132).abs() < 1e-3, "p = {}", run.p_value);
        assert!(!run.is_significant);
        // t_crit(4, 0.975) = 2.776
        assert!((run.ci95.0 - 1.037).abs() < 1e-2, "ci95 {:?}", run.ci95);
        assert!((run.ci95.1 - 4.963).abs() < 1e-2, "ci95 {:?}", run.ci95);
        assert!(run.ci99.0 < run.ci95.0 && run.ci99.1 > run.ci95.1);
    }

    #[test]
    fn test_one_sample_significance() {
        let samples: Vec<f64> = (0..30).map(|i| 0.8 + 0.01 * ((i % 5) as f64 - 2.0)).collect();
        let run = StatisticalRun::from_samples(&samples, 0.5).unwrap();
        assert!(run.is_significant, "p = {}", run.p_value);
        assert!(run.ci95.0 > 0.5);

        let flat = StatisticalRun::from_samples(&[0.5; 4], 0.5).unwrap();
        assert_eq!(flat.p_value, 1.0);
        let off = StatisticalRun::from_samples(&[0.5; 4], 0.2).unwrap();
        assert_eq!(off.p_value, 0.0);
        assert!(off.is_significant);

        assert!(StatisticalRun::from_samples(&[1.0], 0.0).is_err());
        assert!(StatisticalRun::from_samples(&[1.0, f64::NAN], 0.0).is_err());
    }

    #[test]
    fn test_two_sample_and_effect_size() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [3.0, 4.0, 5.0, 6.0, 7.0];
        let test = two_sample_t_test(&a, &b, 0.05).unwrap();
        assert!((test.t_statistic + 2.0).abs() < 1e-12);
        assert_eq!(test.degrees_of_freedom, 8.0);
        // t(8) two-sided at |t| = 2
        assert!((test.p_value - 0.0805).abs() < 2e-3, "p = {}", test.p_value);
        assert!((test.critical_value - 2.306).abs() < 1e-2);
        assert!(!test.reject_null);

        let d = cohens_d(&a, &b).unwrap();
        assert!((d + 2.0 / 2.5f64.sqrt()).abs() < 1e-12, "d = {}", d);
        assert!((test.effect_size - d).abs() < 1e-12);
        assert_eq!(cohens_d(&[1.0, 1.0], &[2.0, 2.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_distribution_analysis() {
        let samples: Vec<f64> = (1..=8).map(f64::from).collect();
        let dist = analyze_distribution(&samples).unwrap();
        assert_eq!(dist.median, 4.5);
        assert_eq!(dist.q1, 3.0);
        assert_eq!(dist.q3, 7.0);
        assert_eq!(dist.iqr, 4.0);
        assert!(dist.skewness.abs() < 1e-12);
        // Flat samples have negative excess kurtosis.
        assert!(dist.excess_kurtosis < 0.0);

        let mut skewed = vec![0.0; 9];
        skewed.push(10.0);
        assert!(analyze_distribution(&skewed).unwrap().skewness > 1.0);
        assert!(analyze_distribution(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_reproducibility() {
        let same = reproducibility(&[0.5, 0.5, 0.5]).unwrap();
        assert_eq!(same.score, 1.0);
        assert_eq!(same.inter_run_variance, 0.0);
        assert!(same.is_reproducible);

        let spread = reproducibility(&[1.0, 3.0]).unwrap();
        assert!((spread.inter_run_variance - 2.0).abs() < 1e-12);
        assert!((spread.score - 0.5).abs() < 1e-12);
        assert!(!spread.is_reproducible);

        assert_eq!(reproducibility(&[-1.0, 1.0]).unwrap().score, 1.0);
    }
}
