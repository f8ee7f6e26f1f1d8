//! Empirical (experimental) semivariogram.
//!
//! Every unordered sample pair closer than `cutoff` contributes its squared
//! value difference to the lag bin `floor(h / bin_width)`:
//! ```text
//! γ(h_k) = Σ (v_i - v_j)² / (2 N_k)
//! ```
//! Bins without pairs are left out of the result rather than zero filled.

use itertools::izip;
use serde::{Deserialize, Serialize};

use crate::error::{KrigingError, Result};
use crate::spatial_database::PointSet;

use self::cpu_calculator::CPUCalculator;

pub mod cpu_calculator;

/// Upper bound on the number of lag bins a single estimate may allocate.
const MAX_BINS: f64 = 1.0e6;

/// One non-empty distance class `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagBin {
    pub lower: f64,
    pub upper: f64,
    /// Mean separation distance of the pairs in the bin.
    pub lag: f64,
    pub semivariance: f64,
    pub pair_count: usize,
}

impl LagBin {
    pub fn mid_point(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmpiricalVariogram {
    pub bins: Vec<LagBin>,
    pub cutoff: f64,
    pub bin_width: f64,
}

impl EmpiricalVariogram {
    /// Wraps externally computed bins, e.g. a variogram table from another
    /// tool. Bins must be non-empty, ordered by lag and carry at least one
    /// pair each.
    pub fn from_bins(bins: Vec<LagBin>, cutoff: f64, bin_width: f64) -> Result<Self> {
        if bins.is_empty() {
            return Err(KrigingError::InsufficientData {
                context: "empirical variogram bins",
                required: 1,
                provided: 0,
            });
        }
        if let Some(bad) = bins
            .iter()
            .find(|b| b.pair_count == 0 || !(b.semivariance.is_finite() && b.semivariance >= 0.0))
        {
            return Err(KrigingError::invalid(
                "semivariance",
                bad.semivariance,
                "bins need a positive pair count and a finite non-negative semivariance",
            ));
        }
        Ok(Self {
            bins,
            cutoff,
            bin_width,
        })
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn lags(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.lag).collect()
    }

    pub fn semivariances(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.semivariance).collect()
    }

    pub fn pair_counts(&self) -> Vec<usize> {
        self.bins.iter().map(|b| b.pair_count).collect()
    }

    pub fn total_pairs(&self) -> usize {
        self.bins.iter().map(|b| b.pair_count).sum()
    }

    pub fn max_semivariance(&self) -> f64 {
        self.bins
            .iter()
            .map(|b| b.semivariance)
            .fold(0.0, f64::max)
    }

    pub fn max_lag(&self) -> f64 {
        self.bins.iter().map(|b| b.lag).fold(0.0, f64::max)
    }
}

/// Distance classes used by the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariogramBinning {
    pub cutoff: f64,
    pub bin_width: f64,
}

impl VariogramBinning {
    pub fn new(cutoff: f64, bin_width: f64) -> Result<Self> {
        validate_binning(cutoff, bin_width)?;
        Ok(Self { cutoff, bin_width })
    }

    /// Defaults derived from the sample extent: a cutoff of one third of the
    /// bounding box diagonal split into 15 bins.
    pub fn from_extent(samples: &PointSet) -> Result<Self> {
        let diagonal = samples
            .diagonal()
            .filter(|d| *d > 0.0)
            .ok_or_else(|| KrigingError::InsufficientData {
                context: "variogram binning (distinct sample positions)",
                required: 2,
                provided: samples.n_distinct_positions(),
            })?;
        let cutoff = diagonal / 3.0;
        Self::new(cutoff, cutoff / 15.0)
    }
}

fn validate_binning(cutoff: f64, bin_width: f64) -> Result<()> {
    if !(cutoff.is_finite() && cutoff > 0.0) {
        return Err(KrigingError::invalid(
            "cutoff",
            cutoff,
            "must be finite and strictly positive",
        ));
    }
    if !(bin_width.is_finite() && bin_width > 0.0) {
        return Err(KrigingError::invalid(
            "bin_width",
            bin_width,
            "must be finite and strictly positive",
        ));
    }
    if cutoff / bin_width > MAX_BINS {
        return Err(KrigingError::invalid(
            "bin_width",
            bin_width,
            "too small for the cutoff (more than 1e6 lag bins)",
        ));
    }
    Ok(())
}

/// Computes the empirical semivariogram of `samples` up to `cutoff`.
///
/// Fails with `InsufficientData` when fewer than two distinct positions are
/// available or no pair falls within the cutoff, and with
/// `InvalidParameter` for a non-positive `cutoff` or `bin_width`.
pub fn estimate_empirical_variogram(
    samples: &PointSet,
    cutoff: f64,
    bin_width: f64,
) -> Result<EmpiricalVariogram> {
    validate_binning(cutoff, bin_width)?;

    let n_distinct = samples.n_distinct_positions();
    if samples.len() < 2 || n_distinct < 2 {
        return Err(KrigingError::InsufficientData {
            context: "empirical variogram (distinct sample positions)",
            required: 2,
            provided: n_distinct,
        });
    }

    let calculator = CPUCalculator::new(samples.samples(), cutoff, bin_width);
    let acc = calculator.accumulate();

    let bins = izip!(acc.sq_diff.iter(), acc.dist.iter(), acc.counts.iter())
        .enumerate()
        .filter(|(_, (_, _, count))| **count > 0)
        .map(|(k, (sq_diff, dist, count))| {
            let n = *count as f64;
            LagBin {
                lower: k as f64 * bin_width,
                upper: (k + 1) as f64 * bin_width,
                lag: dist / n,
                semivariance: sq_diff / (2.0 * n),
                pair_count: *count,
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        samples = samples.len(),
        pairs = acc.total_pairs(),
        bins = calculator.n_bins(),
        non_empty = bins.len(),
        "estimated empirical variogram"
    );

    if bins.is_empty() {
        return Err(KrigingError::InsufficientData {
            context: "empirical variogram bins",
            required: 1,
            provided: 0,
        });
    }

    Ok(EmpiricalVariogram {
        bins,
        cutoff,
        bin_width,
    })
}

pub fn estimate_with_binning(
    samples: &PointSet,
    binning: &VariogramBinning,
) -> Result<EmpiricalVariogram> {
    estimate_empirical_variogram(samples, binning.cutoff, binning.bin_width)
}
