use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::spatial_database::SamplePoint;

/// Per-bin running sums of pair distances and squared value differences.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BinAccumulator {
    pub sq_diff: Vec<f64>,
    pub dist: Vec<f64>,
    pub counts: Vec<usize>,
}

impl BinAccumulator {
    pub fn new(n_bins: usize) -> Self {
        Self {
            sq_diff: vec![0.0; n_bins],
            dist: vec![0.0; n_bins],
            counts: vec![0; n_bins],
        }
    }

    #[inline(always)]
    fn push(&mut self, bin: usize, h: f64, sq_diff: f64) {
        self.sq_diff[bin] += sq_diff;
        self.dist[bin] += h;
        self.counts[bin] += 1;
    }

    fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.sq_diff.iter_mut().zip(other.sq_diff) {
            *a += b;
        }
        for (a, b) in self.dist.iter_mut().zip(other.dist) {
            *a += b;
        }
        for (a, b) in self.counts.iter_mut().zip(other.counts) {
            *a += b;
        }
        self
    }

    pub fn total_pairs(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Brute force pair loop over all unordered sample pairs.
pub(crate) struct CPUCalculator<'a> {
    samples: &'a [SamplePoint],
    cutoff: f64,
    bin_width: f64,
    n_bins: usize,
}

impl<'a> CPUCalculator<'a> {
    pub fn new(samples: &'a [SamplePoint], cutoff: f64, bin_width: f64) -> Self {
        // a pair at exactly `cutoff` lands in bin floor(cutoff / bin_width)
        let n_bins = (cutoff / bin_width).floor() as usize + 1;
        Self {
            samples,
            cutoff,
            bin_width,
            n_bins,
        }
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    #[inline(always)]
    fn bin_index(&self, h: f64) -> usize {
        ((h / self.bin_width).floor() as usize).min(self.n_bins - 1)
    }

    pub fn accumulate(&self) -> BinAccumulator {
        let n = self.samples.len();
        (0..n)
            .into_par_iter()
            .fold(
                || BinAccumulator::new(self.n_bins),
                |mut acc, i| {
                    let anchor = &self.samples[i];
                    for pair in &self.samples[i + 1..] {
                        let h = anchor.distance_to(&pair.position);
                        if h > self.cutoff {
                            continue;
                        }
                        let diff = anchor.value - pair.value;
                        acc.push(self.bin_index(h), h, diff * diff);
                    }
                    acc
                },
            )
            .reduce(|| BinAccumulator::new(self.n_bins), BinAccumulator::merge)
    }
}
