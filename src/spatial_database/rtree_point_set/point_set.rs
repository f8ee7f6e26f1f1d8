use std::fmt;

use nalgebra::Point2;
use rstar::primitives::GeomWithData;
use rstar::RTree;

use crate::error::{KrigingError, Result};
use crate::spatial_database::sample::SamplePoint;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Sample collection backed by an r-tree over sample positions.
///
/// The set is immutable once built: every operation that changes the
/// membership (e.g. [`PointSet::remove_duplicates`]) returns a new set.
#[derive(Clone)]
pub struct PointSet {
    pub tree: RTree<IndexedPoint>,
    samples: Vec<SamplePoint>,
}

impl PointSet {
    /// Builds a point set, rejecting non-finite coordinates, values or
    /// covariates and samples whose covariate count differs from the first.
    pub fn new(samples: Vec<SamplePoint>) -> Result<Self> {
        if let Some(bad) = samples.iter().find(|s| !s.is_finite()) {
            let value = [bad.x(), bad.y(), bad.value]
                .into_iter()
                .chain(bad.covariates.iter().copied())
                .find(|v| !v.is_finite())
                .unwrap_or(f64::NAN);
            return Err(KrigingError::invalid(
                "sample",
                value,
                "coordinates, values and covariates must be finite",
            ));
        }

        if let Some(first) = samples.first() {
            let n_cov = first.covariates.len();
            if let Some(bad) = samples.iter().find(|s| s.covariates.len() != n_cov) {
                return Err(KrigingError::invalid(
                    "covariates",
                    bad.covariates.len() as f64,
                    "every sample must carry the same number of covariates",
                ));
            }
        }

        Ok(Self::from_validated(samples))
    }

    fn from_validated(samples: Vec<SamplePoint>) -> Self {
        let tree_points = samples
            .iter()
            .enumerate()
            .map(|(i, s)| IndexedPoint::new([s.x(), s.y()], i))
            .collect();
        let tree = RTree::bulk_load(tree_points);

        Self { tree, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[SamplePoint] {
        &self.samples
    }

    pub fn positions(&self) -> Vec<Point2<f64>> {
        self.samples.iter().map(|s| s.position).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    /// Number of covariates carried by each sample (zero when unused).
    pub fn n_covariates(&self) -> usize {
        self.samples.first().map_or(0, |s| s.covariates.len())
    }

    /// All index pairs `(i, j)`, `i < j`, whose positions are within
    /// `tolerance` of each other.
    pub fn zero_distance_pairs(&self, tolerance: f64) -> Vec<(usize, usize)> {
        let tol = tolerance.max(0.0);
        let mut pairs = self
            .samples
            .iter()
            .enumerate()
            .flat_map(|(i, s)| {
                self.tree
                    .locate_within_distance([s.x(), s.y()], tol * tol)
                    .map(|geom| geom.data)
                    .filter(move |j| *j > i)
                    .map(move |j| (i, j))
            })
            .collect::<Vec<_>>();
        pairs.sort_unstable();
        pairs
    }

    /// Keeps the first sample of every group of samples lying within
    /// `tolerance` of each other.
    pub fn remove_duplicates(&self, tolerance: f64) -> PointSet {
        let mut dropped = vec![false; self.len()];
        for (i, j) in self.zero_distance_pairs(tolerance) {
            if !dropped[i] {
                dropped[j] = true;
            }
        }

        let kept = self
            .samples
            .iter()
            .zip(dropped.iter())
            .filter(|(_, d)| !**d)
            .map(|(s, _)| s.clone())
            .collect::<Vec<_>>();

        if kept.len() < self.len() {
            tracing::debug!(
                removed = self.len() - kept.len(),
                kept = kept.len(),
                "removed coincident samples"
            );
        }

        Self::from_validated(kept)
    }

    /// Number of distinct sample positions.
    pub fn n_distinct_positions(&self) -> usize {
        self.remove_duplicates(0.0).len()
    }

    /// Indices of up to `max_neighbors` samples nearest to `point`, closest
    /// first, optionally limited to `max_distance`.
    pub fn nearest(
        &self,
        point: &Point2<f64>,
        max_neighbors: usize,
        max_distance: Option<f64>,
    ) -> Vec<usize> {
        let max_dist_sq = max_distance.map(|d| d * d);
        self.tree
            .nearest_neighbor_iter_with_distance_2(&[point.x, point.y])
            .take_while(|(_, dist_sq)| max_dist_sq.map_or(true, |max| *dist_sq <= max))
            .take(max_neighbors)
            .map(|(geom, _)| geom.data)
            .collect()
    }

    /// Lower-left and upper-right corners of the sample extent.
    pub fn bounding_box(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        let first = self.samples.first()?.position;
        Some(self.samples.iter().fold((first, first), |(lo, hi), s| {
            (
                Point2::new(lo.x.min(s.x()), lo.y.min(s.y())),
                Point2::new(hi.x.max(s.x()), hi.y.max(s.y())),
            )
        }))
    }

    /// Length of the bounding box diagonal.
    pub fn diagonal(&self) -> Option<f64> {
        self.bounding_box().map(|(lo, hi)| nalgebra::distance(&lo, &hi))
    }

    /// A new set without the sample at `index`.
    pub(crate) fn without(&self, index: usize) -> PointSet {
        let samples = self
            .samples
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, s)| s.clone())
            .collect();
        Self::from_validated(samples)
    }
}

impl fmt::Debug for PointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointSet")
            .field("samples", &self.samples)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    fn gen_random_points(n_points: usize, seed: u64) -> Vec<SamplePoint> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n_points)
            .map(|_| {
                SamplePoint::new(
                    rng.gen_range(0.0..1000.0),
                    rng.gen_range(0.0..1000.0),
                    rng.gen_range(0.0..10.0),
                )
            })
            .collect()
    }

    #[test]
    fn rejects_non_finite_samples() {
        let samples = vec![
            SamplePoint::new(0.0, 0.0, 1.0),
            SamplePoint::new(1.0, f64::NAN, 1.0),
        ];
        assert!(matches!(
            PointSet::new(samples),
            Err(KrigingError::InvalidParameter { name: "sample", .. })
        ));
    }

    #[test]
    fn rejects_ragged_covariates() {
        let samples = vec![
            SamplePoint::with_covariates(0.0, 0.0, 1.0, vec![1.0]),
            SamplePoint::new(1.0, 1.0, 1.0),
        ];
        assert!(matches!(
            PointSet::new(samples),
            Err(KrigingError::InvalidParameter {
                name: "covariates",
                ..
            })
        ));
    }

    #[test]
    fn duplicates() {
        let samples = vec![
            SamplePoint::new(0.0, 0.0, 1.0),
            SamplePoint::new(5.0, 5.0, 2.0),
            SamplePoint::new(0.0, 0.0, 3.0),
            SamplePoint::new(5.0, 5.0, 4.0),
            SamplePoint::new(0.0, 0.0, 5.0),
        ];
        let set = PointSet::new(samples).unwrap();

        assert_eq!(
            set.zero_distance_pairs(0.0),
            vec![(0, 2), (0, 4), (1, 3), (2, 4)]
        );

        let dedup = set.remove_duplicates(0.0);
        assert_eq!(dedup.len(), 2);
        assert_eq!(dedup.values(), vec![1.0, 2.0]);
        assert_eq!(set.n_distinct_positions(), 2);
    }

    #[test]
    fn nearest_matches_brute_force() {
        let set = PointSet::new(gen_random_points(500, 7)).unwrap();
        let query = Point2::new(500.0, 500.0);

        let mut brute = (0..set.len()).collect::<Vec<_>>();
        brute.sort_by(|a, b| {
            let da = set.samples()[*a].distance_to(&query);
            let db = set.samples()[*b].distance_to(&query);
            da.partial_cmp(&db).unwrap()
        });

        assert_eq!(set.nearest(&query, 20, None), brute[..20].to_vec());

        let limited = set.nearest(&query, 500, Some(100.0));
        assert!(limited
            .iter()
            .all(|i| set.samples()[*i].distance_to(&query) <= 100.0));
        assert_eq!(limited, brute[..limited.len()].to_vec());
    }

    #[test]
    fn extent() {
        let samples = vec![
            SamplePoint::new(-1.0, 2.0, 0.0),
            SamplePoint::new(2.0, 6.0, 0.0),
            SamplePoint::new(0.0, 3.0, 0.0),
        ];
        let set = PointSet::new(samples).unwrap();
        let (lo, hi) = set.bounding_box().unwrap();
        assert_eq!(lo, Point2::new(-1.0, 2.0));
        assert_eq!(hi, Point2::new(2.0, 6.0));
        assert_relative_eq!(set.diagonal().unwrap(), 5.0);

        assert!(PointSet::new(vec![]).unwrap().bounding_box().is_none());
    }
}
