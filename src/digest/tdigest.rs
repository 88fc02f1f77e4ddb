// src/digest/tdigest.rs
use std::ops::Add;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::digest::centroid::Centroid;
use crate::digest::index::CentroidIndex;
use crate::error::{DigestError, DigestResult};
use crate::ttrace;

/// Streaming quantile digest over weighted centroids.
///
/// Observations are folded into a bounded set of centroids held in an ordered
/// index keyed by mean. Rank and percentile queries read cumulative weights
/// that are recomputed lazily; insertion order pathologies (sorted input) are
/// broken up by replaying the centroids in random order.
///
/// - `delta` is the inverse of the compression factor: smaller delta keeps
///   more centroids and tracks the distribution more closely.
/// - `k` bounds the centroid count at `k / delta` before a rebuild.
/// - `cx` controls how often cumulative statistics are refreshed between
///   queries (growth factor of the total weight).
///
/// A digest owns its randomness: pass a seed through the builder to make
/// centroid layouts, and therefore serialized bytes, reproducible.
#[derive(Debug, Clone)]
pub struct TDigest {
    centroids: CentroidIndex,
    delta: f64,
    k: f64,
    cx: f64,
    total_weight: f64,
    last_cumulate: f64,
    resets: u64,
    rng: StdRng,
}

impl Default for TDigest {
    fn default() -> Self {
        TDigestBuilder::new().build()
    }
}

impl PartialEq for TDigest {
    fn eq(&self, other: &Self) -> bool {
        // `rng` is excluded: `StdRng` is not comparable and is not part of the
        // digest's observable state.
        self.centroids == other.centroids
            && self.delta == other.delta
            && self.k == other.k
            && self.cx == other.cx
            && self.total_weight == other.total_weight
            && self.last_cumulate == other.last_cumulate
            && self.resets == other.resets
    }
}

/* =============================================================================
 * Builder
 * ============================================================================= */

/// Builder for [`TDigest`].
#[derive(Debug, Clone)]
pub struct TDigestBuilder {
    delta: f64,
    k: f64,
    cx: f64,
    seed: Option<u64>,
}

impl Default for TDigestBuilder {
    fn default() -> Self {
        Self {
            delta: 0.01,
            k: 25.0,
            cx: 1.1,
            seed: None,
        }
    }
}

impl TDigestBuilder {
    /// Create a new builder with defaults (`delta=0.01`, `k=25`, `cx=1.1`).
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the accuracy parameter (inverse of the compression factor).
    #[inline]
    pub fn delta(mut self, delta: f64) -> Self {
        debug_assert!(delta.is_finite() && delta > 0.0);
        self.delta = delta;
        self
    }

    /// Set the size-growth limit used to trigger a rebuild.
    #[inline]
    pub fn k(mut self, k: f64) -> Self {
        debug_assert!(k.is_finite() && k > 0.0);
        self.k = k;
        self
    }

    /// Set the growth-factor threshold for refreshing cumulative statistics.
    #[inline]
    pub fn cx(mut self, cx: f64) -> Self {
        debug_assert!(cx.is_finite() && cx > 0.0);
        self.cx = cx;
        self
    }

    /// Seed the digest's random source so compression replay order, centroid
    /// layout and serialized bytes are reproducible.
    #[inline]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> TDigest {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        TDigest {
            centroids: CentroidIndex::default(),
            delta: self.delta,
            k: self.k,
            cx: self.cx,
            total_weight: 0.0,
            last_cumulate: 0.0,
            resets: 0,
            rng,
        }
    }
}

/* =============================================================================
 * Construction & accessors
 * ============================================================================= */

impl TDigest {
    /// A digest with explicit parameters and OS-seeded randomness.
    pub fn new(delta: f64, k: f64, cx: f64) -> Self {
        Self::builder().delta(delta).k(k).cx(cx).build()
    }

    /// Entry point for fluent construction.
    #[inline]
    pub fn builder() -> TDigestBuilder {
        TDigestBuilder::new()
    }

    #[inline]
    pub fn delta(&self) -> f64 {
        self.delta
    }

    #[inline]
    pub fn k(&self) -> f64 {
        self.k
    }

    #[inline]
    pub fn cx(&self) -> f64 {
        self.cx
    }

    /// The compression factor, `1 / delta`.
    #[inline]
    pub fn compression(&self) -> f64 {
        1.0 / self.delta
    }

    /// Total weight (∑w). For unit-weight pushes this is the observation count.
    #[inline]
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    #[inline]
    pub fn centroid_count(&self) -> usize {
        self.centroids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    /// How many times the digest has been rebuilt from scratch. Diagnostic.
    #[inline]
    pub fn reset_count(&self) -> u64 {
        self.resets
    }

    /// Ascending-mean traversal of the centroids.
    #[inline]
    pub fn centroids(&self) -> impl Iterator<Item = &Centroid> {
        self.centroids.iter()
    }

    /// The centroids as a vector, in ascending-mean order.
    pub fn to_vec(&self) -> Vec<Centroid> {
        self.centroids.iter().copied().collect()
    }

    /// Drop all centroids and cumulative bookkeeping; parameters survive.
    pub fn reset(&mut self) {
        self.centroids.clear();
        self.total_weight = 0.0;
        self.last_cumulate = 0.0;
        self.resets += 1;
    }
}

/* =============================================================================
 * Ingestion
 * ============================================================================= */

impl TDigest {
    /// Insert one observation with unit weight.
    #[inline]
    pub fn push(&mut self, value: f64) -> DigestResult<()> {
        self.push_weighted(value, 1.0)
    }

    /// Insert one observation with the given weight.
    pub fn push_weighted(&mut self, value: f64, weight: f64) -> DigestResult<()> {
        if !value.is_finite() {
            return Err(DigestError::NonFiniteInput {
                context: "observation value",
            });
        }
        if !weight.is_finite() || weight <= 0.0 {
            return Err(DigestError::InvalidWeight { weight });
        }
        self.insert_weighted(value, weight);
        Ok(())
    }

    /// Insert a batch of unit-weight observations.
    pub fn push_all<I>(&mut self, values: I) -> DigestResult<()>
    where
        I: IntoIterator<Item = f64>,
    {
        for v in values {
            self.push(v)?;
        }
        Ok(())
    }

    /// Replay another digest's centroid as one weighted point.
    #[inline]
    pub fn push_centroid(&mut self, c: &Centroid) {
        self.insert_weighted(c.mean(), c.weight());
    }

    /// Centroid whose mean is closest to `x`, or `None` on an empty digest.
    /// The lower neighbor wins an exact distance tie.
    pub fn find_nearest(&self, x: f64) -> Option<Centroid> {
        let floor = self.centroids.floor(x).copied();
        let ceil = self.centroids.ceil(x).copied();
        match (floor, ceil) {
            (None, None) => None,
            (Some(f), None) => Some(f),
            (None, Some(c)) => Some(c),
            (Some(f), Some(c)) => {
                if (c.mean() - x).abs() < (f.mean() - x).abs() {
                    Some(c)
                } else {
                    Some(f)
                }
            }
        }
    }

    /// Core insertion: merge `(x, weight)` into the nearest centroid when its
    /// capacity bound allows, otherwise open a new centroid.
    fn insert_weighted(&mut self, x: f64, weight: f64) {
        let min_mean = self.centroids.first().map(|c| c.mean());
        let max_mean = self.centroids.last().map(|c| c.mean());

        match self.find_nearest(x) {
            // Identical mean: merging never skews any density estimate.
            Some(nearest) if nearest.mean() == x => {
                self.add_weight(nearest.mean(), x, weight);
            }
            // A point landing nearest to a boundary centroid opens its own
            // centroid instead of fattening the boundary, keeping resolution
            // at the tails where single points matter most.
            Some(nearest) if Some(nearest.mean()) == min_mean => {
                self.new_centroid(x, weight, 0.0);
            }
            Some(nearest) if Some(nearest.mean()) == max_mean => {
                let seed = self.total_weight;
                self.new_centroid(x, weight, seed);
            }
            Some(nearest) => {
                let nearest_mean = nearest.mean();
                let mean_cumn = match nearest.mean_cumn() {
                    Some(mc) => mc,
                    None => {
                        // The neighbor was created after the last cumulation
                        // pass; refresh before trusting its midpoint weight.
                        self.cumulate(true, true);
                        self.centroids
                            .get(nearest_mean)
                            .and_then(|c| c.mean_cumn())
                            .unwrap_or(0.0)
                    }
                };
                // Capacity bound: centroids near the median may grow large,
                // centroids near the tails must stay small.
                let p = mean_cumn / self.total_weight;
                let max_weight =
                    (4.0 * self.total_weight * self.delta * p * (1.0 - p)).floor();
                if max_weight - nearest.weight() >= weight {
                    self.add_weight(nearest_mean, x, weight);
                } else {
                    let seed = self
                        .centroids
                        .get(nearest_mean)
                        .map_or(0.0, |c| c.cumn());
                    self.new_centroid(x, weight, seed);
                }
            }
            None => self.new_centroid(x, weight, 0.0),
        }

        self.cumulate(false, false);

        // Sorted input tends to open one centroid per point; replaying in
        // random order knocks the count back down.
        if self.centroids.len() as f64 > self.k / self.delta {
            self.compress();
        }
    }

    /// Fold `(x, weight)` into the centroid currently keyed at `key`,
    /// re-keying the entry if the merge moves its mean.
    fn add_weight(&mut self, key: f64, x: f64, weight: f64) {
        let needs_pass = self
            .centroids
            .get(key)
            .is_some_and(|c| c.mean_cumn().is_none());
        if needs_pass {
            self.cumulate(true, true);
        }

        let Some(mut c) = self.centroids.remove(key) else {
            debug_assert!(false, "add_weight target vanished from the index");
            return;
        };
        if x != c.mean {
            // Exact incremental mean update, not an approximation.
            c.mean += weight * (x - c.mean) / (c.weight + weight);
        }
        c.cumn += weight;
        if let Some(mc) = c.mean_cumn.as_mut() {
            *mc += weight / 2.0;
        }
        c.weight += weight;
        self.centroids.insert_or_fold(c);
        self.total_weight += weight;
    }

    fn new_centroid(&mut self, x: f64, weight: f64, cumn: f64) {
        let replaced = self.centroids.insert(Centroid::with_cumn(x, weight, cumn));
        debug_assert!(replaced.is_none(), "new centroid collided with an existing mean");
        self.total_weight += weight;
    }

    /// Recompute `cumn`/`mean_cumn` along ascending means.
    ///
    /// The pass is skipped while the total weight has grown by less than the
    /// `cx` factor since the last pass, unless `exact` demands current
    /// statistics or `force` bypasses the bookkeeping entirely. With no pass
    /// on record yet the growth factor is treated as infinite.
    fn cumulate(&mut self, exact: bool, force: bool) {
        if !force {
            if self.total_weight == self.last_cumulate {
                return;
            }
            if !exact {
                let growth = if self.last_cumulate == 0.0 {
                    f64::INFINITY
                } else {
                    self.total_weight / self.last_cumulate
                };
                if self.cx > growth {
                    return;
                }
            }
        }

        let mut cumn = 0.0;
        for c in self.centroids.iter_mut() {
            c.mean_cumn = Some(cumn + c.weight / 2.0);
            cumn += c.weight;
            c.cumn = cumn;
        }
        self.total_weight = cumn;
        self.last_cumulate = cumn;
    }

    /// Rebuild the digest by replaying all centroids in uniformly random
    /// order. Breaks the one-centroid-per-point growth that sorted input
    /// produces.
    pub fn compress(&mut self) {
        let before = self.centroids.len();
        let mut points = self.centroids.drain();
        self.reset();
        points.shuffle(&mut self.rng);
        for c in points {
            self.insert_weighted(c.mean(), c.weight());
        }
        self.cumulate(true, false);
        ttrace!("compress: {} -> {} centroids", before, self.centroids.len());
    }
}

/* =============================================================================
 * Queries
 * ============================================================================= */

impl TDigest {
    /// Estimated value at rank `p ∈ [0, 1]`, or `None` on an empty digest.
    ///
    /// On a non-exact match the answer is the upper bounding centroid's mean;
    /// this query deliberately does not interpolate, unlike [`TDigest::p_rank`].
    pub fn percentile(&mut self, p: f64) -> DigestResult<Option<f64>> {
        if !(0.0..=1.0).contains(&p) {
            return Err(DigestError::InvalidPercentile { p });
        }
        if self.centroids.is_empty() {
            return Ok(None);
        }
        self.cumulate(true, false);

        let target = self.total_weight * p;
        Ok(match self.bound_mean_cumn(target) {
            (None, None) => None,
            (Some(c), None) | (None, Some(c)) => Some(c.mean()),
            (Some(_), Some(upper)) => Some(upper.mean()),
        })
    }

    /// Batch percentile query. Every probe is validated before anything is
    /// computed, so a bad probe never leaves the digest half-queried.
    pub fn percentiles(&mut self, ps: &[f64]) -> DigestResult<Vec<Option<f64>>> {
        for &p in ps {
            if !(0.0..=1.0).contains(&p) {
                return Err(DigestError::InvalidPercentile { p });
            }
        }
        ps.iter().map(|&p| self.percentile(p)).collect()
    }

    /// Estimated fraction of total weight at or below `x`, or `None` on an
    /// empty digest. Interpolates linearly between the bounding centroids.
    pub fn p_rank(&mut self, x: f64) -> Option<f64> {
        let min = self.centroids.first().map(|c| c.mean())?;
        let max = self
            .centroids
            .last()
            .map(|c| c.mean())
            .unwrap_or(min);

        if x < min {
            return Some(0.0);
        }
        if x > max {
            return Some(1.0);
        }
        self.cumulate(true, false);

        let lower = self.centroids.floor(x).copied()?;
        let upper = self.centroids.ceil(x).copied()?;

        let lower_mc = lower.mean_cumn().unwrap_or(0.0);
        let mut mean_cumn = lower_mc;
        if lower.mean() != upper.mean() {
            let upper_mc = upper.mean_cumn().unwrap_or(0.0);
            mean_cumn += (x - lower.mean()) * (upper_mc - lower_mc)
                / (upper.mean() - lower.mean());
        }
        Some(mean_cumn / self.total_weight)
    }

    /// Batch rank query.
    pub fn p_ranks(&mut self, xs: &[f64]) -> Vec<Option<f64>> {
        xs.iter().map(|&x| self.p_rank(x)).collect()
    }

    /// Centroids bracketing the target cumulative weight, scanning ascending.
    ///
    /// An exact `mean_cumn` hit returns that centroid alone; overshooting
    /// returns the previous and current centroids; running off the end
    /// returns the last centroid alone.
    fn bound_mean_cumn(&self, target: f64) -> (Option<Centroid>, Option<Centroid>) {
        let mut last: Option<Centroid> = None;
        for c in self.centroids.iter() {
            let mc = c.mean_cumn().unwrap_or(0.0);
            if mc == target {
                return (Some(*c), None);
            }
            if mc > target {
                return (last, Some(*c));
            }
            last = Some(*c);
        }
        (last, None)
    }
}

/* =============================================================================
 * Merging
 * ============================================================================= */

impl TDigest {
    /// Combine two digests into a new one configured with `self`'s parameters
    /// and a clone of its random state. Both inputs are left untouched; the
    /// union of their centroids is replayed in random order and compressed.
    pub fn merged(&self, other: &TDigest) -> TDigest {
        let mut out = TDigest {
            centroids: CentroidIndex::default(),
            delta: self.delta,
            k: self.k,
            cx: self.cx,
            total_weight: 0.0,
            last_cumulate: 0.0,
            resets: 0,
            rng: self.rng.clone(),
        };
        let mut data: Vec<Centroid> = self
            .centroids
            .iter()
            .chain(other.centroids.iter())
            .copied()
            .collect();
        data.shuffle(&mut out.rng);
        for c in data {
            out.insert_weighted(c.mean(), c.weight());
        }
        out.compress();
        ttrace!(
            "merged: {} + {} -> {} centroids",
            self.centroid_count(),
            other.centroid_count(),
            out.centroid_count()
        );
        out
    }

    /// Fold `other` into `self`, keeping `self`'s parameters.
    pub fn merge(&mut self, other: &TDigest) {
        let merged = self.merged(other);
        self.centroids = merged.centroids;
        self.total_weight = merged.total_weight;
        self.last_cumulate = merged.last_cumulate;
        self.compress();
    }
}

impl Add<&TDigest> for &TDigest {
    type Output = TDigest;

    fn add(self, rhs: &TDigest) -> TDigest {
        self.merged(rhs)
    }
}

impl Add for TDigest {
    type Output = TDigest;

    fn add(self, rhs: TDigest) -> TDigest {
        self.merged(&rhs)
    }
}

/* =============================================================================
 * Tests
 * ============================================================================= */
