use serde::{Deserialize, Serialize};

/// A centroid summarizes one or more merged observations as a weighted point.
///
/// `cumn` and `mean_cumn` are cumulative statistics in ascending-mean order.
/// They are only meaningful after a cumulation pass over the whole digest;
/// `mean_cumn` is `None` on a centroid that has never been through one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    pub(crate) mean: f64,
    pub(crate) weight: f64,
    pub(crate) cumn: f64,
    pub(crate) mean_cumn: Option<f64>,
}

impl Centroid {
    /// A fresh centroid for a single weighted point.
    #[inline]
    pub fn new(mean: f64, weight: f64) -> Self {
        Self::with_cumn(mean, weight, 0.0)
    }

    /// A fresh centroid with its cumulative weight seeded by the engine.
    #[inline]
    pub(crate) fn with_cumn(mean: f64, weight: f64, cumn: f64) -> Self {
        debug_assert!(weight > 0.0);
        Centroid {
            mean,
            weight,
            cumn,
            mean_cumn: None,
        }
    }

    /// Weighted average of all points merged into this centroid.
    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Total weight merged into this centroid.
    #[inline]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Cumulative weight of all centroids up to and including this one, in
    /// ascending-mean order. Stale between cumulation passes.
    #[inline]
    pub fn cumn(&self) -> f64 {
        self.cumn
    }

    /// Cumulative weight at this centroid's center (`cumn - weight/2`), or
    /// `None` before the first cumulation pass that saw it.
    #[inline]
    pub fn mean_cumn(&self) -> Option<f64> {
        self.mean_cumn
    }
}

/// Minimal serializable projection of a centroid.
///
/// Cumulative fields are never persisted; they are recomputed after load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CentroidRecord {
    /// Centroid mean.
    pub m: f64,
    /// Centroid weight.
    pub n: f64,
}

impl From<&Centroid> for CentroidRecord {
    #[inline]
    fn from(c: &Centroid) -> Self {
        CentroidRecord {
            m: c.mean(),
            n: c.weight(),
        }
    }
}
