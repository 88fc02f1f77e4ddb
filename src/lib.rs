//! Mergeable streaming quantile digest backed by an ordered centroid tree.
//!
//! A [`TDigest`] folds a stream of weighted observations into a bounded set
//! of centroids and answers approximate percentile and rank queries from
//! them. Summaries built on independent shards merge into one digest without
//! losing the accuracy guarantees, and two binary wire formats plus a JSON
//! projection move digests between processes.
//!
//! ```
//! use tdigest_tree::TDigest;
//!
//! let mut digest = TDigest::builder().seed(42).build();
//! digest.push_all((0..10_000).map(f64::from)).unwrap();
//!
//! let p99 = digest.percentile(0.99).unwrap().unwrap();
//! assert!(p99 > 9_700.0 && p99 < 10_000.0);
//! ```

pub mod digest;
mod error;

pub use digest::{Centroid, CentroidRecord, TDigest, TDigestBuilder};
pub use error::{DigestError, DigestResult};

// Opt-in tracing (cheap unless env var set)
#[macro_export]
macro_rules! ttrace {
    ($($arg:tt)*) => {
        if std::env::var("TDIGEST_TRACE").is_ok() {
            eprintln!($($arg)*);
        }
    }
}
