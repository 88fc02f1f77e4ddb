pub mod centroid;
pub mod test_helpers;

// Internal building blocks
mod index;
mod json;
mod tdigest;
mod wire;

// Public surface
pub use centroid::{Centroid, CentroidRecord};
pub use tdigest::{TDigest, TDigestBuilder};
