//! JSON projection of a digest: an ordered sequence of `{m, n}` records.
//!
//! Only means and weights are persisted; cumulative statistics are rebuilt by
//! replaying the records through `push`. Deserialization produces a digest
//! with default parameters, matching the binary decoder's reconstruction
//! behavior for everything the records do not carry.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::digest::centroid::CentroidRecord;
use crate::digest::tdigest::TDigest;
use crate::error::DigestResult;

impl TDigest {
    /// The serializable projection of the centroids, in ascending-mean order.
    pub fn to_records(&self) -> Vec<CentroidRecord> {
        self.centroids().map(CentroidRecord::from).collect()
    }

    /// Rebuild a digest (default parameters) by replaying `{m, n}` records.
    pub fn from_records(records: &[CentroidRecord]) -> DigestResult<TDigest> {
        let mut digest = TDigest::default();
        for r in records {
            digest.push_weighted(r.m, r.n)?;
        }
        Ok(digest)
    }
}

impl Serialize for TDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.centroids().map(CentroidRecord::from))
    }
}

impl<'de> Deserialize<'de> for TDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let records = Vec::<CentroidRecord>::deserialize(deserializer)?;
        TDigest::from_records(&records).map_err(D::Error::custom)
    }
}
