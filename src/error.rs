// src/error.rs
use core::fmt;

/// Library-wide error for tdigest-tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DigestError {
    /// A percentile/rank probe outside `[0, 1]`.
    InvalidPercentile { p: f64 },

    /// User tried to insert NaN/±inf into the digest.
    /// `context` pinpoints where it came from (e.g., "observation value", "wire mean").
    NonFiniteInput { context: &'static str },

    /// A pushed weight was non-finite or not strictly positive.
    InvalidWeight { weight: f64 },

    /// Decoding encountered a format tag this library does not understand.
    UnknownFormat { tag: u32 },

    /// A centroid weight needs more than six continuation bytes in the
    /// compact encoding.
    VarIntOverflow { weight: u64 },

    /// Decoded bytes disagree with their own header (truncation, trailing
    /// bytes, length mismatch, bad compression factor, over-wide varint).
    CorruptData { what: &'static str },
}

impl fmt::Display for DigestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestError::InvalidPercentile { p } => {
                write!(f, "tdigest: percentile probe must lie in [0, 1], got {}", p)
            }
            DigestError::NonFiniteInput { context } => write!(
                f,
                "tdigest: non-finite values are not allowed ({}). \
hint: clean your data or drop NaN/±inf before pushing",
                context
            ),
            DigestError::InvalidWeight { weight } => write!(
                f,
                "tdigest: observation weight must be finite and > 0, got {}",
                weight
            ),
            DigestError::UnknownFormat { tag } => {
                write!(f, "tdigest: unknown wire format tag: {}", tag)
            }
            DigestError::VarIntOverflow { weight } => write!(
                f,
                "tdigest: centroid weight {} is too large for the compact encoding",
                weight
            ),
            DigestError::CorruptData { what } => {
                write!(f, "tdigest: corrupt wire data: {}", what)
            }
        }
    }
}

impl std::error::Error for DigestError {}

pub type DigestResult<T> = Result<T, DigestError>;
