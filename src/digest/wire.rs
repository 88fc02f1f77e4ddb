// src/digest/wire.rs
//
// Binary wire codecs for the digest.
//
// Both encodings share a 16-byte little-endian header:
//
//   0..4   : format tag      (u32)  1 = verbose, 2 = compact
//   4..12  : compression     (f64)  1 / delta
//   12..16 : centroid_count  (u32)
//
// Verbose payload:
//   - centroid_count means   (f64), ascending-mean order
//   - centroid_count weights (u32), same order
//
// Compact payload:
//   - centroid_count delta-encoded means (f32): the first value is the
//     absolute mean, each subsequent value is the difference from the
//     immediately preceding mean
//   - centroid_count weights as 7-bit varints: low groups first, high bit
//     set on every byte but the last; at most six continuation bytes
//
// Decoding rebuilds the digest with `delta = 1/compression` and replays
// `push(mean, weight)` per pair in stored order. Failures never finalize
// a digest.

use crate::digest::tdigest::TDigest;
use crate::error::{DigestError, DigestResult};

const VERBOSE_ENCODING: u32 = 1;
const SMALL_ENCODING: u32 = 2;
const HEADER_LEN: usize = 16;

/// Continuation-byte budget for one varint weight; six continuations plus
/// the final byte cover weights below 2^49.
const MAX_VARINT_CONTINUATIONS: u32 = 6;
const MAX_VARINT_SHIFT: u32 = 7 * MAX_VARINT_CONTINUATIONS;

/* ============================
 * Small helpers
 * ============================ */

#[inline]
fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[inline]
fn write_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[inline]
fn write_f32(buf: &mut Vec<u8>, v: f32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[inline]
fn read_u8(bytes: &[u8], offset: &mut usize) -> DigestResult<u8> {
    let Some(&v) = bytes.get(*offset) else {
        return Err(DigestError::CorruptData {
            what: "truncated payload",
        });
    };
    *offset += 1;
    Ok(v)
}

#[inline]
fn read_u32(bytes: &[u8], offset: &mut usize) -> DigestResult<u32> {
    if *offset + 4 > bytes.len() {
        return Err(DigestError::CorruptData {
            what: "truncated u32",
        });
    }
    let mut arr = [0u8; 4];
    arr.copy_from_slice(&bytes[*offset..*offset + 4]);
    *offset += 4;
    Ok(u32::from_le_bytes(arr))
}

#[inline]
fn read_f32(bytes: &[u8], offset: &mut usize) -> DigestResult<f32> {
    if *offset + 4 > bytes.len() {
        return Err(DigestError::CorruptData {
            what: "truncated f32",
        });
    }
    let mut arr = [0u8; 4];
    arr.copy_from_slice(&bytes[*offset..*offset + 4]);
    *offset += 4;
    Ok(f32::from_le_bytes(arr))
}

#[inline]
fn read_f64(bytes: &[u8], offset: &mut usize) -> DigestResult<f64> {
    if *offset + 8 > bytes.len() {
        return Err(DigestError::CorruptData {
            what: "truncated f64",
        });
    }
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&bytes[*offset..*offset + 8]);
    *offset += 8;
    Ok(f64::from_le_bytes(arr))
}

/// Integerize a centroid weight for the wire: round, saturate into `u32`.
#[inline]
fn weight_to_u32(w: f64) -> u32 {
    let rounded = w.round();
    if rounded <= 0.0 {
        0
    } else if rounded > u32::MAX as f64 {
        u32::MAX
    } else {
        rounded as u32
    }
}

/// Integerize a centroid weight for the varint path: round, saturate into `u64`.
#[inline]
fn weight_to_u64(w: f64) -> u64 {
    let rounded = w.round();
    if rounded <= 0.0 {
        0
    } else if rounded > u64::MAX as f64 {
        u64::MAX
    } else {
        rounded as u64
    }
}

fn write_varint(buf: &mut Vec<u8>, weight: u64) -> DigestResult<()> {
    let mut n = weight;
    let mut continuations = 0u32;
    while n > 0x7f {
        buf.push(0x80 | (n as u8 & 0x7f));
        n >>= 7;
        continuations += 1;
        if continuations > MAX_VARINT_CONTINUATIONS {
            return Err(DigestError::VarIntOverflow { weight });
        }
    }
    buf.push(n as u8);
    Ok(())
}

fn read_varint(bytes: &[u8], offset: &mut usize) -> DigestResult<u64> {
    let mut byte = read_u8(bytes, offset)?;
    let mut value = u64::from(byte & 0x7f);
    let mut shift = 7u32;
    while byte & 0x80 != 0 {
        if shift > MAX_VARINT_SHIFT {
            return Err(DigestError::CorruptData {
                what: "varint weight too wide",
            });
        }
        byte = read_u8(bytes, offset)?;
        value += u64::from(byte & 0x7f) << shift;
        shift += 7;
    }
    Ok(value)
}

fn write_header(buf: &mut Vec<u8>, tag: u32, compression: f64, count: usize) {
    write_u32(buf, tag);
    write_f64(buf, compression);
    write_u32(buf, count as u32);
}

/* ============================
 * Encode
 * ============================ */

impl TDigest {
    /// Verbose encoding: exact f64 means, 4-byte weights.
    pub fn as_bytes(&self) -> Vec<u8> {
        let count = self.centroid_count();
        let mut buf = Vec::with_capacity(HEADER_LEN + 12 * count);
        write_header(&mut buf, VERBOSE_ENCODING, self.compression(), count);
        for c in self.centroids() {
            write_f64(&mut buf, c.mean());
        }
        for c in self.centroids() {
            write_u32(&mut buf, weight_to_u32(c.weight()));
        }
        buf
    }

    /// Compact encoding: f32 delta-coded means, varint weights. Fails with
    /// [`DigestError::VarIntOverflow`] when a single weight needs more than
    /// six continuation bytes.
    pub fn as_small_bytes(&self) -> DigestResult<Vec<u8>> {
        let count = self.centroid_count();
        let mut buf = Vec::with_capacity(HEADER_LEN + 5 * count);
        write_header(&mut buf, SMALL_ENCODING, self.compression(), count);
        let mut prev = 0.0f64;
        for c in self.centroids() {
            write_f32(&mut buf, (c.mean() - prev) as f32);
            prev = c.mean();
        }
        for c in self.centroids() {
            write_varint(&mut buf, weight_to_u64(c.weight()))?;
        }
        Ok(buf)
    }

    /// Decode either binary format, dispatching on the header tag.
    pub fn from_bytes(bytes: &[u8]) -> DigestResult<TDigest> {
        if bytes.len() < HEADER_LEN {
            return Err(DigestError::CorruptData {
                what: "truncated header",
            });
        }
        let mut offset = 0;
        let tag = read_u32(bytes, &mut offset)?;
        let compression = read_f64(bytes, &mut offset)?;
        let count = read_u32(bytes, &mut offset)? as usize;

        if !compression.is_finite() || compression <= 0.0 {
            return Err(DigestError::CorruptData {
                what: "bad compression factor",
            });
        }

        let (means, weights) = match tag {
            VERBOSE_ENCODING => decode_verbose(bytes, offset, count)?,
            SMALL_ENCODING => decode_small(bytes, offset, count)?,
            other => return Err(DigestError::UnknownFormat { tag: other }),
        };
        if means.len() != count || weights.len() != count {
            return Err(DigestError::CorruptData {
                what: "centroid count mismatch",
            });
        }

        let mut digest = TDigest::builder().delta(1.0 / compression).build();
        for (&mean, &weight) in means.iter().zip(weights.iter()) {
            if !mean.is_finite() {
                return Err(DigestError::NonFiniteInput {
                    context: "wire mean",
                });
            }
            digest.push_weighted(mean, weight)?;
        }
        Ok(digest)
    }
}

/* ============================
 * Decode payloads
 * ============================ */

fn decode_verbose(
    bytes: &[u8],
    mut offset: usize,
    count: usize,
) -> DigestResult<(Vec<f64>, Vec<f64>)> {
    let expected = count
        .checked_mul(12)
        .and_then(|n| n.checked_add(HEADER_LEN))
        .ok_or(DigestError::CorruptData {
            what: "centroid count overflow",
        })?;
    if bytes.len() != expected {
        return Err(DigestError::CorruptData {
            what: "verbose payload length",
        });
    }

    let mut means = Vec::with_capacity(count);
    for _ in 0..count {
        means.push(read_f64(bytes, &mut offset)?);
    }
    let mut weights = Vec::with_capacity(count);
    for _ in 0..count {
        weights.push(f64::from(read_u32(bytes, &mut offset)?));
    }
    Ok((means, weights))
}

fn decode_small(
    bytes: &[u8],
    mut offset: usize,
    count: usize,
) -> DigestResult<(Vec<f64>, Vec<f64>)> {
    let mut means = Vec::with_capacity(count);
    let mut prev = 0.0f64;
    for _ in 0..count {
        prev += f64::from(read_f32(bytes, &mut offset)?);
        means.push(prev);
    }

    let mut weights = Vec::with_capacity(count);
    for _ in 0..count {
        weights.push(read_varint(bytes, &mut offset)? as f64);
    }

    if offset != bytes.len() {
        return Err(DigestError::CorruptData {
            what: "trailing bytes after payload",
        });
    }
    Ok((means, weights))
}

/* ============================
 * Tests
 * ============================ */
