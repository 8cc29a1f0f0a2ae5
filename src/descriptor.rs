//! ALFA Face Vault - Descriptor Math
//!
//! Unit-norm face descriptors and the Euclidean distance used for matching.

use crate::error::{VaultError, VaultResult};

/// Descriptor length produced by the upstream recognition model
pub const DEFAULT_DESCRIPTOR_LEN: usize = 128;

/// Allowed deviation from unit norm for stored descriptors
pub const NORM_TOLERANCE: f64 = 1e-6;

/// An L2-normalized face descriptor.
///
/// Only [`normalize`] and [`Descriptor::from_normalized`] construct one, so
/// every value of this type has unit Euclidean norm.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    values: Vec<f64>,
}

impl Descriptor {
    /// Accept values that are already unit norm (e.g. loaded from storage)
    pub fn from_normalized(values: Vec<f64>) -> VaultResult<Self> {
        let norm = l2_norm(&values);
        if !norm.is_finite() || (norm - 1.0).abs() > NORM_TOLERANCE {
            return Err(VaultError::DegenerateVector);
        }
        Ok(Self { values })
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialize as little-endian f64 bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Inverse of [`Descriptor::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> VaultResult<Self> {
        if bytes.len() % 8 != 0 {
            return Err(VaultError::Storage(format!(
                "descriptor blob length {} is not a multiple of 8",
                bytes.len()
            )));
        }

        let values = bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect();

        Self::from_normalized(values)
            .map_err(|_| VaultError::Storage("stored descriptor is not unit norm".into()))
    }
}

/// Scale `values` to unit Euclidean norm
///
/// Components are pre-scaled by the largest magnitude so the norm neither
/// overflows nor underflows for finite input.
pub fn normalize(values: &[f64]) -> VaultResult<Descriptor> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(VaultError::DegenerateVector);
    }

    let scale = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if scale == 0.0 {
        return Err(VaultError::DegenerateVector);
    }

    let scaled: Vec<f64> = values.iter().map(|v| v / scale).collect();
    let norm = l2_norm(&scaled);

    Ok(Descriptor {
        values: scaled.into_iter().map(|v| v / norm).collect(),
    })
}

/// Euclidean distance between two normalized descriptors
pub fn distance(a: &Descriptor, b: &Descriptor) -> VaultResult<f64> {
    if a.len() != b.len() {
        return Err(VaultError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let sum: f64 = a
        .values
        .iter()
        .zip(b.values.iter())
        .map(|(l, r)| (l - r) * (l - r))
        .sum();

    Ok(sum.sqrt())
}

fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}
