//! Distance metrics
//!
//! All metrics are oriented so that lower means closer. The metric bound to
//! a table at creation is used by every index and query on that table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{check_dims, VectorDbError, VectorDbResult};

/// Distance reported by cosine when either operand has zero norm
pub const COSINE_ZERO_NORM_DISTANCE: f32 = 2.0;

/// Distance metric for vector search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance
    L2,
    /// Negative dot product, for non-normalized vectors
    InnerProduct,
    /// `1 - cos(u, v)`, in `[0, 2]`
    Cosine,
}

impl DistanceMetric {
    /// Distance between two vectors, checking that their lengths agree
    pub fn distance(&self, a: &[f32], b: &[f32]) -> VectorDbResult<f32> {
        check_dims(a.len(), b.len())?;
        Ok(self.eval(a, b))
    }

    /// Distance without the length check. Callers guarantee `a.len() == b.len()`.
    #[inline]
    pub(crate) fn eval(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            DistanceMetric::L2 => l2_squared(a, b),
            DistanceMetric::InnerProduct => -dot(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::L2 => "l2",
            DistanceMetric::InnerProduct => "inner_product",
            DistanceMetric::Cosine => "cosine",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = VectorDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            "inner_product" | "ip" | "dot" => Ok(DistanceMetric::InnerProduct),
            "cosine" => Ok(DistanceMetric::Cosine),
            other => Err(VectorDbError::schema(format!("unknown distance metric '{}'", other))),
        }
    }
}

/// Squared Euclidean distance
#[inline]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Dot product
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine distance; zero-norm operands map to [`COSINE_ZERO_NORM_DISTANCE`]
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a <= 0.0 || norm_b <= 0.0 {
        return COSINE_ZERO_NORM_DISTANCE;
    }

    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    (1.0 - sim).clamp(0.0, 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2() {
        let d = DistanceMetric::L2.distance(&[0.0, 0.0], &[3.0, 4.0]).unwrap();
        assert_eq!(d, 25.0);
        assert_eq!(DistanceMetric::L2.distance(&[1.5, -2.0], &[1.5, -2.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_inner_product() {
        let d = DistanceMetric::InnerProduct.distance(&[1.0, 2.0], &[3.0, 4.0]).unwrap();
        assert_eq!(d, -11.0);
        // Larger dot product is closer
        let far = DistanceMetric::InnerProduct.eval(&[1.0, 0.0], &[0.1, 0.0]);
        let near = DistanceMetric::InnerProduct.eval(&[1.0, 0.0], &[5.0, 0.0]);
        assert!(near < far);
    }

    #[test]
    fn test_cosine() {
        let v1 = [1.0, 0.0];
        let v2 = [0.0, 1.0];
        let v3 = [2.0, 0.0];
        let cosine = DistanceMetric::Cosine;

        assert!((cosine.eval(&v1, &v2) - 1.0).abs() < 1e-6);
        assert!(cosine.eval(&v1, &v3).abs() < 1e-6);
        assert!((cosine.eval(&v1, &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let d = DistanceMetric::Cosine.distance(&[0.0, 0.0], &[1.0, 1.0]).unwrap();
        assert_eq!(d, COSINE_ZERO_NORM_DISTANCE);
        assert!(d.is_finite());
    }

    #[test]
    fn test_dimension_mismatch() {
        for metric in [DistanceMetric::L2, DistanceMetric::InnerProduct, DistanceMetric::Cosine] {
            let err = metric.distance(&[1.0, 2.0, 3.0], &[1.0, 2.0]).unwrap_err();
            assert!(matches!(err, VectorDbError::DimensionMismatch { expected: 3, got: 2 }));
        }
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!("L2".parse::<DistanceMetric>().unwrap(), DistanceMetric::L2);
        assert_eq!("dot".parse::<DistanceMetric>().unwrap(), DistanceMetric::InnerProduct);
        assert_eq!("cosine".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert!(matches!(
            "manhattan".parse::<DistanceMetric>(),
            Err(VectorDbError::SchemaValidation(_))
        ));
    }
}
