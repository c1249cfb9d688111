use std::fmt;
use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

/// Which pairwise item similarity measure to use.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Similarity {
    Cosine,
    /// Cosine over ratings centered by the rater's personal mean, which
    /// corrects for users who rate systematically high or low.
    AdjustedCosine,
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Similarity::Cosine => write!(f, "cosine"),
            Similarity::AdjustedCosine => write!(f, "adjusted-cosine"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown similarity mode '{0}', expected 'cosine' or 'adjusted-cosine'")]
pub struct UnknownSimilarity(String);

impl FromStr for Similarity {
    type Err = UnknownSimilarity;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "cosine" => Ok(Similarity::Cosine),
            "adjusted-cosine" => Ok(Similarity::AdjustedCosine),
            other => Err(UnknownSimilarity(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SimilarityError {
    #[error("rating vectors must be equally long, got {left} and {right}")]
    VectorLengthMismatch { left: usize, right: usize },
    #[error("cosine similarity is undefined for a zero-norm rating vector")]
    ZeroNorm,
}

/// Cosine similarity of two index-aligned rating vectors. Position i of both
/// vectors must hold ratings from the same user, the caller aligns them.
pub fn cosine(vec_a: &[f64], vec_b: &[f64]) -> Result<f64, SimilarityError> {
    if vec_a.len() != vec_b.len() {
        return Err(SimilarityError::VectorLengthMismatch {
            left: vec_a.len(),
            right: vec_b.len(),
        });
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (value_a, value_b) in vec_a.iter().zip(vec_b.iter()) {
        dot += value_a * value_b;
        norm_a += value_a * value_a;
        norm_b += value_b * value_b;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(SimilarityError::ZeroNorm);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Adjusted cosine similarity. `centering[i]` is the mean rating of the user
/// that contributed position i. A centered vector with zero variance yields
/// 0 instead of an error, unlike the plain cosine.
pub fn adjusted_cosine(
    vec_a: &[f64],
    vec_b: &[f64],
    centering: &[f64],
) -> Result<f64, SimilarityError> {
    if vec_a.len() != vec_b.len() {
        return Err(SimilarityError::VectorLengthMismatch {
            left: vec_a.len(),
            right: vec_b.len(),
        });
    }
    if vec_a.len() != centering.len() {
        return Err(SimilarityError::VectorLengthMismatch {
            left: vec_a.len(),
            right: centering.len(),
        });
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (idx, mean) in centering.iter().enumerate() {
        let centered_a = vec_a[idx] - mean;
        let centered_b = vec_b[idx] - mean;
        dot += centered_a * centered_b;
        norm_a += centered_a * centered_a;
        norm_b += centered_b * centered_b;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
