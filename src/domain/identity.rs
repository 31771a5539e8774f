use serde::{Deserialize, Serialize};

/// A named face embedding. `name` is the key.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IdentityRecord {
    pub name: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IdentityMatch {
    pub name: String,
    pub distance: f32,
}

/// Squared Euclidean distance. For unit vectors this is `2 - 2 * cosine`.
pub fn squared_distance(left: &[f32], right: &[f32]) -> f32 {
    left.iter().zip(right.iter()).map(|(l, r)| (l - r) * (l - r)).sum()
}
