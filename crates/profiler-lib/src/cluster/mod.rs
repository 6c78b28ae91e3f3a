//! Clustering primitives
//!
//! - K-Means fitting with seeded random initialization and restarts
//! - Elbow selection over the SSE-vs-K curve

mod elbow;
mod kmeans;

pub use elbow::{Elbow, ElbowSelector, DEFAULT_SENSITIVITY};
pub use kmeans::{nearest_centroid, squared_distance, KMeansFit, KMeansParams};
