use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Neighbor, StoredRecord};

/// Vector distance used both to build the index and to query it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine similarity`, in [0, 2].
    #[default]
    Cosine,
    /// L2 distance, unbounded.
    Euclidean,
}

/// Read/write access to the question/answer records.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The `limit` records whose question vectors are nearest to
    /// `query_vector`, closest first, each with its question-vector and
    /// answers-vector distances.
    async fn nearest(&self, query_vector: &[f32], limit: usize) -> Result<Vec<Neighbor>>;

    /// Insert records, skipping ids that already exist. Returns how many
    /// were newly stored.
    async fn insert(&self, records: &[StoredRecord]) -> Result<usize>;
}
