use std::fs;
use std::path::Path;

use async_trait::async_trait;
use ndarray::Array1;
use rustc_hash::FxHashSet;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{RagError, Result};
use crate::store::{DistanceMetric, VectorStore};
use crate::types::{Neighbor, StoredRecord};
use crate::utils::ensure_parent_dir;

const BACKEND: &str = "memory";

struct Entry {
    record: StoredRecord,
    question: Array1<f32>,
    answers: Array1<f32>,
}

impl Entry {
    fn new(record: StoredRecord) -> Self {
        Entry {
            question: Array1::from(record.question_vector.clone()),
            answers: Array1::from(record.answers_vector.clone()),
            record,
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: Vec<Entry>,
    ids: FxHashSet<String>,
}

pub struct VectorDB {
    metric: DistanceMetric,
    inner: RwLock<Inner>,
}

impl VectorDB {
    pub fn new(metric: DistanceMetric) -> Self {
        VectorDB {
            metric,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Load a snapshot previously written by [`VectorDB::save`].
    /// A missing file yields an empty store.
    pub async fn load(path: impl AsRef<Path>, metric: DistanceMetric) -> Result<Self> {
        let db = VectorDB::new(metric);
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "snapshot not found, starting with an empty store");
            return Ok(db);
        }

        let records: Vec<StoredRecord> = serde_json::from_str(&fs::read_to_string(path)?)?;
        let inserted = db.insert(&records).await?;
        info!(path = %path.display(), records = inserted, "loaded snapshot");
        Ok(db)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        let inner = self.inner.read().await;
        let records: Vec<&StoredRecord> = inner.entries.iter().map(|e| &e.record).collect();
        fs::write(path, serde_json::to_string(&records)?)?;
        info!(path = %path.display(), records = records.len(), "saved snapshot");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn distance(&self, a: &Array1<f32>, b: &Array1<f32>) -> f32 {
        match self.metric {
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
            DistanceMetric::Euclidean => {
                let diff = a - b;
                diff.dot(&diff).sqrt()
            }
        }
    }
}

fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    let dot_product = a.dot(b);
    let norm_a = a.dot(a).sqrt();
    let norm_b = b.dot(b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for VectorDB {
    async fn nearest(&self, query_vector: &[f32], limit: usize) -> Result<Vec<Neighbor>> {
        let query = Array1::from(query_vector.to_vec());
        let inner = self.inner.read().await;

        let mut scored = Vec::with_capacity(inner.entries.len());
        for entry in &inner.entries {
            for vector in [&entry.question, &entry.answers] {
                if vector.len() != query.len() {
                    return Err(RagError::DimensionMismatch {
                        expected: vector.len(),
                        actual: query.len(),
                    });
                }
            }
            scored.push((
                self.distance(&entry.question, &query),
                self.distance(&entry.answers, &query),
                entry,
            ));
        }

        // stable: equal distances keep insertion order
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(limit);
        debug!(backend = BACKEND, hits = scored.len(), "nearest records");

        Ok(scored
            .into_iter()
            .map(|(question_distance, answers_distance, entry)| Neighbor {
                record: entry.record.clone(),
                question_distance,
                answers_distance,
            })
            .collect())
    }

    async fn insert(&self, records: &[StoredRecord]) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let mut inserted = 0;
        for record in records {
            if record.question_vector.len() != record.answers_vector.len() {
                return Err(RagError::store(
                    BACKEND,
                    format!("record '{}' has vectors of different lengths", record.id),
                ));
            }
            if inner.ids.insert(record.id.clone()) {
                inner.entries.push(Entry::new(record.clone()));
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}
