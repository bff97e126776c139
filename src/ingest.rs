use std::fs;
use std::path::Path;
use std::sync::Arc;

use ndarray::Array1;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embedder::{EmbeddingProvider, check_dimensions};
use crate::error::{RagError, Result};
use crate::settings::IngestSettings;
use crate::store::VectorStore;
use crate::types::{Answer, RecordMetadata, StoredRecord};
use crate::utils::find_files;

/// One question as it appears in a corpus file.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionEntry {
    #[serde(default)]
    pub question_id: Option<String>,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub question_title: String,
    pub question_full: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

/// Counters carried through an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub files: usize,
    pub failed_files: usize,
    pub records: usize,
    pub inserted: usize,
    pub embedding_calls: usize,
}

impl IngestStats {
    pub fn merge(&mut self, other: IngestStats) {
        self.files += other.files;
        self.failed_files += other.failed_files;
        self.records += other.records;
        self.inserted += other.inserted;
        self.embedding_calls += other.embedding_calls;
    }
}

fn mean_vector(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let mut sum = Array1::<f32>::zeros(first.len());
    for vector in vectors {
        sum += &Array1::from(vector.clone());
    }
    Some((sum / vectors.len() as f32).to_vec())
}

/// Embed every question and answer text, `batch_size` texts per request.
///
/// `answers_vector` is the mean of the answer embeddings; a question with
/// no answers reuses its question embedding.
pub async fn embed_entries(
    entries: Vec<QuestionEntry>,
    embedder: &dyn EmbeddingProvider,
    batch_size: usize,
    stats: &mut IngestStats,
) -> Result<Vec<StoredRecord>> {
    let texts: Vec<String> = entries
        .iter()
        .flat_map(|entry| {
            std::iter::once(entry.question_full.clone())
                .chain(entry.answers.iter().map(|a| a.text.clone()))
        })
        .collect();

    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        vectors.extend(embedder.embed_batch(batch).await?);
        stats.embedding_calls += 1;
    }
    if vectors.len() != texts.len() {
        return Err(RagError::embedding(
            embedder.name(),
            format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
        ));
    }
    check_dimensions(&vectors, embedder.dimensions())?;

    let mut vectors = vectors.into_iter();
    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let question_vector = vectors
            .next()
            .ok_or_else(|| RagError::embedding(embedder.name(), "missing question embedding"))?;
        let answer_vectors: Vec<Vec<f32>> = vectors.by_ref().take(entry.answers.len()).collect();
        let answers_vector = mean_vector(&answer_vectors).unwrap_or_else(|| question_vector.clone());

        records.push(StoredRecord {
            id: entry
                .question_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            question_text: entry.question_full,
            metadata: RecordMetadata {
                topic: entry.topic,
                question_title: entry.question_title,
                sources: entry.answers.iter().map(|a| a.source.clone()).collect(),
            },
            answers: entry.answers,
            question_vector,
            answers_vector,
        });
    }
    stats.records += records.len();
    Ok(records)
}

async fn ingest_file(
    path: &Path,
    embedder: &dyn EmbeddingProvider,
    batch_size: usize,
) -> Result<(Vec<StoredRecord>, IngestStats)> {
    let entries: Vec<QuestionEntry> = serde_json::from_str(&fs::read_to_string(path)?)?;
    let mut stats = IngestStats {
        files: 1,
        ..IngestStats::default()
    };
    let records = embed_entries(entries, embedder, batch_size, &mut stats).await?;
    debug!(path = %path.display(), records = records.len(), "embedded file");
    Ok((records, stats))
}

/// Ingest every corpus file under `dir` into `store`.
///
/// A file that cannot be read, parsed or embedded is logged and counted in
/// `failed_files`; a store failure aborts the run.
pub async fn ingest_dir(
    dir: impl AsRef<Path>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: &dyn VectorStore,
    settings: IngestSettings,
) -> Result<IngestStats> {
    let files = find_files(dir, "json")?;
    info!(files = files.len(), workers = settings.workers, "ingesting corpus");

    let permits = Arc::new(Semaphore::new(settings.workers.max(1)));
    let mut tasks = JoinSet::new();
    for (index, path) in files.iter().cloned().enumerate() {
        let embedder = Arc::clone(&embedder);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let outcome = ingest_file(&path, embedder.as_ref(), settings.batch_size).await;
            (index, path, outcome)
        });
    }

    let mut stats = IngestStats::default();
    let mut embedded: Vec<(usize, Vec<StoredRecord>)> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, _, Ok((records, file_stats)))) => {
                stats.merge(file_stats);
                embedded.push((index, records));
            }
            Ok((_, path, Err(e))) => {
                warn!(path = %path.display(), error = %e, "skipping corpus file");
                stats.files += 1;
                stats.failed_files += 1;
            }
            Err(e) => {
                warn!(error = %e, "ingestion task failed");
                stats.failed_files += 1;
            }
        }
    }

    embedded.sort_by_key(|(index, _)| *index);
    let records: Vec<StoredRecord> = embedded.into_iter().flat_map(|(_, r)| r).collect();
    for batch in records.chunks(settings.insert_batch_size.max(1)) {
        stats.inserted += store.insert(batch).await?;
    }

    info!(
        files = stats.files,
        failed_files = stats.failed_files,
        records = stats.records,
        inserted = stats.inserted,
        embedding_calls = stats.embedding_calls,
        "ingestion finished"
    );
    Ok(stats)
}
