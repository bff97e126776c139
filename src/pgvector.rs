use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};

use crate::error::{RagError, Result};
use crate::settings::StoreSettings;
use crate::store::{DistanceMetric, VectorStore};
use crate::types::{Answer, Neighbor, RecordMetadata, StoredRecord};

const BACKEND: &str = "pgvector";
const IVFFLAT_LISTS: u32 = 100;

pub struct PgVectorStore {
    pool: PgPool,
    table: String,
    metric: DistanceMetric,
    timeout: Duration,
}

impl PgVectorStore {
    pub async fn connect(settings: &StoreSettings) -> Result<Self> {
        let url = settings
            .database_url
            .as_deref()
            .ok_or_else(|| RagError::Config("store.database_url is not set".to_string()))?;
        let timeout = Duration::from_secs(settings.timeout_secs);

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(timeout)
            .connect(url)
            .await
            .map_err(map_err)?;

        Ok(PgVectorStore {
            pool,
            table: sanitize_table_name(&settings.table)?,
            metric: settings.metric,
            timeout,
        })
    }

    /// Create the extension, table and vector index if they are missing.
    pub async fn ensure_schema(&self, dimensions: usize) -> Result<()> {
        let table = &self.table;
        let statements = [
            "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
            format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                    question_id VARCHAR(50) PRIMARY KEY, \
                    question_full TEXT NOT NULL, \
                    answers JSONB NOT NULL DEFAULT '[]'::jsonb, \
                    question_vector vector({dimensions}) NOT NULL, \
                    answers_vector vector({dimensions}) NOT NULL, \
                    metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb\
                )"
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {table}_question_vector_idx \
                 ON {table} USING ivfflat (question_vector {}) \
                 WITH (lists = {IVFFLAT_LISTS})",
                operator_class(self.metric)
            ),
        ];

        for statement in &statements {
            self.bounded(sqlx::query(statement).execute(&self.pool)).await?;
        }
        info!(table = %self.table, dimensions, metric = ?self.metric, "schema ready");
        Ok(())
    }

    async fn bounded<T>(
        &self,
        query: impl Future<Output = std::result::Result<T, sqlx::Error>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, query)
            .await
            .map_err(|_| RagError::store(BACKEND, format!("query timed out after {:?}", self.timeout)))?
            .map_err(map_err)
    }
}

fn map_err(e: sqlx::Error) -> RagError {
    RagError::store(BACKEND, e.to_string())
}

/// Only alphanumerics and underscores survive; anything else becomes `_`.
fn sanitize_table_name(name: &str) -> Result<String> {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        return Err(RagError::Config("store.table must not be empty".to_string()));
    }
    Ok(sanitized)
}

fn distance_operator(metric: DistanceMetric) -> &'static str {
    match metric {
        DistanceMetric::Cosine => "<=>",
        DistanceMetric::Euclidean => "<->",
    }
}

fn operator_class(metric: DistanceMetric) -> &'static str {
    match metric {
        DistanceMetric::Cosine => "vector_cosine_ops",
        DistanceMetric::Euclidean => "vector_l2_ops",
    }
}

/// pgvector's text form: `[1,2,3]`.
fn vector_literal(vector: &[f32]) -> String {
    let values: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}

fn parse_vector(text: &str) -> Result<Vec<f32>> {
    serde_json::from_str(text)
        .map_err(|e| RagError::store(BACKEND, format!("malformed vector text: {e}")))
}

fn decode_answers(id: &str, value: serde_json::Value) -> Vec<Answer> {
    serde_json::from_value(value).unwrap_or_else(|e| {
        warn!(question_id = id, error = %e, "unreadable answers, treating record as unanswered");
        Vec::new()
    })
}

fn decode_metadata(id: &str, value: Option<serde_json::Value>) -> RecordMetadata {
    match value {
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(question_id = id, error = %e, "unreadable metadata, using defaults");
            RecordMetadata::default()
        }),
        None => RecordMetadata::default(),
    }
}

fn decode_neighbor(row: &PgRow) -> Result<Neighbor> {
    let id: String = row.try_get("question_id").map_err(map_err)?;
    let question_text: Option<String> = row.try_get("question_full").map_err(map_err)?;
    let answers: Option<serde_json::Value> = row.try_get("answers").map_err(map_err)?;
    let metadata: Option<serde_json::Value> = row.try_get("metadata").map_err(map_err)?;
    let question_distance: f64 = row.try_get("document_distance").map_err(map_err)?;
    let answers_distance: f64 = row.try_get("answers_distance").map_err(map_err)?;
    let question_vector: String = row.try_get("question_vector_text").map_err(map_err)?;
    let answers_vector: String = row.try_get("answers_vector_text").map_err(map_err)?;

    let answers = answers.map(|v| decode_answers(&id, v)).unwrap_or_default();
    let metadata = decode_metadata(&id, metadata);

    Ok(Neighbor {
        record: StoredRecord {
            question_text: question_text.unwrap_or_default(),
            answers,
            question_vector: parse_vector(&question_vector)?,
            answers_vector: parse_vector(&answers_vector)?,
            metadata,
            id,
        },
        question_distance: question_distance as f32,
        answers_distance: answers_distance as f32,
    })
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn nearest(&self, query_vector: &[f32], limit: usize) -> Result<Vec<Neighbor>> {
        let op = distance_operator(self.metric);
        let sql = format!(
            "SELECT question_id, question_full, answers, metadata, \
                    (question_vector {op} $1::vector)::float8 AS document_distance, \
                    (answers_vector {op} $1::vector)::float8 AS answers_distance, \
                    question_vector::text AS question_vector_text, \
                    answers_vector::text AS answers_vector_text \
             FROM {table} \
             ORDER BY question_vector {op} $1::vector \
             LIMIT $2",
            table = self.table
        );
        let limit = i64::try_from(limit)
            .map_err(|_| RagError::Config(format!("limit {limit} is too large")))?;

        let rows = self
            .bounded(
                sqlx::query(&sql)
                    .bind(vector_literal(query_vector))
                    .bind(limit)
                    .fetch_all(&self.pool),
            )
            .await?;

        debug!(backend = BACKEND, table = %self.table, hits = rows.len(), "nearest records");
        rows.iter().map(decode_neighbor).collect()
    }

    async fn insert(&self, records: &[StoredRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "INSERT INTO {} \
                (question_id, question_full, answers, question_vector, answers_vector, metadata) \
             VALUES ($1, $2, $3, $4::vector, $5::vector, $6) \
             ON CONFLICT (question_id) DO NOTHING",
            self.table
        );

        let mut tx = self.bounded(self.pool.begin()).await?;
        let mut inserted = 0;
        for record in records {
            let result = self
                .bounded(
                    sqlx::query(&sql)
                        .bind(&record.id)
                        .bind(&record.question_text)
                        .bind(sqlx::types::Json(&record.answers))
                        .bind(vector_literal(&record.question_vector))
                        .bind(vector_literal(&record.answers_vector))
                        .bind(sqlx::types::Json(&record.metadata))
                        .execute(&mut *tx),
                )
                .await?;
            inserted += result.rows_affected() as usize;
        }
        self.bounded(tx.commit()).await?;

        debug!(backend = BACKEND, batch = records.len(), inserted, "inserted records");
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_table_name() -> anyhow::Result<()> {
        assert_eq!(sanitize_table_name("talk")?, "talk");
        assert_eq!(sanitize_table_name("talk; DROP TABLE x")?, "talk__DROP_TABLE_x");
        assert!(sanitize_table_name("").is_err());
        Ok(())
    }

    #[test]
    fn test_metric_operators() {
        assert_eq!(distance_operator(DistanceMetric::Cosine), "<=>");
        assert_eq!(operator_class(DistanceMetric::Cosine), "vector_cosine_ops");
        assert_eq!(distance_operator(DistanceMetric::Euclidean), "<->");
        assert_eq!(operator_class(DistanceMetric::Euclidean), "vector_l2_ops");
    }

    #[test]
    fn test_vector_text_round_trip() -> anyhow::Result<()> {
        let literal = vector_literal(&[0.5, -1.0, 2.25]);
        assert_eq!(literal, "[0.5,-1,2.25]");
        assert_eq!(parse_vector(&literal)?, vec![0.5, -1.0, 2.25]);
        assert!(parse_vector("not a vector").is_err());
        Ok(())
    }

    #[test]
    fn test_decode_degrades_gracefully() {
        let answers = decode_answers("q1", serde_json::json!([{"answer": "Rest.", "source": "X"}, {"answer": "Walk."}]));
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[1].source, "");

        assert!(decode_answers("q2", serde_json::json!({"not": "a list"})).is_empty());

        let metadata = decode_metadata("q3", Some(serde_json::json!({"question_title": "Sleep"})));
        assert_eq!(metadata.question_title, "Sleep");
        assert_eq!(metadata.topic, "");
        assert_eq!(decode_metadata("q4", None), RecordMetadata::default());
    }
}
