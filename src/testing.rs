//! Fakes for the embedding, generation and document seams.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::embedder::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::Generator;
use crate::store::VectorStore;
use crate::types::{Answer, DocumentMetadata, Neighbor, RecordMetadata, RetrievedDocument, StoredRecord};

/// Returns a per-text vector when one is registered, `default` otherwise.
pub struct StaticEmbedder {
    default: Vec<f32>,
    table: FxHashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl StaticEmbedder {
    pub fn new(default: Vec<f32>) -> Self {
        StaticEmbedder {
            default,
            table: FxHashMap::default(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| self.table.get(t).cloned().unwrap_or_else(|| self.default.clone()))
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.default.len()
    }

    fn name(&self) -> &str {
        "static"
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::embedding("failing", "connection refused"))
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// A store whose connection is always down.
pub struct FailingStore;

#[async_trait]
impl VectorStore for FailingStore {
    async fn nearest(&self, _query_vector: &[f32], _limit: usize) -> Result<Vec<Neighbor>> {
        Err(RagError::store("failing", "connection refused"))
    }

    async fn insert(&self, _records: &[StoredRecord]) -> Result<usize> {
        Err(RagError::store("failing", "connection refused"))
    }
}

/// Replies with a fixed answer (or fails) and records how it was called.
pub struct ScriptedGenerator {
    reply: Option<String>,
    calls: AtomicUsize,
    last_documents: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(reply: &str) -> Self {
        ScriptedGenerator {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            last_documents: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        ScriptedGenerator {
            reply: None,
            calls: AtomicUsize::new(0),
            last_documents: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_documents(&self) -> usize {
        self.last_documents.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _query: &str, documents: &[RetrievedDocument]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_documents.store(documents.len(), Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| RagError::generation("scripted", "model unavailable"))
    }
}

/// A record whose question and answers share `vector`.
pub fn record(id: &str, question: &str, answers: Vec<Answer>, vector: Vec<f32>) -> StoredRecord {
    StoredRecord {
        id: id.to_string(),
        question_text: question.to_string(),
        metadata: RecordMetadata {
            topic: String::new(),
            question_title: question.to_string(),
            sources: answers.iter().map(|a| a.source.clone()).collect(),
        },
        answers,
        question_vector: vector.clone(),
        answers_vector: vector,
    }
}

pub fn document(content: &str) -> RetrievedDocument {
    RetrievedDocument {
        content: content.to_string(),
        metadata: DocumentMetadata {
            source_record_id: "doc".to_string(),
            source: String::new(),
            score: 1.0,
            topic: String::new(),
            question_title: String::new(),
            question_vector: Vec::new(),
        },
    }
}
