//! Retrieval, ranking and topic routing for a mental-health question answering assistant.

pub mod embedder;
pub mod error;
pub mod formatter;
pub mod ingest;
pub mod llm;
pub mod pgvector;
pub mod pipeline;
pub mod ranking;
pub mod retriever;
pub mod selector;
pub mod settings;
pub mod store;
pub mod topic;
pub mod types;
pub mod utils;
pub mod vector_db;

#[cfg(test)]
mod testing;

pub use error::{RagError, Result};
pub use formatter::format_answer;
pub use pipeline::RagPipeline;
pub use selector::select_response;
pub use settings::Settings;
pub use topic::{Topic, classify};
