use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::embedder::EmbeddingProvider;
use crate::error::Result;
use crate::ranking::{FusionWeights, TrustTiers, rank, relevance_from_distance};
use crate::settings::{RankingSettings, RetrievalSettings};
use crate::store::VectorStore;
use crate::types::{Candidate, Neighbor, RetrievedDocument};

/// Anything that can fetch the documents relevant to a query.
///
/// The returned documents are ordered by descending relevance. An empty
/// list means nothing relevant was found; a failure is always an `Err`.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedDocument>>;
}

/// Embeds the query, pulls the nearest records, scores every answer and
/// keeps the best ones.
pub struct VectorRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    retrieval: RetrievalSettings,
    weights: FusionWeights,
    trust: TrustTiers,
}

impl VectorRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        retrieval: RetrievalSettings,
        ranking: RankingSettings,
    ) -> Self {
        VectorRetriever {
            embedder,
            store,
            retrieval,
            weights: ranking.weights,
            trust: ranking.trust,
        }
    }

    /// One candidate per answer, in record order then answer order.
    /// Records without answers contribute nothing.
    fn expand(&self, neighbors: &[Neighbor]) -> Vec<Candidate> {
        neighbors
            .iter()
            .enumerate()
            .flat_map(|(record_rank, neighbor)| {
                let document_relevance = relevance_from_distance(neighbor.question_distance);
                let answer_relevance = relevance_from_distance(neighbor.answers_distance);
                let record = &neighbor.record;

                record.answers.iter().map(move |answer| {
                    let trust_score = self.trust.score(&answer.source);
                    Candidate {
                        source_record_id: record.id.clone(),
                        question_text: record.question_text.clone(),
                        answer_text: answer.text.clone(),
                        source: answer.source.clone(),
                        document_relevance,
                        answer_relevance,
                        trust_score,
                        combined_score: self.weights.combine(
                            document_relevance,
                            answer_relevance,
                            trust_score,
                        ),
                        record_rank,
                    }
                })
            })
            .collect()
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedDocument>> {
        let query_vector = self.embedder.embed(query).await?;
        let neighbors = self
            .store
            .nearest(&query_vector, self.retrieval.candidate_pool)
            .await?;

        let candidates = self.expand(&neighbors);
        let pool_size = candidates.len();
        let mut ranked = rank(candidates);
        ranked.truncate(self.retrieval.max_documents);

        debug!(
            records = neighbors.len(),
            candidates = pool_size,
            kept = ranked.len(),
            top_score = ranked.first().map(|c| c.combined_score),
            "retrieved documents"
        );

        Ok(ranked
            .into_iter()
            .map(|candidate| {
                let record = &neighbors[candidate.record_rank].record;
                RetrievedDocument::from_candidate(candidate, record)
            })
            .collect())
    }
}
