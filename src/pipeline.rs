use std::sync::{Arc, Mutex, PoisonError};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::error::Result;
use crate::formatter::format_answer;
use crate::llm::Generator;
use crate::retriever::Retriever;
use crate::selector::select_response;
use crate::settings::ResponderSettings;
use crate::topic::classify;

pub struct RagPipeline {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    fallback: Option<String>,
    rng: Mutex<StdRng>,
}

impl RagPipeline {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        responder: ResponderSettings,
    ) -> Self {
        RagPipeline {
            retriever,
            generator,
            fallback: responder.fallback.filter(|f| !f.is_empty()),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Make small-talk selection reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Answer a query.
    ///
    /// Any retrieval or generation failure is returned as an error and no
    /// text is produced for the query.
    pub async fn run_rag(&self, query: &str) -> Result<String> {
        let mut retrieved = None;

        if let Some(topic) = classify(query) {
            let documents = self.retriever.retrieve(query).await?;
            let reply = {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                select_response(&documents, topic, &mut *rng, self.fallback.as_deref())
            };

            if let Some(reply) = reply.filter(|r| !r.is_empty()) {
                info!(%topic, "answered small talk directly");
                return Ok(reply);
            }
            debug!(%topic, "no direct reply, falling through to generation");
            retrieved = Some(documents);
        }

        let documents = match retrieved {
            Some(documents) => documents,
            None => self.retriever.retrieve(query).await?,
        };
        let generated = self.generator.generate(query, &documents).await?;
        info!(documents = documents.len(), answer_len = generated.len(), "generated answer");

        Ok(format_answer(&generated))
    }
}
