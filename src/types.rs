use serde::{Deserialize, Serialize};

/// A single answer attached to a stored question.
///
/// Serialized with the `answer`/`source` keys used by the corpus files and
/// the `answers` JSONB column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(rename = "answer", default)]
    pub text: String,
    #[serde(default)]
    pub source: String,
}

impl Answer {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Answer {
            text: text.into(),
            source: source.into(),
        }
    }
}

/// Missing fields default to empty values instead of failing the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub question_title: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// A question with its answers and both embeddings, as held by the store.
///
/// Immutable once ingested. `question_vector` and `answers_vector` always
/// share the embedding dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub question_text: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
    pub question_vector: Vec<f32>,
    pub answers_vector: Vec<f32>,
    #[serde(default)]
    pub metadata: RecordMetadata,
}

/// A store hit: the record plus its distances to the query vector.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub record: StoredRecord,
    pub question_distance: f32,
    pub answers_distance: f32,
}

/// One scored answer of a retrieved record. Scores are fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source_record_id: String,
    pub question_text: String,
    pub answer_text: String,
    pub source: String,
    pub document_relevance: f32,
    pub answer_relevance: f32,
    pub trust_score: f32,
    pub combined_score: f32,
    /// Position of the originating record in the store's result order.
    pub record_rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentMetadata {
    pub source_record_id: String,
    pub source: String,
    pub score: f32,
    pub topic: String,
    pub question_title: String,
    pub question_vector: Vec<f32>,
}

/// A ranked question/answer pair handed to the responder or generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl RetrievedDocument {
    pub fn from_candidate(candidate: Candidate, record: &StoredRecord) -> Self {
        let content = format!(
            "Question: {}\nAnswer: {}",
            candidate.question_text, candidate.answer_text
        );
        RetrievedDocument {
            content,
            metadata: DocumentMetadata {
                source_record_id: candidate.source_record_id,
                source: candidate.source,
                score: candidate.combined_score,
                topic: record.metadata.topic.clone(),
                question_title: record.metadata.question_title.clone(),
                question_vector: record.question_vector.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_metadata_defaults_missing_fields() -> anyhow::Result<()> {
        let metadata: RecordMetadata = serde_json::from_str(r#"{"topic": "anxiety"}"#)?;
        assert_eq!(metadata.topic, "anxiety");
        assert_eq!(metadata.question_title, "");
        assert!(metadata.sources.is_empty());
        Ok(())
    }

    #[test]
    fn test_answer_uses_corpus_keys() -> anyhow::Result<()> {
        let answer: Answer =
            serde_json::from_str(r#"{"answer": "Try breathing slowly.", "source": "Counsel Chat"}"#)?;
        assert_eq!(answer.text, "Try breathing slowly.");
        assert_eq!(answer.source, "Counsel Chat");

        let missing_source: Answer = serde_json::from_str(r#"{"answer": "Rest."}"#)?;
        assert_eq!(missing_source.source, "");
        Ok(())
    }

    #[test]
    fn test_document_content_layout() {
        let record = StoredRecord {
            id: "q1".to_string(),
            question_text: "How do I sleep better?".to_string(),
            answers: vec![Answer::new("Keep a routine.", "Mental Health Dataset")],
            question_vector: vec![0.1, 0.2],
            answers_vector: vec![0.3, 0.4],
            metadata: RecordMetadata {
                topic: "sleep".to_string(),
                question_title: "Sleep".to_string(),
                sources: vec!["Mental Health Dataset".to_string()],
            },
        };
        let candidate = Candidate {
            source_record_id: "q1".to_string(),
            question_text: record.question_text.clone(),
            answer_text: "Keep a routine.".to_string(),
            source: "Mental Health Dataset".to_string(),
            document_relevance: 0.9,
            answer_relevance: 0.8,
            trust_score: 0.75,
            combined_score: 0.83,
            record_rank: 0,
        };

        let doc = RetrievedDocument::from_candidate(candidate, &record);
        assert_eq!(doc.content, "Question: How do I sleep better?\nAnswer: Keep a routine.");
        assert_eq!(doc.metadata.topic, "sleep");
        assert_eq!(doc.metadata.question_vector, vec![0.1, 0.2]);
        assert!((doc.metadata.score - 0.83).abs() < f32::EPSILON);
    }
}
