use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::types::Candidate;

const WEIGHT_SUM_TOLERANCE: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub document: f32,
    pub answer: f32,
    pub trust: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        FusionWeights {
            document: 0.4,
            answer: 0.4,
            trust: 0.2,
        }
    }
}

impl FusionWeights {
    pub fn validate(&self) -> Result<()> {
        let weights = [self.document, self.answer, self.trust];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(RagError::Config(format!(
                "fusion weights must be non-negative, got {self:?}"
            )));
        }
        let sum: f32 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RagError::Config(format!(
                "fusion weights must sum to 1, got {sum}"
            )));
        }
        Ok(())
    }

    pub fn combine(&self, document_relevance: f32, answer_relevance: f32, trust_score: f32) -> f32 {
        document_relevance * self.document + answer_relevance * self.answer + trust_score * self.trust
    }
}

/// One configured source and its trust score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTrust {
    pub source: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrustTable {
    #[serde(default = "default_trust")]
    default: f32,
    #[serde(default)]
    sources: Vec<SourceTrust>,
}

fn default_trust() -> f32 {
    1.0
}

/// Fixed source → trust lookup. Sources not listed get `default`.
///
/// Configured as a list so source names keep their exact spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TrustTable", into = "TrustTable")]
pub struct TrustTiers {
    default: f32,
    sources: FxHashMap<String, f32>,
}

impl From<TrustTable> for TrustTiers {
    fn from(table: TrustTable) -> Self {
        TrustTiers::new(table.default, table.sources)
    }
}

impl From<TrustTiers> for TrustTable {
    fn from(tiers: TrustTiers) -> Self {
        let mut sources: Vec<SourceTrust> = tiers
            .sources
            .into_iter()
            .map(|(source, score)| SourceTrust { source, score })
            .collect();
        sources.sort_by(|a, b| a.source.cmp(&b.source));
        TrustTable {
            default: tiers.default,
            sources,
        }
    }
}

impl Default for TrustTiers {
    fn default() -> Self {
        TrustTiers::new(
            1.0,
            vec![
                SourceTrust {
                    source: "AskTheraRAGBuddy".to_string(),
                    score: 0.5,
                },
                SourceTrust {
                    source: "Mental Health Dataset".to_string(),
                    score: 0.75,
                },
            ],
        )
    }
}

impl TrustTiers {
    pub fn new(default: f32, sources: impl IntoIterator<Item = SourceTrust>) -> Self {
        TrustTiers {
            default,
            sources: sources.into_iter().map(|s| (s.source, s.score)).collect(),
        }
    }

    pub fn score(&self, source: &str) -> f32 {
        self.sources.get(source).copied().unwrap_or(self.default)
    }

    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f32| (0.0..=1.0).contains(&v);
        if !in_range(self.default) {
            return Err(RagError::Config(format!(
                "default trust score {} is outside [0, 1]",
                self.default
            )));
        }
        if let Some((source, score)) = self.sources.iter().find(|(_, v)| !in_range(**v)) {
            return Err(RagError::Config(format!(
                "trust score {score} for source '{source}' is outside [0, 1]"
            )));
        }
        Ok(())
    }
}

/// `1 - distance` clamped to [0,1]; non-finite distances count as irrelevant.
pub fn relevance_from_distance(distance: f32) -> f32 {
    if !distance.is_finite() {
        return 0.0;
    }
    (1.0 - distance).clamp(0.0, 1.0)
}

/// Order candidates by descending combined score.
///
/// The sort is stable: equal scores keep their generation order.
pub fn rank(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
    candidates
}
