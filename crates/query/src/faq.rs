use serde::Serialize;
use std::sync::Arc;

use claims::{EvidenceChunk, EvidenceRetriever};
use extract::OllamaClient;

use crate::prompt::build_faq_prompt;

pub const FAQ_FALLBACK: &str = "We couldn’t find this answer in our policy database. \
Please contact Bajaj Allianz Health Insurance Customer Care at 1800-209-5858 \
or visit https://www.bajajallianz.com for more information.";

const RETRIEVAL_K: usize = 12;
const HIGH_QUALITY_SCORE: f32 = 0.85;

#[derive(Debug, Clone, Serialize)]
pub struct FaqAnswer {
    pub question: String,
    pub answer: String,
    pub chunks_used: usize,
    pub timestamp: String,
}

/// Answers free-form policy questions from retrieved policy text.
pub struct PolicyFaq {
    retriever: Arc<dyn EvidenceRetriever>,
    llm: OllamaClient,
}

impl PolicyFaq {
    pub fn new(retriever: Arc<dyn EvidenceRetriever>, llm: OllamaClient) -> Self {
        Self { retriever, llm }
    }

    pub async fn answer(&self, question: &str) -> FaqAnswer {
        let chunks = match self.retriever.retrieve(question, RETRIEVAL_K).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::error!(error = %e, "FAQ retrieval failed");
                Vec::new()
            }
        };

        let top_chunks = select_chunks(chunks);
        let answer = if top_chunks.is_empty() {
            tracing::warn!(question, "No policy chunks found");
            FAQ_FALLBACK.to_string()
        } else {
            let context = top_chunks
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            match self.llm.generate(&build_faq_prompt(question, &context)).await {
                Ok(answer) => finalize_answer(&answer, &top_chunks),
                Err(e) => {
                    tracing::error!(error = %e, "FAQ answer generation failed");
                    FAQ_FALLBACK.to_string()
                }
            }
        };

        FaqAnswer {
            question: question.to_string(),
            answer,
            chunks_used: top_chunks.len(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub async fn answer_all(&self, questions: &[String]) -> Vec<FaqAnswer> {
        let mut answers = Vec::with_capacity(questions.len());
        for question in questions {
            answers.push(self.answer(question).await);
        }
        answers
    }
}

/// Chunks scoring at least 0.85, best six; otherwise the first three as retrieved.
pub fn select_chunks(mut chunks: Vec<EvidenceChunk>) -> Vec<EvidenceChunk> {
    chunks.retain(|c| !c.text.trim().is_empty());

    let mut high_quality: Vec<EvidenceChunk> = chunks
        .iter()
        .filter(|c| c.score >= HIGH_QUALITY_SCORE)
        .cloned()
        .collect();

    if high_quality.is_empty() {
        chunks.truncate(3);
        chunks
    } else {
        EvidenceChunk::rank(&mut high_quality);
        high_quality.truncate(6);
        high_quality
    }
}

/// A model reply that gives up is replaced by the first line of the best chunk.
pub fn finalize_answer(answer: &str, top_chunks: &[EvidenceChunk]) -> String {
    let answer = answer.trim();
    let gave_up = answer.is_empty() || answer.to_lowercase().contains("not available");

    match top_chunks.first() {
        Some(top) if gave_up => {
            let first_line = top.text.trim().lines().next().unwrap_or_default();
            format!("From the policy: {}...", first_line)
        }
        None if gave_up => FAQ_FALLBACK.to_string(),
        _ => answer.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use claims::CollaboratorResult;

    struct NoChunks;

    #[async_trait]
    impl EvidenceRetriever for NoChunks {
        async fn retrieve(&self, _query_text: &str, _k: usize) -> CollaboratorResult<Vec<EvidenceChunk>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_high_quality_chunks_are_preferred() {
        let chunks = vec![
            EvidenceChunk::new("low", 0.40),
            EvidenceChunk::new("good", 0.86),
            EvidenceChunk::new("best", 0.97),
        ];

        let selected = select_chunks(chunks);

        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].text, "best");
    }

    #[test]
    fn test_low_scores_fall_back_to_first_three() {
        let chunks: Vec<_> = (0..5).map(|i| EvidenceChunk::new(format!("chunk {}", i), 0.5)).collect();
        let selected = select_chunks(chunks);
        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0].text, "chunk 0");
    }

    #[test]
    fn test_unhelpful_answer_uses_top_chunk() {
        let chunks = vec![EvidenceChunk::new("Cataract surgery is capped at Rs 40,000.\nSee annexure.", 0.9)];

        let answer = finalize_answer("This information is not available in the policy database.", &chunks);

        assert_eq!(answer, "From the policy: Cataract surgery is capped at Rs 40,000....");
        assert_eq!(finalize_answer("Covered up to 40,000.", &chunks), "Covered up to 40,000.");
    }

    #[tokio::test]
    async fn test_no_chunks_returns_fallback_without_model() {
        let faq = PolicyFaq::new(
            Arc::new(NoChunks),
            OllamaClient::new("http://127.0.0.1:9".to_string(), "llama3".to_string()),
        );

        let answer = faq.answer("Is AYUSH covered?").await;

        assert_eq!(answer.answer, FAQ_FALLBACK);
        assert_eq!(answer.chunks_used, 0);
    }
}
