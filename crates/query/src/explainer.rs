use async_trait::async_trait;

use claims::{CollaboratorError, CollaboratorResult, Explainer, FinalDecision, ParsedQuery};
use extract::OllamaClient;

use crate::prompt::build_explanation_prompt;

pub struct LlmExplainer {
    llm: OllamaClient,
}

impl LlmExplainer {
    pub fn new(llm: OllamaClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Explainer for LlmExplainer {
    async fn explain(&self, parsed: &ParsedQuery, decision: &FinalDecision) -> CollaboratorResult<String> {
        let prompt = build_explanation_prompt(parsed, decision);
        let explanation = self
            .llm
            .generate(&prompt)
            .await
            .map_err(|e| CollaboratorError::Unavailable(format!("{:#}", e)))?;

        let explanation = explanation.trim();
        if explanation.is_empty() {
            return Err(CollaboratorError::Malformed("empty explanation".to_string()));
        }
        Ok(explanation.to_string())
    }
}
