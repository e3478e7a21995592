use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use claims::{LanguageNormalizer, ResponseSink};
use extract::{HeuristicStructurer, OllamaClient, QueryExtractor, RetryPolicy};
use index::{
    EmbeddingCache, EmbeddingClient, FileResponseStore, QdrantCollection, QdrantResponseStore,
    QdrantRetriever,
};
use query::{EnglishOnly, LlmExplainer, LlmJudge, LlmLanguageNormalizer, SerpApiSearch};
use rules::RulesEngine;
use workflow::{Collaborators, Offline, RulesSummaryExplainer, WorkflowConfig};

use crate::config::{AppConfig, StoreBackend};

pub fn workflow_config(config: &AppConfig) -> WorkflowConfig {
    WorkflowConfig {
        top_k: config.workflow.top_k,
        max_retries: config.workflow.max_retries,
        stage_timeout: Duration::from_secs(config.workflow.stage_timeout_secs),
    }
}

/// No network services; the rules engine decides and explains.
pub fn offline_collaborators(engine: Arc<RulesEngine>) -> Collaborators {
    Collaborators {
        structurer: Arc::new(HeuristicStructurer::new()),
        retriever: Arc::new(Offline),
        web_search: Arc::new(Offline),
        judge: Arc::new(Offline),
        explainer: Arc::new(RulesSummaryExplainer::new(engine)),
        sink: None,
        normalizer: None,
    }
}

pub async fn online_collaborators(config: &AppConfig, engine: &RulesEngine) -> Result<Collaborators> {
    let llm = llm_client(config)?;
    let policy = policy_collection(config)?;

    let sink: Option<Arc<dyn ResponseSink>> = match config.store.backend {
        StoreBackend::Qdrant => {
            let responses = collection(config, &config.vector_store.response_collection)?;
            if let Err(e) = responses.init_collection().await {
                tracing::warn!(error = %e, "Could not prepare response collection");
            }
            Some(Arc::new(QdrantResponseStore::new(responses)))
        }
        StoreBackend::File => Some(Arc::new(FileResponseStore::new(config.store.dir.clone()))),
        StoreBackend::None => None,
    };

    let normalizer: Arc<dyn LanguageNormalizer> = if config.translate {
        Arc::new(LlmLanguageNormalizer::new(llm.clone()))
    } else {
        Arc::new(EnglishOnly)
    };

    let web_search = SerpApiSearch::new(config.web_search.api_key.clone())
        .with_timeout(Duration::from_secs(config.workflow.stage_timeout_secs))?;
    if config.web_search.api_key.is_none() {
        tracing::info!("No SerpAPI key configured, web fallback disabled");
    }

    Ok(Collaborators {
        structurer: Arc::new(QueryExtractor::new(llm.clone())),
        retriever: Arc::new(QdrantRetriever::new(policy)),
        web_search: Arc::new(web_search),
        judge: Arc::new(LlmJudge::new(llm.clone(), &engine.rules().tariff)),
        explainer: Arc::new(LlmExplainer::new(llm)),
        sink,
        normalizer: Some(normalizer),
    })
}

pub fn llm_client(config: &AppConfig) -> Result<OllamaClient> {
    Ok(OllamaClient::new(config.llm.base_url.clone(), config.llm.model.clone())
        .with_timeout(Duration::from_secs(config.llm.request_timeout_secs))?
        .with_retry(retry_policy(config)))
}

pub fn policy_collection(config: &AppConfig) -> Result<QdrantCollection> {
    collection(config, &config.vector_store.policy_collection)
}

fn collection(config: &AppConfig, name: &str) -> Result<QdrantCollection> {
    QdrantCollection::new(
        config.vector_store.url.clone(),
        embedding_client(config)?,
        name.to_string(),
    )
    .with_timeout(Duration::from_secs(config.workflow.stage_timeout_secs))
}

fn embedding_client(config: &AppConfig) -> Result<EmbeddingClient> {
    let client = EmbeddingClient::new(config.embeddings.base_url.clone(), config.embeddings.model.clone())
        .with_timeout(Duration::from_secs(config.llm.request_timeout_secs))?
        .with_retry(retry_policy(config));

    Ok(if config.cache.enabled {
        client.with_cache(EmbeddingCache::new(config.cache.max_entries))
    } else {
        client
    })
}

fn retry_policy(config: &AppConfig) -> RetryPolicy {
    RetryPolicy::new(
        config.retry.max_retries,
        config.retry.initial_backoff_ms,
        config.retry.max_backoff_ms,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::Decision;
    use workflow::{ClaimWorkflow, RunOptions};

    #[test]
    fn test_workflow_config_from_app_config() {
        let mut config = AppConfig::default();
        config.workflow.top_k = 7;
        config.workflow.stage_timeout_secs = 12;

        let wf = workflow_config(&config);
        assert_eq!(wf.top_k, 7);
        assert_eq!(wf.max_retries, 2);
        assert_eq!(wf.stage_timeout, Duration::from_secs(12));
    }

    #[tokio::test]
    async fn test_online_wiring_builds_without_services() {
        let mut config = AppConfig::default();
        config.store.backend = StoreBackend::File;
        let engine = RulesEngine::default();

        let collaborators = online_collaborators(&config, &engine).await.unwrap();
        assert!(collaborators.sink.is_some());
        assert!(collaborators.normalizer.is_some());
    }

    #[tokio::test]
    async fn test_offline_wiring_runs_a_claim() {
        let engine = Arc::new(RulesEngine::default());
        let workflow = ClaimWorkflow::new(
            engine.clone(),
            offline_collaborators(engine),
            workflow_config(&AppConfig::default()),
        );

        let response = workflow
            .run("46M, knee surgery in Pune, 3-month-old policy", RunOptions::default())
            .await;
        assert_eq!(response.decision, Decision::Approved);
    }
}
