use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;

use claims::{CollaboratorResult, FinalResponse, ResponseSink};

/// Writes every response to `<dir>/<uuid>.json`.
pub struct FileResponseStore {
    output_dir: PathBuf,
}

impl FileResponseStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl ResponseSink for FileResponseStore {
    async fn persist(&self, response: &FinalResponse) -> CollaboratorResult<()> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;

        let file = self.output_dir.join(format!("{}.json", uuid::Uuid::new_v4()));
        let json = serde_json::to_string_pretty(response).context("Failed to serialize response")?;
        tokio::fs::write(&file, json)
            .await
            .with_context(|| format!("Failed to write {}", file.display()))?;

        tracing::debug!(path = %file.display(), "Persisted response");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::{FinalDecision, ParsedQuery};

    #[tokio::test]
    async fn test_writes_one_file_per_response() {
        let dir = std::env::temp_dir().join(format!("claims-store-{}", uuid::Uuid::new_v4()));
        let store = FileResponseStore::new(&dir);
        let decision = FinalDecision::rejected("no evidence");
        let response = FinalResponse::new("46M, knee surgery", ParsedQuery::default(), &decision, "explained");

        store.persist(&response).await.unwrap();
        store.persist(&response).await.unwrap();

        let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
        let mut stored = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            stored.push(tokio::fs::read_to_string(entry.path()).await.unwrap());
        }
        assert_eq!(stored.len(), 2);

        let back: FinalResponse = serde_json::from_str(&stored[0]).unwrap();
        assert_eq!(back, response);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
