use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Workflow stages, used to label timeouts, logs and trace records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    Parse,
    Retrieve,
    WebFallback,
    EvaluateRules,
    Judge,
    Reconcile,
    Explain,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::Parse => "parse",
            Stage::Retrieve => "retrieve",
            Stage::WebFallback => "web_fallback",
            Stage::EvaluateRules => "evaluate_rules",
            Stage::Judge => "judge",
            Stage::Reconcile => "reconcile",
            Stage::Explain => "explain",
            Stage::Persist => "persist",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{stage} timed out after {limit:?}")]
    Timeout { stage: Stage, limit: Duration },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_stage() {
        let err = CollaboratorError::Timeout { stage: Stage::WebFallback, limit: Duration::from_secs(30) };
        assert_eq!(err.to_string(), "web_fallback timed out after 30s");

        let err = CollaboratorError::Timeout { stage: Stage::Explain, limit: Duration::from_millis(200) };
        assert_eq!(err.to_string(), "explain timed out after 200ms");

        let err: CollaboratorError = anyhow::anyhow!("connection refused").into();
        assert_eq!(err.to_string(), "connection refused");
    }
}
