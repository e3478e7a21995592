use serde::{Deserialize, Serialize};

use crate::verdict::Decision;

/// Per-run record of what the workflow did, returned only in trace mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTrace {
    pub language: String,
    pub attempts: usize,
    pub chunks_retrieved: usize,
    pub web_results: usize,
    pub web_fallback_used: bool,
    pub rules_decision: Option<Decision>,
    pub evidence_decision: Option<Decision>,
    pub rules_fallback: bool,
    pub stages: Vec<StageRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: String,
    pub attempt: usize,
    pub elapsed_ms: u64,
    pub outcome: String,
}
