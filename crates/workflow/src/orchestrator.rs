use regex::Regex;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use claims::{
    ClaimVerdict, Clause, CollaboratorError, CollaboratorResult, Decision, EvidenceChunk, EvidenceJudge,
    EvidenceRetriever, Explainer, FinalDecision, FinalResponse, JudgmentRequest, LanguageNormalizer,
    NormalizedText, ParsedQuery, QueryStructurer, ResponseSink, Stage, StageRecord, WebResult, WebSearch,
    WorkflowTrace,
};
use rules::{ClaimData, RulesEngine};

use crate::formatter::ExplanationFormatter;
use crate::metrics::{Metrics, TimedOperation};
use crate::reconciler::{reconcile, uses_rules_fallback};

/// Hard cap on retries; a run makes at most `MAX_RETRIES + 1` evaluation attempts.
pub const MAX_RETRIES: usize = 2;

const DEFAULT_CLAIM_TYPE: &str = "hospitalization";

static PLANNED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bplanned\b").expect("static regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    /// Chunks requested on the first attempt; each retry asks for `top_k` more.
    pub top_k: usize,
    pub max_retries: usize,
    pub stage_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_retries: MAX_RETRIES,
            stage_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub trace_mode: bool,
}

/// The external services one workflow talks to.
pub struct Collaborators {
    pub structurer: Arc<dyn QueryStructurer>,
    pub retriever: Arc<dyn EvidenceRetriever>,
    pub web_search: Arc<dyn WebSearch>,
    pub judge: Arc<dyn EvidenceJudge>,
    pub explainer: Arc<dyn Explainer>,
    pub sink: Option<Arc<dyn ResponseSink>>,
    pub normalizer: Option<Arc<dyn LanguageNormalizer>>,
}

/// Drives one claim query through
/// parse → retrieve → (web fallback) → evaluate rules → reconcile → explain → persist,
/// looping back to retrieve while the decision is not approved and retries remain.
///
/// Every stage fails inward: a collaborator error or timeout becomes that
/// stage's fallback value and the run always produces a `FinalResponse`.
pub struct ClaimWorkflow {
    engine: Arc<RulesEngine>,
    collaborators: Collaborators,
    formatter: ExplanationFormatter,
    config: WorkflowConfig,
    metrics: Arc<Metrics>,
}

impl ClaimWorkflow {
    pub fn new(engine: Arc<RulesEngine>, collaborators: Collaborators, config: WorkflowConfig) -> Self {
        let formatter = ExplanationFormatter::new(collaborators.explainer.clone(), config.stage_timeout);
        Self {
            engine,
            collaborators,
            formatter,
            config,
            metrics: Metrics::new(),
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub async fn run(&self, query: &str, options: RunOptions) -> FinalResponse {
        let timer = TimedOperation::start();
        let mut trace = WorkflowTrace::default();
        let max_retries = self.config.max_retries.min(MAX_RETRIES);
        info!(trace_mode = options.trace_mode, "Claim workflow started");

        let normalized = self.normalize(query, &mut trace).await;
        trace.language = normalized.language.clone();
        let parsed = self.parse(&normalized.text, &mut trace).await;

        let mut attempt = 0;
        let final_decision = loop {
            let k = self.config.top_k.max(1) * (attempt + 1);
            let chunks = self.retrieve(&normalized.text, k, attempt, &mut trace).await;

            let web_results = if chunks.is_empty() {
                self.metrics.record_web_fallback();
                trace.web_fallback_used = true;
                self.web_fallback(&normalized.text, &parsed.location, attempt, &mut trace).await
            } else {
                Vec::new()
            };

            let rules_verdict = self.evaluate_rules(&parsed, &normalized.text, &chunks, attempt, &mut trace);
            let evidence_verdict = self
                .judge(&parsed, &chunks, &web_results, &rules_verdict, attempt, &mut trace)
                .await;

            let started = Instant::now();
            let decision = reconcile(&rules_verdict, &evidence_verdict, chunks.len());
            let rules_fallback = uses_rules_fallback(&evidence_verdict, chunks.len());
            if rules_fallback {
                self.metrics.record_rules_fallback();
            } else if evidence_verdict.decision != rules_verdict.decision {
                self.metrics.record_disagreement();
            }
            record(&mut trace, Stage::Reconcile, attempt, started, decision.decision.as_str());

            trace.attempts = attempt + 1;
            trace.chunks_retrieved = chunks.len();
            trace.web_results = web_results.len();
            trace.rules_decision = Some(rules_verdict.decision);
            trace.evidence_decision = Some(evidence_verdict.decision);
            trace.rules_fallback = rules_fallback;

            debug!(
                attempt,
                rules = %rules_verdict.decision,
                evidence = %evidence_verdict.decision,
                decision = %decision.decision,
                rules_fallback,
                "Attempt reconciled"
            );

            if decision.decision == Decision::Approved || attempt >= max_retries {
                break decision;
            }

            info!(attempt, decision = %decision.decision, "Decision not approved, retrying with wider retrieval");
            self.metrics.record_retry();
            attempt += 1;
        };

        let explanation = self.explain(&parsed, &final_decision, &normalized, &mut trace).await;
        let response = FinalResponse::new(query, parsed, &final_decision, explanation);

        self.persist(&response, &mut trace).await;
        self.metrics.record_run(response.decision, timer.elapsed());
        info!(
            decision = %response.decision,
            amount = response.amount,
            attempts = trace.attempts,
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "Claim workflow finished"
        );

        response.with_trace(options.trace_mode.then_some(trace))
    }

    async fn normalize(&self, query: &str, trace: &mut WorkflowTrace) -> NormalizedText {
        let Some(normalizer) = &self.collaborators.normalizer else {
            return NormalizedText::unchanged(query);
        };
        if query.trim().is_empty() {
            return NormalizedText::unchanged(query);
        }

        match self.call(Stage::Normalize, 0, trace, normalizer.normalize(query)).await {
            Ok(normalized) if !normalized.text.trim().is_empty() => normalized,
            _ => NormalizedText::unchanged(query),
        }
    }

    async fn parse(&self, text: &str, trace: &mut WorkflowTrace) -> ParsedQuery {
        if text.trim().is_empty() {
            record(trace, Stage::Parse, 0, Instant::now(), "skipped: empty query");
            return ParsedQuery::failed("empty query");
        }

        match self.call(Stage::Parse, 0, trace, self.collaborators.structurer.structure(text)).await {
            Ok(parsed) => parsed,
            Err(e) => ParsedQuery::failed(e.to_string()),
        }
    }

    async fn retrieve(&self, text: &str, k: usize, attempt: usize, trace: &mut WorkflowTrace) -> Vec<EvidenceChunk> {
        if text.trim().is_empty() {
            record(trace, Stage::Retrieve, attempt, Instant::now(), "skipped: empty query");
            return Vec::new();
        }

        let mut chunks = self
            .call(Stage::Retrieve, attempt, trace, self.collaborators.retriever.retrieve(text, k))
            .await
            .unwrap_or_default();
        chunks.retain(|c| !c.text.trim().is_empty());
        EvidenceChunk::rank(&mut chunks);
        chunks
    }

    async fn web_fallback(
        &self,
        text: &str,
        location: &str,
        attempt: usize,
        trace: &mut WorkflowTrace,
    ) -> Vec<WebResult> {
        if text.trim().is_empty() {
            record(trace, Stage::WebFallback, attempt, Instant::now(), "skipped: empty query");
            return Vec::new();
        }

        self.call(
            Stage::WebFallback,
            attempt,
            trace,
            self.collaborators.web_search.search(text, location),
        )
        .await
        .unwrap_or_default()
    }

    fn evaluate_rules(
        &self,
        parsed: &ParsedQuery,
        text: &str,
        chunks: &[EvidenceChunk],
        attempt: usize,
        trace: &mut WorkflowTrace,
    ) -> ClaimVerdict {
        let started = Instant::now();
        let verdict = match &parsed.error {
            Some(error) => {
                let reason = format!("No reliable structured claim data: {}", error);
                ClaimVerdict::new(Decision::Rejected, Some(0.0), reason.clone())
                    .with_clauses(vec![Clause::system(reason)])
            }
            None => {
                let claim = self.claim_data(parsed, text, chunks);
                self.engine.evaluate(&claim)
            }
        };
        record(trace, Stage::EvaluateRules, attempt, started, verdict.decision.as_str());
        verdict
    }

    /// Rules-engine input for a structured query. A missing amount is
    /// estimated from the procedure tariff and the policy age.
    pub fn claim_data(&self, parsed: &ParsedQuery, text: &str, chunks: &[EvidenceChunk]) -> ClaimData {
        let condition = format!("{} {}", parsed.procedure, text).trim().to_lowercase();
        let amount = parsed.claim_amount.unwrap_or_else(|| {
            self.engine
                .rules()
                .tariff
                .estimate(&parsed.procedure, parsed.policy_duration_months)
        });

        ClaimData {
            amount,
            claim_type: parsed
                .claim_type
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CLAIM_TYPE.to_string()),
            planned_treatment: parsed
                .planned_treatment
                .unwrap_or_else(|| PLANNED.is_match(&condition)),
            condition,
            pre_existing: parsed.pre_existing.unwrap_or(false),
            submitted_days: parsed.submitted_days.unwrap_or(0),
            pre_hosp_days: parsed.pre_hosp_days.unwrap_or(0),
            post_hosp_days: parsed.post_hosp_days.unwrap_or(0),
            pre_authorized: parsed.pre_authorized.unwrap_or(true),
            evidence_limits: chunks.iter().filter_map(|c| c.coverage_limit).collect(),
        }
    }

    async fn judge(
        &self,
        parsed: &ParsedQuery,
        chunks: &[EvidenceChunk],
        web_results: &[WebResult],
        rules_verdict: &ClaimVerdict,
        attempt: usize,
        trace: &mut WorkflowTrace,
    ) -> ClaimVerdict {
        if !parsed.is_reliable() {
            record(trace, Stage::Judge, attempt, Instant::now(), "skipped: no structured claim");
            return ClaimVerdict::internal_failure("no reliable structured claim data");
        }

        let request = JudgmentRequest {
            parsed,
            chunks,
            web_results,
            prior: Some(rules_verdict),
        };
        match self.call(Stage::Judge, attempt, trace, self.collaborators.judge.judge(request)).await {
            Ok(verdict) => verdict,
            Err(e) => ClaimVerdict::internal_failure(e.to_string()),
        }
    }

    async fn explain(
        &self,
        parsed: &ParsedQuery,
        decision: &FinalDecision,
        normalized: &NormalizedText,
        trace: &mut WorkflowTrace,
    ) -> String {
        let started = Instant::now();
        let formatted = self.formatter.format(parsed, decision).await;
        match &formatted.error {
            Some(error) => {
                self.metrics.record_collaborator_failure();
                record(trace, Stage::Explain, 0, started, &format!("fallback: {}", error));
            }
            None => record(trace, Stage::Explain, 0, started, "ok"),
        }

        let Some(normalizer) = &self.collaborators.normalizer else {
            return formatted.text;
        };
        if normalized.is_default_language() {
            return formatted.text;
        }

        match self
            .call(
                Stage::Normalize,
                0,
                trace,
                normalizer.localize(&formatted.text, &normalized.language),
            )
            .await
        {
            Ok(localized) if !localized.trim().is_empty() => localized,
            _ => formatted.text,
        }
    }

    async fn persist(&self, response: &FinalResponse, trace: &mut WorkflowTrace) {
        let Some(sink) = &self.collaborators.sink else {
            return;
        };
        if self.call(Stage::Persist, 0, trace, sink.persist(response)).await.is_err() {
            self.metrics.record_persistence_failure();
        }
    }

    /// Await a collaborator call under the stage timeout, recording the outcome.
    async fn call<T>(
        &self,
        stage: Stage,
        attempt: usize,
        trace: &mut WorkflowTrace,
        fut: impl Future<Output = CollaboratorResult<T>>,
    ) -> CollaboratorResult<T> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.config.stage_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout {
                stage,
                limit: self.config.stage_timeout,
            }),
        };

        match &result {
            Ok(_) => record(trace, stage, attempt, started, "ok"),
            Err(e) => {
                warn!(stage = %stage, attempt, error = %e, "Collaborator failed, using fallback");
                self.metrics.record_collaborator_failure();
                record(trace, stage, attempt, started, &format!("error: {}", e));
            }
        }
        result
    }
}

fn record(trace: &mut WorkflowTrace, stage: Stage, attempt: usize, started: Instant, outcome: &str) {
    trace.stages.push(StageRecord {
        stage: stage.as_str().to_string(),
        attempt,
        elapsed_ms: started.elapsed().as_millis() as u64,
        outcome: outcome.to_string(),
    });
}
