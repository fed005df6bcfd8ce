//! Chain executor state machine.
//!
//! The executor drives an ordered list of steps over one instance:
//! 1. Check coverage (Tier A/B data availability)
//! 2. Check dependencies (`requires()` against step ids with status OK)
//! 3. Prompt, call the backend, parse, fetch ground truth, score
//! 4. Record the result and apply gate-voiding
//!
//! ## Rules
//!
//! - The executor owns status, never the step or the model.
//! - Only status OK satisfies a dependency. Correctness does not matter.
//! - Steps run in the given order. There is no topological sort: a step
//!   whose dependencies come later in the list is skipped.
//! - When the gate step runs OK and scores incorrect, the target step's
//!   result is voided. Its status and score are left untouched.

use chrono::Utc;
use std::time::Instant;
use thiserror::Error;

use crate::backend::Backend;
use crate::context::ChainContext;
use crate::schemas::{ChainInstance, ChainResult, Provenance, StepResult, StepRun};
use crate::step::Step;

/// Default gate step id (citation integrity).
pub const DEFAULT_GATE_ID: &str = "s7";

/// Default step id voided by the gate (IRAC synthesis).
pub const DEFAULT_TARGET_ID: &str = "s6";

/// Reason recorded on voided results.
pub const VOID_REASON: &str = "S7 citation integrity gate failed";

/// Errors from assembling an executor.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Backend not configured")]
    BackendNotConfigured,
}

/// Executes chain steps on instances with dependency resolution.
pub struct ChainExecutor<B> {
    backend: B,
    steps: Vec<Box<dyn Step>>,
    gate_id: String,
    target_id: String,
}

impl<B: Backend> ChainExecutor<B> {
    /// Executor with the default gate ("s7") and target ("s6").
    pub fn new(backend: B, steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            backend,
            steps,
            gate_id: DEFAULT_GATE_ID.to_string(),
            target_id: DEFAULT_TARGET_ID.to_string(),
        }
    }

    pub fn builder() -> ChainExecutorBuilder<B> {
        ChainExecutorBuilder::new()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn steps(&self) -> &[Box<dyn Step>] {
        &self.steps
    }

    pub fn gate_id(&self) -> &str {
        &self.gate_id
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Execute all steps on one instance.
    pub fn execute(&self, instance: &ChainInstance) -> ChainResult {
        let mut ctx = ChainContext::new(instance);
        let mut gate_fired = false;

        for step in &self.steps {
            let result = self.execute_step(step.as_ref(), &ctx);
            let step_id = step.step_id().to_string();
            let fires = step_id == self.gate_id && result.is_ok() && !result.correct();

            ctx.insert(step_id, result);

            if fires && !gate_fired {
                gate_fired = true;
                self.apply_voiding(&mut ctx);
            }
        }

        tracing::info!(
            instance = %instance.id,
            steps = ctx.step_results().len(),
            voided = gate_fired,
            "Chain executed"
        );

        let void_reason = gate_fired.then(|| VOID_REASON.to_string());
        ctx.into_result(gate_fired, void_reason)
    }

    /// Execute every instance in order.
    pub fn execute_all<'a, I>(&self, instances: I) -> Vec<ChainResult>
    where
        I: IntoIterator<Item = &'a ChainInstance>,
    {
        instances.into_iter().map(|i| self.execute(i)).collect()
    }

    /// Execute a single step with coverage and dependency checks.
    fn execute_step(&self, step: &dyn Step, ctx: &ChainContext<'_>) -> StepResult {
        let step_id = step.step_id();

        if !step.check_coverage(ctx) {
            tracing::debug!(step = step_id, "Coverage not met, skipping");
            return StepResult::skipped_coverage(step_id, step.step_name(), step.variant());
        }

        let ok_ids = ctx.ok_step_ids();
        let missing: Vec<String> = step
            .requires()
            .into_iter()
            .filter(|id| !ok_ids.contains(id.as_str()))
            .collect();
        if !missing.is_empty() {
            tracing::debug!(step = step_id, missing = ?missing, "Dependencies not met, skipping");
            return StepResult::skipped_dependency(
                step_id,
                step.step_name(),
                step.variant(),
                &missing,
            );
        }

        let prompt = step.prompt(ctx);
        let timestamp = Utc::now();
        let started = Instant::now();
        let raw_response = self.backend.complete(&prompt);
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let parsed = step.parse(&raw_response);
        let ground_truth = step.ground_truth(ctx);
        let (score, correct) = step.score(&parsed, &ground_truth);

        tracing::debug!(step = step_id, score, correct, latency_ms, "Step scored");

        let provenance = Provenance {
            model: self.backend.model_id().to_string(),
            timestamp: Some(timestamp),
            latency_ms,
            tokens_in: self.backend.estimate_tokens(&prompt),
            tokens_out: self.backend.estimate_tokens(&raw_response),
        };

        step.create_result(
            StepRun {
                prompt,
                raw_response,
                parsed,
                ground_truth,
                score,
                correct,
            },
            provenance,
        )
    }

    /// Void the target result if it ran OK.
    fn apply_voiding(&self, ctx: &mut ChainContext<'_>) {
        match ctx.get_mut(&self.target_id) {
            Some(target) if target.is_ok() => {
                tracing::warn!(
                    gate = %self.gate_id,
                    target = %self.target_id,
                    "Integrity gate failed, voiding target result"
                );
                target.void(VOID_REASON);
            }
            _ => {
                tracing::debug!(target = %self.target_id, "Gate failed but target did not run OK");
            }
        }
    }
}

/// Builder for [`ChainExecutor`].
pub struct ChainExecutorBuilder<B> {
    backend: Option<B>,
    steps: Vec<Box<dyn Step>>,
    gate_id: String,
    target_id: String,
}

impl<B: Backend> ChainExecutorBuilder<B> {
    pub fn new() -> Self {
        Self {
            backend: None,
            steps: Vec::new(),
            gate_id: DEFAULT_GATE_ID.to_string(),
            target_id: DEFAULT_TARGET_ID.to_string(),
        }
    }

    pub fn backend(mut self, backend: B) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Append a step. Steps run in the order they are added.
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Box<dyn Step>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Step id whose incorrect result triggers voiding.
    pub fn gate(mut self, step_id: impl Into<String>) -> Self {
        self.gate_id = step_id.into();
        self
    }

    /// Step id voided when the gate fails.
    pub fn target(mut self, step_id: impl Into<String>) -> Self {
        self.target_id = step_id.into();
        self
    }

    pub fn build(self) -> Result<ChainExecutor<B>, ExecutorError> {
        let backend = self.backend.ok_or(ExecutorError::BackendNotConfigured)?;

        Ok(ChainExecutor {
            backend,
            steps: self.steps,
            gate_id: self.gate_id,
            target_id: self.target_id,
        })
    }
}

impl<B: Backend> Default for ChainExecutorBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::schemas::{CourtCase, ShepardsEdge, StepStatus};
    use crate::step::StubStep;

    fn instance(cited_text: bool, citing_text: bool) -> ChainInstance {
        let mut cited = CourtCase::new("347 U.S. 483", "Brown v. Board of Education", 1954);
        if cited_text {
            cited = cited.with_opinion("We conclude that in the field of public education...");
        }
        let mut citing = CourtCase::new("349 U.S. 294", "Brown v. Board of Education II", 1955);
        if citing_text {
            citing = citing.with_opinion("These cases were decided on May 17, 1954...");
        }
        ChainInstance::from_edge(
            cited,
            Some(citing),
            ShepardsEdge {
                cited_case_us_cite: "347 U.S. 483".to_string(),
                citing_case_us_cite: "349 U.S. 294".to_string(),
                cited_case_name: "Brown v. Board of Education".to_string(),
                citing_case_name: Some("Brown v. Board of Education II".to_string()),
                shepards: "followed".to_string(),
                agree: true,
                cited_case_year: Some(1954),
                citing_case_year: Some(1955),
            },
            None,
        )
    }

    fn executor(steps: Vec<StubStep>) -> ChainExecutor<MockBackend> {
        let steps = steps
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn Step>)
            .collect();
        ChainExecutor::new(MockBackend::new("{}"), steps)
    }

    fn status(result: &ChainResult, step_id: &str) -> StepStatus {
        result.get(step_id).map(StepResult::status).unwrap()
    }

    // Dependency resolution

    #[test]
    fn test_no_dependencies_executes() {
        let result = executor(vec![StubStep::new("s1")]).execute(&instance(true, false));
        assert_eq!(status(&result, "s1"), StepStatus::Ok);
    }

    #[test]
    fn test_satisfied_dependency_executes() {
        let result = executor(vec![
            StubStep::new("s1"),
            StubStep::new("s2").with_requires(["s1"]),
        ])
        .execute(&instance(true, false));

        assert_eq!(status(&result, "s1"), StepStatus::Ok);
        assert_eq!(status(&result, "s2"), StepStatus::Ok);
        assert!(!result.voided);
    }

    #[test]
    fn test_unsatisfied_dependency_skipped() {
        let result = executor(vec![StubStep::new("s2").with_requires(["s1"])])
            .execute(&instance(true, false));

        let s2 = result.get("s2").unwrap();
        assert_eq!(s2.status(), StepStatus::SkippedDependency);
        assert_eq!(s2.model_errors(), [r#"Missing dependencies: ["s1"]"#.to_string()]);
    }

    #[test]
    fn test_skipped_dependency_cascades() {
        let result = executor(vec![
            StubStep::new("s1").with_requires(["s0"]),
            StubStep::new("s2").with_requires(["s1"]),
        ])
        .execute(&instance(true, false));

        assert_eq!(status(&result, "s1"), StepStatus::SkippedDependency);
        assert_eq!(status(&result, "s2"), StepStatus::SkippedDependency);
    }

    #[test]
    fn test_incorrect_dependency_still_satisfies() {
        let result = executor(vec![
            StubStep::new("s1").with_correct(false).with_score(0.0),
            StubStep::new("s2").with_requires(["s1"]),
        ])
        .execute(&instance(true, false));

        assert!(!result.get("s1").unwrap().correct());
        assert_eq!(status(&result, "s2"), StepStatus::Ok);
    }

    #[test]
    fn test_partial_dependencies_reports_exact_missing() {
        let result = executor(vec![
            StubStep::new("s1"),
            StubStep::new("s5").with_variant("cb").with_requires(["s4", "s1", "s3"]),
        ])
        .execute(&instance(true, false));

        let s5 = result.get("s5:cb").unwrap();
        assert_eq!(s5.status(), StepStatus::SkippedDependency);
        assert_eq!(s5.model_errors(), [r#"Missing dependencies: ["s3", "s4"]"#.to_string()]);
    }

    #[test]
    fn test_no_topological_sort() {
        let result = executor(vec![
            StubStep::new("s2").with_requires(["s1"]),
            StubStep::new("s1"),
        ])
        .execute(&instance(true, false));

        assert_eq!(status(&result, "s2"), StepStatus::SkippedDependency);
        assert_eq!(status(&result, "s1"), StepStatus::Ok);
        let order: Vec<&str> = result.step_results.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["s2", "s1"]);
    }

    #[test]
    fn test_skipped_steps_do_not_call_backend() {
        let exec = executor(vec![
            StubStep::new("s1"),
            StubStep::new("s2").with_requires(["missing"]),
            StubStep::new("s3").with_citing_text_required(true),
        ]);
        exec.execute(&instance(true, false));

        assert_eq!(exec.backend().call_history(), vec!["[STUB PROMPT for s1]"]);
    }

    // Variants

    #[test]
    fn test_variants_stored_separately() {
        let result = executor(vec![
            StubStep::new("s5").with_variant("cb").with_score(0.8),
            StubStep::new("s5").with_variant("rag").with_score(0.9),
        ])
        .execute(&instance(true, true));

        assert_eq!(result.get("s5:cb").unwrap().score(), 0.8);
        assert_eq!(result.get("s5:rag").unwrap().score(), 0.9);
        assert_eq!(result.get("s5:rag").unwrap().step(), "s5");
    }

    #[test]
    fn test_variant_does_not_satisfy_other_variant() {
        let result = executor(vec![
            StubStep::new("s5").with_variant("a"),
            StubStep::new("s6").with_requires(["s5:b"]),
            StubStep::new("s7").with_requires(["s5"]),
        ])
        .execute(&instance(true, false));

        assert_eq!(status(&result, "s5:a"), StepStatus::Ok);
        assert_eq!(status(&result, "s6"), StepStatus::SkippedDependency);
        assert_eq!(status(&result, "s7"), StepStatus::SkippedDependency);
    }

    #[test]
    fn test_variant_dependency_resolution() {
        let result = executor(vec![
            StubStep::new("s5").with_variant("cb"),
            StubStep::new("s6").with_requires(["s5:cb"]),
        ])
        .execute(&instance(true, false));

        assert_eq!(status(&result, "s6"), StepStatus::Ok);
    }

    // Coverage

    #[test]
    fn test_tier_b_required_but_missing() {
        let result = executor(vec![StubStep::new("s6").with_citing_text_required(true)])
            .execute(&instance(true, false));
        assert_eq!(status(&result, "s6"), StepStatus::SkippedCoverage);
    }

    #[test]
    fn test_tier_b_required_and_present() {
        let result = executor(vec![StubStep::new("s6").with_citing_text_required(true)])
            .execute(&instance(true, true));
        assert_eq!(status(&result, "s6"), StepStatus::Ok);
    }

    #[test]
    fn test_coverage_checked_before_dependencies() {
        let result = executor(vec![StubStep::new("s6")
            .with_citing_text_required(true)
            .with_requires(["missing"])])
        .execute(&instance(true, false));
        assert_eq!(status(&result, "s6"), StepStatus::SkippedCoverage);
    }

    // Gate voiding

    #[test]
    fn test_gate_correct_no_voiding() {
        let result = executor(vec![
            StubStep::new("s6"),
            StubStep::new("s7").with_requires(["s6"]),
        ])
        .execute(&instance(true, false));

        assert!(!result.get("s6").unwrap().voided());
        assert!(!result.voided);
        assert!(result.void_reason.is_none());
    }

    #[test]
    fn test_gate_incorrect_voids_target() {
        let result = executor(vec![
            StubStep::new("s6").with_score(0.9),
            StubStep::new("s7").with_requires(["s6"]).with_correct(false),
        ])
        .execute(&instance(true, false));

        let s6 = result.get("s6").unwrap();
        assert!(s6.voided());
        assert_eq!(s6.void_reason(), Some(VOID_REASON));
        assert_eq!(s6.status(), StepStatus::Ok);
        assert_eq!(s6.score(), 0.9);
        assert!(s6.correct());
        assert!(result.voided);
        assert_eq!(result.void_reason.as_deref(), Some(VOID_REASON));
    }

    #[test]
    fn test_gate_skipped_no_voiding() {
        let result = executor(vec![
            StubStep::new("s6"),
            StubStep::new("s7").with_requires(["nonexistent"]).with_correct(false),
        ])
        .execute(&instance(true, false));

        assert_eq!(status(&result, "s7"), StepStatus::SkippedDependency);
        assert!(!result.get("s6").unwrap().voided());
        assert!(!result.voided);
    }

    #[test]
    fn test_gate_coverage_skip_no_voiding() {
        let result = executor(vec![
            StubStep::new("s6"),
            StubStep::new("s7").with_citing_text_required(true).with_correct(false),
        ])
        .execute(&instance(true, false));

        assert_eq!(status(&result, "s7"), StepStatus::SkippedCoverage);
        assert!(!result.get("s6").unwrap().voided());
        assert!(!result.voided);
    }

    #[test]
    fn test_gate_fires_without_ok_target() {
        let result = executor(vec![
            StubStep::new("s6").with_requires(["s5"]),
            StubStep::new("s7").with_correct(false),
        ])
        .execute(&instance(true, false));

        assert!(!result.get("s6").unwrap().voided());
        assert!(result.voided);
    }

    #[test]
    fn test_custom_gate_and_target() {
        let steps: Vec<Box<dyn Step>> = vec![
            Box::new(StubStep::new("s6")),
            Box::new(StubStep::new("draft")),
            Box::new(StubStep::new("check").with_correct(false)),
        ];
        let exec = ChainExecutor::builder()
            .backend(MockBackend::new("{}"))
            .steps(steps)
            .gate("check")
            .target("draft")
            .build()
            .unwrap();

        let result = exec.execute(&instance(true, false));
        assert!(result.get("draft").unwrap().voided());
        assert!(!result.get("s6").unwrap().voided());
        assert!(result.voided);
    }

    #[test]
    fn test_builder_requires_backend() {
        let result = ChainExecutor::<MockBackend>::builder()
            .step(StubStep::new("s1"))
            .build();
        assert!(matches!(result, Err(ExecutorError::BackendNotConfigured)));
    }

    // Full chain

    #[test]
    fn test_full_chain_all_pass() {
        let result = executor(vec![
            StubStep::new("s1"),
            StubStep::new("s2").with_requires(["s1"]),
            StubStep::new("s3").with_requires(["s2"]),
            StubStep::new("s4"),
            StubStep::new("s5").with_variant("cb").with_requires(["s1", "s4"]),
            StubStep::new("s6").with_requires(["s5:cb"]),
            StubStep::new("s7").with_requires(["s6"]),
        ])
        .execute(&instance(true, true));

        assert_eq!(result.step_results.len(), 7);
        for (step_id, step_result) in &result.step_results {
            assert_eq!(step_result.status(), StepStatus::Ok, "{} should be OK", step_id);
        }
        assert!(!result.voided);
        assert_eq!(result.instance_id, "pair::347_us_483::349_us_294");
    }

    #[test]
    fn test_provenance_recorded() {
        let exec = ChainExecutor::new(
            MockBackend::new("0123456789abcdef"),
            vec![Box::new(StubStep::new("s1")) as Box<dyn Step>],
        );
        let result = exec.execute(&instance(true, false));
        let s1 = result.get("s1").unwrap();

        assert_eq!(s1.model(), "mock");
        assert!(s1.timestamp().is_some());
        assert!(s1.latency_ms() >= 0.0);
        assert_eq!(s1.tokens_out(), 4);
        assert_eq!(s1.raw_response(), "0123456789abcdef");
        assert_eq!(s1.prompt(), "[STUB PROMPT for s1]");
    }

    #[test]
    fn test_execute_all_uses_fresh_context() {
        let exec = executor(vec![
            StubStep::new("s6"),
            StubStep::new("s7").with_requires(["s6"]).with_citing_text_required(true).with_correct(false),
        ]);
        let instances = vec![instance(true, true), instance(true, false)];
        let results = exec.execute_all(&instances);

        assert_eq!(results.len(), 2);
        assert!(results[0].voided);
        assert!(!results[1].voided);
        assert!(!results[1].get("s6").unwrap().voided());
    }
}
