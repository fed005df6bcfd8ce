//! Step and chain results.
//!
//! A [`StepResult`] is immutable once built, with one exception: the
//! `voided`/`void_reason` pair, which only the executor's gate-voiding may
//! set (see [`StepResult::void`]). Timing and token provenance are passed
//! in at construction through [`Provenance`].

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Structured step payload (parsed response or ground truth).
pub type Payload = Map<String, Value>;

/// Key carrying parse failures inside a payload.
pub const ERRORS_KEY: &str = "errors";

/// Build the payload a step returns when it cannot parse a response.
pub fn error_payload<I, S>(errors: I) -> Payload
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut payload = Payload::new();
    payload.insert(
        ERRORS_KEY.to_string(),
        Value::Array(errors.into_iter().map(|e| Value::String(e.into())).collect()),
    );
    payload
}

/// Whether a payload records a parse failure.
pub fn has_errors(payload: &Payload) -> bool {
    payload.contains_key(ERRORS_KEY)
}

/// Error strings recorded in a payload, stringifying non-string entries.
pub fn payload_errors(payload: &Payload) -> Vec<String> {
    match payload.get(ERRORS_KEY) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Errors from status handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("Invalid status '{0}'. Must be one of: OK, SKIPPED_COVERAGE, SKIPPED_DEPENDENCY")]
    Invalid(String),
}

/// Execution status. Assigned by the executor, never by a step or model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Ok,
    SkippedCoverage,
    SkippedDependency,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Ok => "OK",
            StepStatus::SkippedCoverage => "SKIPPED_COVERAGE",
            StepStatus::SkippedDependency => "SKIPPED_DEPENDENCY",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, StepStatus::Ok)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(StepStatus::Ok),
            "SKIPPED_COVERAGE" => Ok(StepStatus::SkippedCoverage),
            "SKIPPED_DEPENDENCY" => Ok(StepStatus::SkippedDependency),
            other => Err(StatusError::Invalid(other.to_string())),
        }
    }
}

/// Who produced a result, when, and at what cost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Provenance {
    pub model: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub latency_ms: f64,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

impl Provenance {
    /// Provenance for a result produced without a timed backend call.
    pub fn model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Everything a step produced during one OK run.
#[derive(Debug, Clone, Default)]
pub struct StepRun {
    pub prompt: String,
    pub raw_response: String,
    pub parsed: Payload,
    pub ground_truth: Payload,
    pub score: f64,
    pub correct: bool,
}

/// Result of executing (or skipping) one step on one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    step_id: String,
    step: String,
    variant: Option<String>,
    status: StepStatus,

    prompt: String,
    raw_response: String,
    parsed: Payload,
    ground_truth: Payload,
    score: f64,
    correct: bool,

    voided: bool,
    void_reason: Option<String>,

    model: String,
    timestamp: Option<DateTime<Utc>>,
    latency_ms: f64,
    tokens_in: u32,
    tokens_out: u32,

    /// Parse errors for OK results, skip diagnostics otherwise
    model_errors: Vec<String>,
}

impl StepResult {
    fn empty(step_id: &str, step: &str, variant: Option<&str>, status: StepStatus) -> Self {
        Self {
            step_id: step_id.to_string(),
            step: step.to_string(),
            variant: variant.map(str::to_string),
            status,
            prompt: String::new(),
            raw_response: String::new(),
            parsed: Payload::new(),
            ground_truth: Payload::new(),
            score: 0.0,
            correct: false,
            voided: false,
            void_reason: None,
            model: String::new(),
            timestamp: None,
            latency_ms: 0.0,
            tokens_in: 0,
            tokens_out: 0,
            model_errors: Vec::new(),
        }
    }

    /// A completed run with status OK.
    ///
    /// Scores are clamped to `[0, 1]`; a NaN score counts as 0.
    pub fn completed(
        step_id: &str,
        step: &str,
        variant: Option<&str>,
        run: StepRun,
        provenance: Provenance,
    ) -> Self {
        let score = if run.score.is_nan() {
            0.0
        } else {
            run.score.clamp(0.0, 1.0)
        };
        let model_errors = payload_errors(&run.parsed);

        Self {
            prompt: run.prompt,
            raw_response: run.raw_response,
            parsed: run.parsed,
            ground_truth: run.ground_truth,
            score,
            correct: run.correct,
            model: provenance.model,
            timestamp: provenance.timestamp,
            latency_ms: provenance.latency_ms,
            tokens_in: provenance.tokens_in,
            tokens_out: provenance.tokens_out,
            model_errors,
            ..Self::empty(step_id, step, variant, StepStatus::Ok)
        }
    }

    /// The step's data-availability precondition failed.
    pub fn skipped_coverage(step_id: &str, step: &str, variant: Option<&str>) -> Self {
        Self::empty(step_id, step, variant, StepStatus::SkippedCoverage)
    }

    /// Required steps had not run with status OK. `missing` is recorded
    /// sorted as a diagnostic.
    pub fn skipped_dependency(
        step_id: &str,
        step: &str,
        variant: Option<&str>,
        missing: &[String],
    ) -> Self {
        let mut missing = missing.to_vec();
        missing.sort();

        let mut result = Self::empty(step_id, step, variant, StepStatus::SkippedDependency);
        result.model_errors = vec![format!("Missing dependencies: {:?}", missing)];
        result
    }

    /// Mark this result void. Only the executor's gate-voiding calls this.
    pub(crate) fn void(&mut self, reason: impl Into<String>) {
        self.voided = true;
        self.void_reason = Some(reason.into());
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// Logical step name shared across variants
    pub fn step(&self) -> &str {
        &self.step
    }

    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn raw_response(&self) -> &str {
        &self.raw_response
    }

    pub fn parsed(&self) -> &Payload {
        &self.parsed
    }

    pub fn ground_truth(&self) -> &Payload {
        &self.ground_truth
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn correct(&self) -> bool {
        self.correct
    }

    pub fn voided(&self) -> bool {
        self.voided
    }

    pub fn void_reason(&self) -> Option<&str> {
        self.void_reason.as_deref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }

    pub fn tokens_in(&self) -> u32 {
        self.tokens_in
    }

    pub fn tokens_out(&self) -> u32 {
        self.tokens_out
    }

    pub fn model_errors(&self) -> &[String] {
        &self.model_errors
    }
}

/// Result of executing a complete chain on one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainResult {
    pub instance_id: String,

    /// Results keyed by step id, in execution order
    #[serde(default)]
    pub step_results: IndexMap<String, StepResult>,

    /// True if the integrity gate fired
    #[serde(default)]
    pub voided: bool,

    #[serde(default)]
    pub void_reason: Option<String>,
}

impl ChainResult {
    pub fn get(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results.get(step_id)
    }
}
