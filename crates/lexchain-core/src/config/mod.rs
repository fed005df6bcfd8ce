//! Chain configuration.
//!
//! A chain config is a YAML document naming the ordered steps, the gate and
//! target ids, the mock backend routes and, optionally, inline reference
//! citation lists. Configs are validated against an embedded JSON Schema
//! and then checked for semantic consistency.

mod schema;

pub use schema::{validate_config_schema, SchemaError};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::backend::{Backend, MockBackend};
use crate::citation::ReferenceSets;
use crate::executor::{ChainExecutor, DEFAULT_GATE_ID, DEFAULT_TARGET_ID};
use crate::schemas::Payload;
use crate::step::{CitationIntegrityStep, Step, StubStep};

/// Errors from loading or building a chain config.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to convert config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config does not match schema: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("Config validation failed: {0}")]
    Validation(String),

    #[error("Unknown step kind '{kind}' for step {step_id}")]
    UnknownStepKind { step_id: String, kind: String },
}

const KIND_STUB: &str = "stub";
const KIND_CITATION_INTEGRITY: &str = "citation_integrity";

/// Mock backend routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_response")]
    pub default_response: String,

    /// Ordered; first matching substring wins
    #[serde(default)]
    pub responses: Vec<ResponseRoute>,

    /// Prompts containing any of these substrings are echoed back
    #[serde(default)]
    pub echo: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            default_response: default_response(),
            responses: Vec::new(),
            echo: Vec::new(),
        }
    }
}

fn default_response() -> String {
    "{}".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRoute {
    #[serde(rename = "match")]
    pub needle: String,
    pub response: String,
}

/// Inline reference citation lists for the integrity gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferencesConfig {
    #[serde(default)]
    pub fake: Vec<String>,

    #[serde(default)]
    pub known: Vec<String>,
}

/// One configured step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Step id, `name` or `name:variant`
    pub id: String,

    /// "stub" or "citation_integrity"
    pub kind: String,

    #[serde(default)]
    pub requires: Vec<String>,

    #[serde(default = "default_true")]
    pub correct: bool,

    #[serde(default = "default_score")]
    pub score: f64,

    #[serde(default)]
    pub require_citing_text: bool,

    #[serde(default)]
    pub parsed: Option<Payload>,

    #[serde(default)]
    pub ground_truth: Option<Payload>,

    /// Step verified by a citation_integrity step
    #[serde(default)]
    pub source: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_score() -> f64 {
    1.0
}

fn default_gate() -> String {
    DEFAULT_GATE_ID.to_string()
}

fn default_target() -> String {
    DEFAULT_TARGET_ID.to_string()
}

/// A chain configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_gate")]
    pub gate: String,

    #[serde(default = "default_target")]
    pub target: String,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub references: ReferencesConfig,

    pub steps: Vec<StepConfig>,
}

impl ChainConfig {
    /// Parse and validate a config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let raw: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let value = serde_json::to_value(raw)?;
        validate_config_schema(&value).map_err(ConfigError::Schema)?;

        let config: ChainConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Semantic checks the schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps.is_empty() {
            return Err(ConfigError::Validation("Chain has no steps".to_string()));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate step id: {}",
                    step.id
                )));
            }

            if !(0.0..=1.0).contains(&step.score) {
                return Err(ConfigError::Validation(format!(
                    "Score for {} must be within [0, 1], got {}",
                    step.id, step.score
                )));
            }
        }

        self.steps.iter().try_for_each(|step| self.validate_step_kind(step))
    }

    fn validate_step_kind(&self, step: &StepConfig) -> Result<(), ConfigError> {
        match step.kind.as_str() {
            KIND_STUB => Ok(()),
            KIND_CITATION_INTEGRITY => {
                if step.id != DEFAULT_GATE_ID {
                    return Err(ConfigError::Validation(format!(
                        "citation_integrity step must have id {}, got {}",
                        DEFAULT_GATE_ID, step.id
                    )));
                }
                if step.id != self.gate {
                    return Err(ConfigError::Validation(format!(
                        "citation_integrity step {} is not the configured gate ({})",
                        step.id, self.gate
                    )));
                }
                let source = self.gate_source(step);
                if source != self.target {
                    return Err(ConfigError::Validation(format!(
                        "citation_integrity source {} must be the voiding target ({})",
                        source, self.target
                    )));
                }
                if step.requires.iter().any(|r| r != source) {
                    return Err(ConfigError::Validation(format!(
                        "citation_integrity step may only require its source ({})",
                        source
                    )));
                }
                Ok(())
            }
            other => Err(ConfigError::UnknownStepKind {
                step_id: step.id.clone(),
                kind: other.to_string(),
            }),
        }
    }

    /// Step verified by a citation_integrity step; defaults to the target.
    fn gate_source<'a>(&'a self, step: &'a StepConfig) -> &'a str {
        step.source.as_deref().unwrap_or(&self.target)
    }

    /// Reference sets from the inline lists.
    pub fn reference_sets(&self) -> ReferenceSets {
        ReferenceSets::from_raw(&self.references.fake, &self.references.known)
    }

    /// Instantiate the configured steps, in order.
    ///
    /// `references` replaces the inline reference lists when given.
    pub fn build_steps(
        &self,
        references: Option<&ReferenceSets>,
    ) -> Result<Vec<Box<dyn Step>>, ConfigError> {
        let references = match references {
            Some(r) => r.clone(),
            None => self.reference_sets(),
        };

        self.steps
            .iter()
            .map(|step| self.build_step(step, &references))
            .collect()
    }

    /// Mock backend with the configured routes.
    pub fn build_backend(&self) -> MockBackend {
        let backend = self
            .backend
            .responses
            .iter()
            .fold(MockBackend::new(&self.backend.default_response), |b, r| {
                b.respond(&r.needle, &r.response)
            });

        self.backend.echo.iter().fold(backend, |b, needle| b.echo(needle))
    }

    /// Executor over `backend` with the configured steps, gate and target.
    pub fn build_executor<B: Backend>(
        &self,
        backend: B,
        references: Option<&ReferenceSets>,
    ) -> Result<ChainExecutor<B>, ConfigError> {
        let steps = self.build_steps(references)?;

        tracing::debug!(
            chain = %self.name,
            steps = steps.len(),
            gate = %self.gate,
            target = %self.target,
            "Building executor"
        );

        ChainExecutor::builder()
            .backend(backend)
            .steps(steps)
            .gate(&self.gate)
            .target(&self.target)
            .build()
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }

    fn build_step(
        &self,
        step: &StepConfig,
        references: &ReferenceSets,
    ) -> Result<Box<dyn Step>, ConfigError> {
        match step.kind.as_str() {
            KIND_STUB => {
                let stub = StubStep::new(&step.id)
                    .with_requires(&step.requires)
                    .with_correct(step.correct)
                    .with_score(step.score)
                    .with_citing_text_required(step.require_citing_text)
                    .with_parsed(step.parsed.clone().unwrap_or_default())
                    .with_ground_truth(step.ground_truth.clone().unwrap_or_default());
                Ok(Box::new(stub))
            }
            KIND_CITATION_INTEGRITY => Ok(Box::new(
                CitationIntegrityStep::new(references.clone()).with_source(self.gate_source(step)),
            )),
            other => Err(ConfigError::UnknownStepKind {
                step_id: step.id.clone(),
                kind: other.to_string(),
            }),
        }
    }
}
