//! # lexchain-core
//!
//! Execution engine for chained legal-reasoning evaluations.
//!
//! A chain is an ordered list of steps (S1..S7) run over one instance, a
//! cited/citing pair of Supreme Court cases. Each step builds a prompt, the
//! backend answers, and the step parses and scores the answer against
//! ground truth.
//!
//! ## Key Guarantees
//!
//! 1. **Executor owns status**: a step result is `OK`, `SKIPPED_COVERAGE`
//!    or `SKIPPED_DEPENDENCY`, and only the executor decides which
//! 2. **Only OK satisfies a dependency**: correctness does not matter
//! 3. **Gate voiding is an annotation**: a failed S7 marks S6 voided
//!    without changing its status or score
//! 4. **Total parsing**: malformed responses become `{"errors": [...]}`
//!    payloads, never panics
//!
//! ## Example
//!
//! ```rust,ignore
//! use lexchain_core::{ChainConfig, report};
//!
//! let config = ChainConfig::from_yaml_file("chain.yaml")?;
//! let executor = config.build_executor(config.build_backend(), None)?;
//! let instances = report::read_instances("instances.jsonl")?;
//!
//! let results = executor.execute_all(&instances);
//! println!("{}", report::summarize_results(&results));
//! ```

pub mod backend;
pub mod canonical;
pub mod citation;
pub mod config;
pub mod context;
pub mod executor;
pub mod report;
pub mod schemas;
pub mod step;

// Re-export main types at crate root
pub use backend::{Backend, MockBackend};
pub use canonical::{canonicalize_cite, case_id, pair_id};
pub use citation::{
    extract_citations, verify_all_citations, verify_citation, CitationCheck, ReferenceSets,
};
pub use config::{ChainConfig, ConfigError};
pub use context::ChainContext;
pub use executor::{ChainExecutor, ChainExecutorBuilder, ExecutorError, VOID_REASON};
pub use report::{summarize_results, ChainSummary, ReportError, StepStats};
pub use schemas::{
    ChainInstance, ChainResult, CourtCase, CoverageReport, OverruleRecord, Payload, Provenance,
    ShepardsEdge, StatusError, StepResult, StepRun, StepStatus,
};
pub use step::{CitationIntegrityStep, Step, StubStep};
