//! The step contract.
//!
//! Each link of the chain (S1-S7) implements [`Step`]. The executor calls,
//! in order: `check_coverage`, `requires`, `prompt`, the backend, `parse`,
//! `ground_truth`, `score`.
//!
//! ## Contract
//!
//! - The executor owns status. A step never decides whether it was skipped.
//! - `parse` is total: malformed responses become `{"errors": [...]}`.
//! - `score` is total and pure, and returns `(0.0, false)` for any payload
//!   carrying `errors`.

mod citation_integrity;
mod stub;

pub use citation_integrity::CitationIntegrityStep;
pub use stub::StubStep;

use std::collections::BTreeSet;

use crate::context::ChainContext;
use crate::schemas::{Payload, Provenance, StepResult, StepRun};

/// One unit of work in the chain.
pub trait Step: Send + Sync {
    /// Unique step id. Variants are encoded as `name:variant` (e.g., "s5:cb").
    fn step_id(&self) -> &str;

    /// Logical step name shared across variants (e.g., "s5").
    fn step_name(&self) -> &str {
        let id = self.step_id();
        id.split_once(':').map_or(id, |(name, _)| name)
    }

    /// Variant tag, if the step id carries one.
    fn variant(&self) -> Option<&str> {
        self.step_id().split_once(':').map(|(_, variant)| variant)
    }

    /// Step ids that must have status OK before this step may run.
    fn requires(&self) -> BTreeSet<String>;

    /// Data-availability precondition. Defaults to always satisfied.
    fn check_coverage(&self, _ctx: &ChainContext<'_>) -> bool {
        true
    }

    /// Build the prompt from the instance and prior results.
    fn prompt(&self, ctx: &ChainContext<'_>) -> String;

    /// Parse a raw response into a payload.
    fn parse(&self, raw_response: &str) -> Payload;

    /// Expected values for scoring.
    fn ground_truth(&self, ctx: &ChainContext<'_>) -> Payload;

    /// Score a parsed payload: `(score in [0, 1], correct)`.
    fn score(&self, parsed: &Payload, ground_truth: &Payload) -> (f64, bool);

    /// Assemble an OK result for this step. The executor may still record a
    /// skip status instead; a step never sees its result exposed otherwise.
    fn create_result(&self, run: StepRun, provenance: Provenance) -> StepResult {
        StepResult::completed(
            self.step_id(),
            self.step_name(),
            self.variant(),
            run,
            provenance,
        )
    }
}
