//! Data model: case records, chain instances and results.

mod case;
mod instance;
mod result;

pub use case::{CourtCase, OverruleRecord, ShepardsEdge};
pub use instance::{ChainInstance, CoverageReport};
pub use result::{
    error_payload, has_errors, payload_errors, ChainResult, Payload, Provenance, StatusError,
    StepResult, StepRun, StepStatus, ERRORS_KEY,
};
