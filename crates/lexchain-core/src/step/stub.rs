//! Configurable stub step.

use std::collections::BTreeSet;

use super::Step;
use crate::context::ChainContext;
use crate::schemas::{has_errors, Payload};

/// A step with fully scripted behavior, for exercising the executor and for
/// dry runs of chain configurations.
///
/// ```
/// use lexchain_core::step::{Step, StubStep};
///
/// // Depends on s1 and s4, always scores incorrect
/// let s5 = StubStep::new("s5")
///     .with_variant("cb")
///     .with_requires(["s1", "s4"])
///     .with_correct(false);
/// assert_eq!(s5.step_id(), "s5:cb");
/// ```
#[derive(Debug, Clone)]
pub struct StubStep {
    step_id: String,
    requires: BTreeSet<String>,
    always_correct: bool,
    score_value: f64,
    require_citing_text: bool,
    parsed_response: Payload,
    ground_truth_data: Payload,
}

impl StubStep {
    /// Stub with no dependencies that always scores `(1.0, true)`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            step_id: name.into(),
            requires: BTreeSet::new(),
            always_correct: true,
            score_value: 1.0,
            require_citing_text: false,
            parsed_response: Payload::new(),
            ground_truth_data: Payload::new(),
        }
    }

    /// Append a variant tag to the step id (`name:variant`).
    pub fn with_variant(mut self, variant: impl AsRef<str>) -> Self {
        let name = self.step_name().to_string();
        self.step_id = format!("{}:{}", name, variant.as_ref());
        self
    }

    pub fn with_requires<I, S>(mut self, requires: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = requires.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_correct(mut self, correct: bool) -> Self {
        self.always_correct = correct;
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score_value = score;
        self
    }

    /// Only run when the instance has citing-case text (Tier B).
    pub fn with_citing_text_required(mut self, required: bool) -> Self {
        self.require_citing_text = required;
        self
    }

    /// Payload returned by `parse`, regardless of the response.
    pub fn with_parsed(mut self, parsed: Payload) -> Self {
        self.parsed_response = parsed;
        self
    }

    pub fn with_ground_truth(mut self, ground_truth: Payload) -> Self {
        self.ground_truth_data = ground_truth;
        self
    }
}

impl Step for StubStep {
    fn step_id(&self) -> &str {
        &self.step_id
    }

    fn requires(&self) -> BTreeSet<String> {
        self.requires.clone()
    }

    fn check_coverage(&self, ctx: &ChainContext<'_>) -> bool {
        !self.require_citing_text || ctx.instance().has_citing_text()
    }

    fn prompt(&self, _ctx: &ChainContext<'_>) -> String {
        format!("[STUB PROMPT for {}]", self.step_id)
    }

    fn parse(&self, _raw_response: &str) -> Payload {
        self.parsed_response.clone()
    }

    fn ground_truth(&self, _ctx: &ChainContext<'_>) -> Payload {
        self.ground_truth_data.clone()
    }

    fn score(&self, parsed: &Payload, _ground_truth: &Payload) -> (f64, bool) {
        if has_errors(parsed) {
            return (0.0, false);
        }
        (self.score_value, self.always_correct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::error_payload;

    #[test]
    fn test_defaults() {
        let step = StubStep::new("s1");
        assert!(step.requires().is_empty());
        assert_eq!(step.score(&Payload::new(), &Payload::new()), (1.0, true));
    }

    #[test]
    fn test_configured_score() {
        let step = StubStep::new("s2").with_score(0.25).with_correct(false);
        assert_eq!(step.score(&Payload::new(), &Payload::new()), (0.25, false));
    }

    #[test]
    fn test_errors_payload_scores_zero() {
        let step = StubStep::new("s2").with_parsed(error_payload(["unparseable"]));
        let parsed = step.parse("garbage");
        assert_eq!(step.score(&parsed, &Payload::new()), (0.0, false));
    }

    #[test]
    fn test_requires() {
        let step = StubStep::new("s6").with_requires(["s5:cb", "s4"]);
        let requires: Vec<String> = step.requires().into_iter().collect();
        assert_eq!(requires, vec!["s4", "s5:cb"]);
    }

    #[test]
    fn test_with_variant_replaces_existing_variant() {
        let step = StubStep::new("s5").with_variant("cb").with_variant("rag");
        assert_eq!(step.step_id(), "s5:rag");
    }
}
