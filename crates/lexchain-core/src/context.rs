//! Per-instance execution context.

use indexmap::IndexMap;
use std::collections::BTreeSet;

use crate::schemas::{ChainInstance, ChainResult, StepResult};

/// State carried through one chain execution.
///
/// Borrows the instance and owns the step results recorded so far, in
/// execution order. A context lives for exactly one `execute()` call and is
/// consumed into the [`ChainResult`].
#[derive(Debug)]
pub struct ChainContext<'a> {
    instance: &'a ChainInstance,
    step_results: IndexMap<String, StepResult>,
}

impl<'a> ChainContext<'a> {
    pub fn new(instance: &'a ChainInstance) -> Self {
        Self {
            instance,
            step_results: IndexMap::new(),
        }
    }

    pub fn instance(&self) -> &'a ChainInstance {
        self.instance
    }

    /// Result recorded under a step id (e.g., "s4", "s5:cb").
    pub fn get(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results.get(step_id)
    }

    pub(crate) fn get_mut(&mut self, step_id: &str) -> Option<&mut StepResult> {
        self.step_results.get_mut(step_id)
    }

    /// Record a result under its step id.
    pub fn insert(&mut self, step_id: impl Into<String>, result: StepResult) {
        self.step_results.insert(step_id.into(), result);
    }

    /// Whether any variant of a logical step ran with status OK.
    pub fn has_step(&self, step_name: &str) -> bool {
        self.step_results
            .values()
            .any(|r| r.step() == step_name && r.is_ok())
    }

    /// First recorded result for a logical step name.
    pub fn get_by_step(&self, step_name: &str) -> Option<&StepResult> {
        self.step_results.values().find(|r| r.step() == step_name)
    }

    /// Step ids whose status is OK. Only these satisfy dependencies.
    pub fn ok_step_ids(&self) -> BTreeSet<&str> {
        self.step_results
            .iter()
            .filter(|(_, r)| r.is_ok())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn step_results(&self) -> &IndexMap<String, StepResult> {
        &self.step_results
    }

    pub(crate) fn into_result(self, voided: bool, void_reason: Option<String>) -> ChainResult {
        ChainResult {
            instance_id: self.instance.id.clone(),
            step_results: self.step_results,
            voided,
            void_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{CourtCase, Provenance, ShepardsEdge, StepRun};

    fn instance() -> ChainInstance {
        ChainInstance::from_edge(
            CourtCase::new("347 U.S. 483", "Brown v. Board of Education", 1954),
            None,
            ShepardsEdge {
                cited_case_us_cite: "347 U.S. 483".to_string(),
                citing_case_us_cite: "349 U.S. 294".to_string(),
                cited_case_name: "Brown v. Board of Education".to_string(),
                citing_case_name: None,
                shepards: "followed".to_string(),
                agree: true,
                cited_case_year: None,
                citing_case_year: None,
            },
            None,
        )
    }

    fn ok(step_id: &str, step: &str, variant: Option<&str>) -> StepResult {
        StepResult::completed(step_id, step, variant, StepRun::default(), Provenance::default())
    }

    #[test]
    fn test_get_and_insert() {
        let instance = instance();
        let mut ctx = ChainContext::new(&instance);
        assert!(ctx.get("s1").is_none());

        ctx.insert("s1", ok("s1", "s1", None));
        assert_eq!(ctx.get("s1").map(|r| r.step_id()), Some("s1"));
    }

    #[test]
    fn test_variant_step_ids_are_distinct() {
        let instance = instance();
        let mut ctx = ChainContext::new(&instance);
        ctx.insert("s5:cb", ok("s5:cb", "s5", Some("cb")));

        assert!(ctx.get("s5:cb").is_some());
        assert!(ctx.get("s5:rag").is_none());
        assert!(ctx.get("s5").is_none());
    }

    #[test]
    fn test_has_step_requires_ok_variant() {
        let instance = instance();
        let mut ctx = ChainContext::new(&instance);
        ctx.insert("s5:rag", StepResult::skipped_coverage("s5:rag", "s5", Some("rag")));
        assert!(!ctx.has_step("s5"));

        ctx.insert("s5:cb", ok("s5:cb", "s5", Some("cb")));
        assert!(ctx.has_step("s5"));
        assert!(!ctx.has_step("s6"));
    }

    #[test]
    fn test_get_by_step_returns_first() {
        let instance = instance();
        let mut ctx = ChainContext::new(&instance);
        ctx.insert("s5:cb", ok("s5:cb", "s5", Some("cb")));
        ctx.insert("s5:rag", ok("s5:rag", "s5", Some("rag")));

        assert_eq!(ctx.get_by_step("s5").map(|r| r.step_id()), Some("s5:cb"));
    }

    #[test]
    fn test_ok_step_ids() {
        let instance = instance();
        let mut ctx = ChainContext::new(&instance);
        ctx.insert("s1", ok("s1", "s1", None));
        ctx.insert("s2", StepResult::skipped_dependency("s2", "s2", None, &["s9".to_string()]));
        ctx.insert("s3", StepResult::skipped_coverage("s3", "s3", None));

        let ids: Vec<&str> = ctx.ok_step_ids().into_iter().collect();
        assert_eq!(ids, vec!["s1"]);
    }

    #[test]
    fn test_into_result_keeps_order() {
        let instance = instance();
        let mut ctx = ChainContext::new(&instance);
        ctx.insert("s2", ok("s2", "s2", None));
        ctx.insert("s1", ok("s1", "s1", None));

        let result = ctx.into_result(false, None);
        assert_eq!(result.instance_id, "pair::347_us_483::349_us_294");
        let order: Vec<&str> = result.step_results.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["s2", "s1"]);
    }
}
