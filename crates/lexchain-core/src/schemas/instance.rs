//! Chain instances and coverage tiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::case::{CourtCase, OverruleRecord, ShepardsEdge};
use crate::canonical::pair_id;

/// One instance of the chain: a single Shepard's edge from the cited case
/// to the citing case, with whatever case records the datasets resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainInstance {
    /// Canonical pair id (e.g., "pair::347_us_483::349_us_294")
    pub id: String,

    /// The earlier case being cited
    pub cited_case: CourtCase,

    pub edge: ShepardsEdge,

    /// The later case doing the citing, if resolved
    #[serde(default)]
    pub citing_case: Option<CourtCase>,

    /// Overruling record for the cited case, if any
    #[serde(default)]
    pub overrule: Option<OverruleRecord>,
}

impl ChainInstance {
    /// Build an instance whose id is derived from the edge's citations.
    pub fn from_edge(
        cited_case: CourtCase,
        citing_case: Option<CourtCase>,
        edge: ShepardsEdge,
        overrule: Option<OverruleRecord>,
    ) -> Self {
        Self {
            id: pair_id(&cited_case.us_cite, &edge.citing_case_us_cite),
            cited_case,
            edge,
            citing_case,
            overrule,
        }
    }

    /// Tier A: the cited case carries opinion text.
    pub fn has_cited_text(&self) -> bool {
        self.cited_case.has_text()
    }

    /// Tier B: the citing case is resolved and carries opinion text.
    pub fn has_citing_text(&self) -> bool {
        self.citing_case.as_ref().is_some_and(CourtCase::has_text)
    }
}

/// Coverage tier counts over a set of instances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub total: usize,

    /// Instances with cited text (Tier A)
    pub chain_core: usize,

    /// Instances with both texts (Tier A + B)
    pub chain_rag_subset: usize,

    pub with_citing_case: usize,
    pub with_overrule: usize,
}

impl CoverageReport {
    pub fn from_instances<'a, I>(instances: I) -> Self
    where
        I: IntoIterator<Item = &'a ChainInstance>,
    {
        let mut report = Self::default();
        for instance in instances {
            report.total += 1;
            if instance.has_cited_text() {
                report.chain_core += 1;
                if instance.has_citing_text() {
                    report.chain_rag_subset += 1;
                }
            }
            if instance.citing_case.is_some() {
                report.with_citing_case += 1;
            }
            if instance.overrule.is_some() {
                report.with_overrule += 1;
            }
        }
        report
    }

    fn percent(&self, n: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * n as f64 / self.total as f64
        }
    }
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total instances:       {}", self.total)?;
        writeln!(
            f,
            "citing_case resolved:  {} ({:.1}%)",
            self.with_citing_case,
            self.percent(self.with_citing_case)
        )?;
        writeln!(f, "overruled cited cases: {}", self.with_overrule)?;
        writeln!(
            f,
            "CHAIN_CORE:            {} ({:.1}%)",
            self.chain_core,
            self.percent(self.chain_core)
        )?;
        write!(
            f,
            "CHAIN_RAG_SUBSET:      {} ({:.1}%)",
            self.chain_rag_subset,
            self.percent(self.chain_rag_subset)
        )
    }
}
