//! Citation extraction and verification.
//!
//! Citations are pulled out of free text with a U.S. Reports pattern and
//! classified against two canonicalized reference sets: known fabricated
//! citations and citations known to exist.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::canonical::canonicalize_cite;

lazy_static! {
    /// U.S. Reports citation: volume, reporter, page.
    /// Matches "347 U.S. 483", "347 U. S. 483", "347 US 483".
    /// Also matches "347 U S 483", whose canonical form (`347_u_s_483`)
    /// never equals a `U.S.` citation, so it verifies as not existing.
    pub static ref US_CITE_PATTERN: Regex = Regex::new(
        r"(?i)\d{1,3}\s+U\.?\s*S\.?\s+\d{1,4}"
    ).unwrap();

    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Classification of a single citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationCheck {
    /// The citation as it appeared in the text
    pub cite: String,

    /// Canonical form used for set membership
    pub canonical: String,

    /// In the known set and not in the fabricated set
    pub exists: bool,

    /// In the fabricated set
    pub is_fake: bool,

    /// In the known set
    pub in_scope: bool,
}

/// Extract U.S. Reports citations from text.
///
/// Internal whitespace of each match is collapsed to single spaces. The
/// result is de-duplicated by canonical form; the first occurrence wins.
pub fn extract_citations(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut citations = Vec::new();

    for m in US_CITE_PATTERN.find_iter(text) {
        let cleaned = WHITESPACE_RUN.replace_all(m.as_str().trim(), " ").into_owned();
        if seen.insert(canonicalize_cite(&cleaned)) {
            citations.push(cleaned);
        }
    }

    citations
}

/// Verify one citation against canonicalized fabricated and known sets.
///
/// Fabricated membership dominates: a citation in both sets does not exist.
pub fn verify_citation(cite: &str, fake: &HashSet<String>, known: &HashSet<String>) -> CitationCheck {
    let canonical = canonicalize_cite(cite);
    let is_fake = fake.contains(&canonical);
    let in_scope = known.contains(&canonical);

    CitationCheck {
        cite: cite.to_string(),
        canonical,
        exists: in_scope && !is_fake,
        is_fake,
        in_scope,
    }
}

/// Verify every citation. `all_valid` is true when every citation exists,
/// and vacuously true for an empty list.
pub fn verify_all_citations<S: AsRef<str>>(
    citations: &[S],
    fake: &HashSet<String>,
    known: &HashSet<String>,
) -> (Vec<CitationCheck>, bool) {
    let checks: Vec<CitationCheck> = citations
        .iter()
        .map(|c| verify_citation(c.as_ref(), fake, known))
        .collect();
    let all_valid = checks.iter().all(|c| c.exists);

    (checks, all_valid)
}

/// The two canonicalized reference sets the integrity gate checks against.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSets {
    fake: HashSet<String>,
    known: HashSet<String>,
}

impl ReferenceSets {
    /// Build from raw (non-canonical) citation strings.
    pub fn from_raw<F, K>(fake: F, known: K) -> Self
    where
        F: IntoIterator,
        F::Item: AsRef<str>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        Self {
            fake: fake.into_iter().map(|c| canonicalize_cite(c.as_ref())).collect(),
            known: known.into_iter().map(|c| canonicalize_cite(c.as_ref())).collect(),
        }
    }

    /// Canonical fabricated citations.
    pub fn fake(&self) -> &HashSet<String> {
        &self.fake
    }

    /// Canonical known citations.
    pub fn known(&self) -> &HashSet<String> {
        &self.known
    }

    pub fn is_empty(&self) -> bool {
        self.fake.is_empty() && self.known.is_empty()
    }

    pub fn verify(&self, cite: &str) -> CitationCheck {
        verify_citation(cite, &self.fake, &self.known)
    }

    pub fn verify_all<S: AsRef<str>>(&self, citations: &[S]) -> (Vec<CitationCheck>, bool) {
        verify_all_citations(citations, &self.fake, &self.known)
    }

    /// Extract citations from `text` and verify them.
    pub fn verify_text(&self, text: &str) -> (Vec<CitationCheck>, bool) {
        self.verify_all(extract_citations(text).as_slice())
    }
}
