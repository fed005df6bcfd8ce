//! Case records joined from the SCDB, Shepard's and overruling datasets.

use serde::{Deserialize, Serialize};

/// A Supreme Court case with metadata and optional opinion text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourtCase {
    /// U.S. Reports citation (e.g., "347 U.S. 483")
    pub us_cite: String,

    /// Full case name
    pub case_name: String,

    /// SCDB term year
    pub term: i32,

    /// SCDB majOpinWriter code
    #[serde(default)]
    pub maj_opin_writer: Option<i32>,

    /// SCDB caseDisposition code (1-11)
    #[serde(default)]
    pub case_disposition: Option<i32>,

    /// SCDB partyWinning (1=petitioner, 0=respondent, 2=unclear)
    #[serde(default)]
    pub party_winning: Option<i32>,

    #[serde(default)]
    pub issue_area: Option<i32>,

    /// Majority opinion text, when the corpus has it
    #[serde(default)]
    pub majority_opinion: Option<String>,

    #[serde(default)]
    pub lexis_cite: Option<String>,

    #[serde(default)]
    pub sct_cite: Option<String>,

    /// Authority score from the citation network
    #[serde(default)]
    pub importance: Option<f64>,
}

impl CourtCase {
    /// Minimal case record without metadata or text.
    pub fn new(us_cite: impl Into<String>, case_name: impl Into<String>, term: i32) -> Self {
        Self {
            us_cite: us_cite.into(),
            case_name: case_name.into(),
            term,
            maj_opin_writer: None,
            case_disposition: None,
            party_winning: None,
            issue_area: None,
            majority_opinion: None,
            lexis_cite: None,
            sct_cite: None,
            importance: None,
        }
    }

    /// Attach majority opinion text.
    pub fn with_opinion(mut self, text: impl Into<String>) -> Self {
        self.majority_opinion = Some(text.into());
        self
    }

    pub fn has_text(&self) -> bool {
        self.majority_opinion.is_some()
    }
}

/// A citation relationship between two cases (one Shepard's edge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShepardsEdge {
    /// Citation of the cited (earlier) case
    pub cited_case_us_cite: String,

    /// Citation of the citing (later) case
    pub citing_case_us_cite: String,

    pub cited_case_name: String,

    #[serde(default)]
    pub citing_case_name: Option<String>,

    /// Shepard's signal (e.g., "followed", "distinguished")
    #[serde(default)]
    pub shepards: String,

    /// True if followed/parallel
    #[serde(default)]
    pub agree: bool,

    #[serde(default)]
    pub cited_case_year: Option<i32>,

    #[serde(default)]
    pub citing_case_year: Option<i32>,
}

/// A record of a case being overruled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverruleRecord {
    pub overruled_case_us_id: String,
    pub overruled_case_name: String,
    pub overruling_case_name: String,
    pub year_overruled: i32,

    /// False for partial overrulings
    #[serde(default = "default_true")]
    pub overruled_in_full: bool,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_court_case_minimal() {
        let case = CourtCase::new("347 U.S. 483", "Brown v. Board of Education", 1954);
        assert_eq!(case.term, 1954);
        assert!(!case.has_text());
    }

    #[test]
    fn test_court_case_with_opinion() {
        let case = CourtCase::new("347 U.S. 483", "Brown", 1954).with_opinion("Opinion text");
        assert!(case.has_text());
    }

    #[test]
    fn test_edge_defaults_from_json() {
        let edge: ShepardsEdge = serde_json::from_str(
            r#"{"cited_case_us_cite": "347 U.S. 483",
                "citing_case_us_cite": "349 U.S. 294",
                "cited_case_name": "Brown"}"#,
        )
        .unwrap();
        assert_eq!(edge.shepards, "");
        assert!(!edge.agree);
        assert!(edge.citing_case_name.is_none());
    }

    #[test]
    fn test_overrule_defaults_to_full() {
        let record: OverruleRecord = serde_json::from_str(
            r#"{"overruled_case_us_id": "163 U.S. 537",
                "overruled_case_name": "Plessy v. Ferguson",
                "overruling_case_name": "Brown v. Board of Education",
                "year_overruled": 1954}"#,
        )
        .unwrap();
        assert!(record.overruled_in_full);
    }
}
