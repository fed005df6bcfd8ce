//! Canonical citation keys.
//!
//! Every comparison between two U.S. Reports citations in lexchain goes
//! through [`canonicalize_cite`]: instance ids, dataset join keys and the
//! citation integrity gate all use it. Two citations are the same citation
//! if and only if their canonical forms are equal.
//!
//! ## ID Schemes
//!
//! - Case: `scotus::<canonical cite>::<term>`
//! - Case pair: `pair::<canonical cited cite>::<canonical citing cite>`

/// Spaced reporter abbreviations and their compact forms.
const REPORTER_VARIANTS: &[(&str, &str)] = &[("U. S.", "U.S."), ("u. s.", "u.s.")];

/// Canonicalize a U.S. Reports citation.
///
/// Spaced reporter variants are compacted first, then spaces become `_`,
/// periods are dropped and the result is lowercased.
///
/// Only `U. S.` is compacted. A reporter written without periods but with a
/// space (`347 U S 483`) keeps its inner separator and canonicalizes to
/// `347_u_s_483`, so it never matches `347 U.S. 483`. Distinct citations are
/// not checked for colliding canonical forms either.
///
/// ```
/// use lexchain_core::canonical::canonicalize_cite;
///
/// assert_eq!(canonicalize_cite("347 U.S. 483"), "347_us_483");
/// assert_eq!(canonicalize_cite("410 U. S. 113"), "410_us_113");
/// ```
pub fn canonicalize_cite(cite: &str) -> String {
    let mut normalized = cite.to_string();
    for (spaced, compact) in REPORTER_VARIANTS {
        normalized = normalized.replace(spaced, compact);
    }

    normalized.replace(' ', "_").replace('.', "").to_lowercase()
}

/// Canonical case id for a citation and SCDB term year.
pub fn case_id(us_cite: &str, term: i32) -> String {
    format!("scotus::{}::{}", canonicalize_cite(us_cite), term)
}

/// Canonical id for a directed (cited, citing) case pair.
pub fn pair_id(cited_us_cite: &str, citing_us_cite: &str) -> String {
    format!(
        "pair::{}::{}",
        canonicalize_cite(cited_us_cite),
        canonicalize_cite(citing_us_cite)
    )
}
