//! Citation extraction.
//!
//! Citations are the distinct source identifiers of every chunk the
//! generator was shown, most relevant first. The generated text itself is
//! not parsed for references: a model's self-reported citations cannot be
//! verified without span-level grounding checks, and over-citing the shown
//! evidence is the safer failure for a policy tool than citing too little.

use std::collections::HashSet;

use crate::document::RetrievedMatch;

/// Distinct `source_id`s of `matches`, ordered by descending score and then
/// by rank, keeping the first occurrence of each source.
pub fn extract_citations(matches: &[RetrievedMatch]) -> Vec<String> {
    let mut ordered: Vec<&RetrievedMatch> = matches.iter().collect();
    ordered.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.rank.cmp(&b.rank)));
    dedup_sources(ordered.into_iter().map(|m| m.source_id()))
}

fn dedup_sources<'a>(sources: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    sources.filter(|s| seen.insert(*s)).map(str::to_string).collect()
}
