//! Offline evaluation harness.
//!
//! Runs a set of [`EvalCase`]s through a [`RagPipeline`] and reports latency
//! percentiles, citation hit rate, decline accuracy and, for cases that carry
//! a ground truth, groundedness and exact match. A case whose answer call
//! fails is recorded with its error and counted; it never aborts the run.

use std::time::Instant;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::document::AnswerResult;
use crate::error::{RagError, Result};
use crate::pipeline::RagPipeline;

/// Minimum normalized similarity between answer and ground truth for an
/// answer to count as grounded when the ground truth is not a substring.
pub const GROUNDED_SIMILARITY: f64 = 0.40;

/// One evaluation question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalCase {
    /// Case identifier, echoed in the report. Numeric ids are accepted.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// The question to ask.
    pub query: String,
    /// Reference answer used for groundedness and exact-match scoring.
    #[serde(default)]
    pub ground_truth: Option<String>,
    /// The source the answer should cite, if the question is in-corpus.
    #[serde(default, alias = "source_document")]
    pub expected_source: Option<String>,
    /// Free-form category (e.g. `factual`, `procedural`), echoed in the report.
    #[serde(default)]
    pub query_type: Option<String>,
    /// Whether the correct behaviour is to decline.
    #[serde(default)]
    pub expect_decline: bool,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CaseId {
        Num(u64),
        Text(String),
    }

    Ok(match CaseId::deserialize(deserializer)? {
        CaseId::Num(n) => n.to_string(),
        CaseId::Text(s) => s,
    })
}

/// Parse evaluation cases from a JSON array.
pub fn parse_eval_cases(json: &str) -> Result<Vec<EvalCase>> {
    serde_json::from_str(json)
        .map_err(|e| RagError::ConfigError(format!("invalid evaluation file: {e}")))
}

/// Outcome of a single case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalCaseResult {
    /// Case identifier.
    pub id: String,
    /// The question asked.
    pub query: String,
    /// Category copied from the case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
    /// Wall-clock time of the `answer` call.
    pub latency_ms: f64,
    /// Generated answer or decline text; `None` if the call failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Sources cited by the answer.
    pub citations: Vec<String>,
    /// The gate's decision; `None` if the call failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_corpus: Option<bool>,
    /// Expected source found among the citations; `None` if not applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_hit: Option<bool>,
    /// Answered/declined as expected; `None` if the call failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline_correct: Option<bool>,
    /// Normalized similarity of answer and ground truth, in `[0, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groundedness_similarity: Option<f64>,
    /// Ground truth contained in the answer, or similarity at least
    /// [`GROUNDED_SIMILARITY`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grounded: Option<bool>,
    /// Answer equals the ground truth, ignoring case and surrounding space.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact_match: Option<bool>,
    /// Error message if the call failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate metrics over an evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalReport {
    /// Number of cases run.
    pub total: usize,
    /// Cases whose `answer` call returned an error.
    pub failures: usize,
    /// Median latency.
    pub p50_latency_ms: Option<f64>,
    /// 95th-percentile latency.
    pub p95_latency_ms: Option<f64>,
    /// Fraction of successful cases with an expected source whose citations contain it.
    pub citation_hit_rate: Option<f64>,
    /// Fraction of successful cases answered or declined as expected.
    pub decline_accuracy: Option<f64>,
    /// Fraction of successful cases with a ground truth that were grounded.
    pub groundedness_rate: Option<f64>,
    /// Fraction of successful cases with a ground truth that matched it exactly.
    pub exact_match_rate: Option<f64>,
    /// Per-case outcomes, in input order.
    pub results: Vec<EvalCaseResult>,
}

/// Run every case through `pipeline`, sequentially, and aggregate the metrics.
pub async fn run_evaluation(pipeline: &RagPipeline, cases: &[EvalCase]) -> EvalReport {
    let mut results = Vec::with_capacity(cases.len());

    for (i, case) in cases.iter().enumerate() {
        let started = Instant::now();
        let outcome = pipeline.answer(&case.query).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let result = match outcome {
            Ok(answer) => score_answer(case, answer, latency_ms),
            Err(e) => {
                warn!(case = %case.id, error = %e, "evaluation case failed");
                EvalCaseResult {
                    id: case.id.clone(),
                    query: case.query.clone(),
                    query_type: case.query_type.clone(),
                    latency_ms,
                    answer: None,
                    citations: Vec::new(),
                    in_corpus: None,
                    citation_hit: None,
                    decline_correct: None,
                    groundedness_similarity: None,
                    grounded: None,
                    exact_match: None,
                    error: Some(e.to_string()),
                }
            }
        };
        info!(case = %case.id, n = i + 1, total = cases.len(), latency_ms, "evaluated case");
        results.push(result);
    }

    summarize(results)
}

fn score_answer(case: &EvalCase, answer: AnswerResult, latency_ms: f64) -> EvalCaseResult {
    let citation_hit =
        case.expected_source.as_ref().map(|expected| answer.citations.iter().any(|c| c == expected));
    let ground_truth = case.ground_truth.as_deref().filter(|gt| !gt.trim().is_empty());
    let grounding = ground_truth.map(|gt| score_grounding(&answer_text(&answer), gt));

    EvalCaseResult {
        id: case.id.clone(),
        query: case.query.clone(),
        query_type: case.query_type.clone(),
        latency_ms,
        decline_correct: Some(answer.in_corpus != case.expect_decline),
        in_corpus: Some(answer.in_corpus),
        citation_hit,
        groundedness_similarity: grounding.map(|g| g.similarity),
        grounded: grounding.map(|g| g.grounded),
        exact_match: grounding.map(|g| g.exact),
        citations: answer.citations,
        answer: Some(answer.answer),
        error: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Grounding {
    similarity: f64,
    grounded: bool,
    exact: bool,
}

/// The answer with inline `[source]` markers for its own citations removed.
fn answer_text(answer: &AnswerResult) -> String {
    let mut text = answer.answer.clone();
    for citation in &answer.citations {
        text = text.replace(&format!("[{citation}]"), "");
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn score_grounding(answer: &str, ground_truth: &str) -> Grounding {
    let answer = answer.trim().to_lowercase();
    let truth = ground_truth.trim().to_lowercase();
    let similarity =
        if answer.is_empty() { 0.0 } else { strsim::normalized_levenshtein(&truth, &answer) };
    Grounding {
        similarity,
        grounded: answer.contains(&truth) || similarity >= GROUNDED_SIMILARITY,
        exact: answer == truth,
    }
}

fn summarize(results: Vec<EvalCaseResult>) -> EvalReport {
    let mut latencies: Vec<f64> = results.iter().map(|r| r.latency_ms).collect();
    latencies.sort_by(f64::total_cmp);

    let hits: Vec<bool> = results.iter().filter_map(|r| r.citation_hit).collect();
    let declines: Vec<bool> = results.iter().filter_map(|r| r.decline_correct).collect();
    let grounded: Vec<bool> = results.iter().filter_map(|r| r.grounded).collect();
    let exact: Vec<bool> = results.iter().filter_map(|r| r.exact_match).collect();

    EvalReport {
        total: results.len(),
        failures: results.iter().filter(|r| r.error.is_some()).count(),
        p50_latency_ms: percentile(&latencies, 50.0),
        p95_latency_ms: percentile(&latencies, 95.0),
        citation_hit_rate: rate(&hits),
        decline_accuracy: rate(&declines),
        groundedness_rate: rate(&grounded),
        exact_match_rate: rate(&exact),
        results,
    }
}

/// Nearest-rank percentile of an ascending slice.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    let index = rank.clamp(1, sorted.len()) - 1;
    Some(sorted[index])
}

fn rate(flags: &[bool]) -> Option<f64> {
    if flags.is_empty() {
        return None;
    }
    Some(flags.iter().filter(|f| **f).count() as f64 / flags.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(
        latency_ms: f64,
        citation_hit: Option<bool>,
        decline_correct: Option<bool>,
    ) -> EvalCaseResult {
        EvalCaseResult {
            id: "c".to_string(),
            query: "q".to_string(),
            query_type: None,
            latency_ms,
            answer: None,
            citations: Vec::new(),
            in_corpus: None,
            citation_hit,
            decline_correct,
            groundedness_similarity: None,
            grounded: decline_correct,
            exact_match: decline_correct.map(|_| false),
            error: decline_correct.is_none().then(|| "boom".to_string()),
        }
    }

    #[test]
    fn nearest_rank_percentiles() {
        let sorted: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(percentile(&sorted, 50.0), Some(10.0));
        assert_eq!(percentile(&sorted, 95.0), Some(19.0));
        assert_eq!(percentile(&[7.0], 95.0), Some(7.0));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn failures_are_counted_and_excluded_from_rates() {
        let report = summarize(vec![
            result(10.0, Some(true), Some(true)),
            result(20.0, Some(false), Some(true)),
            result(30.0, None, Some(false)),
            result(40.0, None, None),
        ]);
        assert_eq!(report.total, 4);
        assert_eq!(report.failures, 1);
        assert_eq!(report.citation_hit_rate, Some(0.5));
        assert_eq!(report.decline_accuracy, Some(2.0 / 3.0));
        assert_eq!(report.p50_latency_ms, Some(20.0));
        assert_eq!(report.p95_latency_ms, Some(40.0));
        assert_eq!(report.groundedness_rate, Some(2.0 / 3.0));
        assert_eq!(report.exact_match_rate, Some(0.0));
    }

    #[test]
    fn numeric_ids_and_scoring_fields_parse() {
        let cases = parse_eval_cases(
            r#"[{"id": 1, "query": "Core hours?", "ground_truth": "10:00 AM to 3:00 PM",
                 "source_document": "remote_work_policy.md", "query_type": "factual"}]"#,
        )
        .unwrap();
        assert_eq!(cases[0].id, "1");
        assert_eq!(cases[0].ground_truth.as_deref(), Some("10:00 AM to 3:00 PM"));
        assert_eq!(cases[0].query_type.as_deref(), Some("factual"));
    }

    #[test]
    fn negative_or_fractional_ids_are_rejected() {
        assert!(parse_eval_cases(r#"[{"id": -1, "query": "q"}]"#).is_err());
        assert!(parse_eval_cases(r#"[{"id": 1.5, "query": "q"}]"#).is_err());
    }

    #[test]
    fn ground_truth_substring_counts_as_grounded() {
        let g = score_grounding(
            "Core working hours are 10:00 AM to 3:00 PM in local time.",
            "10:00 am to 3:00 pm",
        );
        assert!(g.grounded);
        assert!(!g.exact);
        assert!(g.similarity < GROUNDED_SIMILARITY);
    }

    #[test]
    fn similar_wording_counts_as_grounded() {
        let g = score_grounding("Core hours are 10 AM to 3 PM.", "Core hours are 10 AM - 3 PM");
        assert!(g.similarity >= GROUNDED_SIMILARITY);
        assert!(g.grounded);
    }

    #[test]
    fn unrelated_answer_is_not_grounded() {
        let g = score_grounding("Alcohol is not reimbursable.", "Employees accrue 1.5 days of PTO");
        assert!(!g.grounded);
        assert!(!g.exact);
    }

    #[test]
    fn exact_match_ignores_case_and_padding() {
        let g = score_grounding("  Ten days. ", "ten days.");
        assert!(g.exact);
        assert_eq!(g.similarity, 1.0);
    }

    #[test]
    fn inline_citation_markers_are_stripped_before_scoring() {
        let answer = AnswerResult::answered(
            "q",
            "Core hours are 10 to 3. [remote_work_policy.md]",
            vec!["remote_work_policy.md".to_string()],
        );
        assert_eq!(answer_text(&answer), "Core hours are 10 to 3.");

        let case = EvalCase {
            id: "7".to_string(),
            query: "q".to_string(),
            ground_truth: Some("Core hours are 10 to 3.".to_string()),
            expected_source: Some("remote_work_policy.md".to_string()),
            query_type: Some("factual".to_string()),
            expect_decline: false,
        };
        let result = score_answer(&case, answer, 5.0);
        assert_eq!(result.exact_match, Some(true));
        assert_eq!(result.grounded, Some(true));
        assert_eq!(result.citation_hit, Some(true));
        assert_eq!(result.query_type.as_deref(), Some("factual"));
    }

    #[test]
    fn cases_without_ground_truth_are_not_scored_for_grounding() {
        let case = EvalCase {
            id: "d".to_string(),
            query: "Capital of France?".to_string(),
            ground_truth: None,
            expected_source: None,
            query_type: None,
            expect_decline: true,
        };
        let result = score_answer(&case, AnswerResult::declined("q", "no"), 1.0);
        assert_eq!(result.grounded, None);
        assert_eq!(result.exact_match, None);
        assert_eq!(result.decline_correct, Some(true));
    }

    #[test]
    fn parses_cases_with_source_document_alias() {
        let cases = parse_eval_cases(
            r#"[
                {"id": "q1", "query": "Core hours?", "source_document": "remote_work_policy.md"},
                {"id": "q2", "query": "Capital of France?", "expect_decline": true}
            ]"#,
        )
        .unwrap();
        assert_eq!(cases[0].expected_source.as_deref(), Some("remote_work_policy.md"));
        assert!(!cases[0].expect_decline);
        assert!(cases[1].expect_decline);
        assert!(cases[1].expected_source.is_none());
    }

    #[test]
    fn malformed_case_file_is_a_config_error() {
        assert!(matches!(parse_eval_cases("{}"), Err(RagError::ConfigError(_))));
    }
}
