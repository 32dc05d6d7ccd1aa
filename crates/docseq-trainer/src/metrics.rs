//! # Text similarity metrics
//!
//! Scores predicted sequences against ground truth: normalized edit
//! distance, sentence BLEU-4, and set precision / recall / F-measure over
//! whitespace tokens.

use std::collections::{BTreeMap, HashMap, HashSet};

use rayon::prelude::*;
use serde::Serialize;

/// Pairs where either side is shorter than this (in chars) are skipped.
pub const DEFAULT_MIN_LENGTH: usize = 4;

const BLEU_MAX_ORDER: usize = 4;

/// Metrics for one prediction / ground-truth pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairMetrics {
    /// Normalized character edit distance; 0 is a perfect match.
    pub edit_dist: f64,
    /// Sentence BLEU-4 over whitespace tokens.
    pub bleu: f64,
    /// Token-set precision; `None` when the prediction has no tokens.
    pub precision: Option<f64>,
    /// Token-set recall; `None` when the reference has no tokens.
    pub recall: Option<f64>,
    /// F-measure with alpha 0.5; `None` when either set score is.
    pub f_measure: Option<f64>,
}

impl PairMetrics {
    fn entries(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("edit_dist", Some(self.edit_dist)),
            ("bleu", Some(self.bleu)),
            ("precision", self.precision),
            ("recall", self.recall),
            ("f_measure", self.f_measure),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }
}

/// Score one pair. `None` when either side is too short to score.
pub fn compute_metrics(pred: &str, gt: &str, min_len: usize) -> Option<PairMetrics> {
    if pred.chars().count() < min_len || gt.chars().count() < min_len {
        return None;
    }

    let reference: Vec<&str> = gt.split_whitespace().collect();
    let hypothesis: Vec<&str> = pred.split_whitespace().collect();
    let reference_set: HashSet<&str> = reference.iter().copied().collect();
    let hypothesis_set: HashSet<&str> = hypothesis.iter().copied().collect();

    Some(PairMetrics {
        edit_dist: normalized_edit_distance(pred, gt),
        bleu: sentence_bleu(&reference, &hypothesis),
        precision: precision(&reference_set, &hypothesis_set),
        recall: recall(&reference_set, &hypothesis_set),
        f_measure: f_measure(&reference_set, &hypothesis_set, 0.5),
    })
}

/// Character Levenshtein distance divided by the longer length.
pub fn normalized_edit_distance(pred: &str, gt: &str) -> f64 {
    let longest = pred.chars().count().max(gt.chars().count());
    if longest == 0 {
        return 0.0;
    }
    strsim::levenshtein(pred, gt) as f64 / longest as f64
}

/// Sentence BLEU with uniform weights up to 4-grams and a brevity penalty.
///
/// No smoothing: zero-count orders contribute `f64::MIN_POSITIVE`, and a
/// hypothesis without any unigram match scores exactly 0.
pub fn sentence_bleu(reference: &[&str], hypothesis: &[&str]) -> f64 {
    let mut log_sum = 0.0;
    for order in 1..=BLEU_MAX_ORDER {
        let (matches, total) = modified_precision(reference, hypothesis, order);
        if order == 1 && matches == 0 {
            return 0.0;
        }
        let p = if matches == 0 {
            f64::MIN_POSITIVE
        } else {
            matches as f64 / total as f64
        };
        log_sum += p.ln() / BLEU_MAX_ORDER as f64;
    }
    brevity_penalty(reference.len(), hypothesis.len()) * log_sum.exp()
}

fn modified_precision(reference: &[&str], hypothesis: &[&str], order: usize) -> (usize, usize) {
    let hyp_counts = ngram_counts(hypothesis, order);
    let ref_counts = ngram_counts(reference, order);
    let matches = hyp_counts
        .iter()
        .map(|(gram, &count)| count.min(ref_counts.get(gram).copied().unwrap_or(0)))
        .sum();
    let total = hyp_counts.values().sum::<usize>().max(1);
    (matches, total)
}

fn ngram_counts<'a>(tokens: &'a [&'a str], order: usize) -> HashMap<&'a [&'a str], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= order {
        for gram in tokens.windows(order) {
            *counts.entry(gram).or_insert(0) += 1;
        }
    }
    counts
}

fn brevity_penalty(ref_len: usize, hyp_len: usize) -> f64 {
    if hyp_len > ref_len {
        1.0
    } else if hyp_len == 0 {
        0.0
    } else {
        (1.0 - ref_len as f64 / hyp_len as f64).exp()
    }
}

/// Share of predicted tokens that appear in the reference.
pub fn precision(reference: &HashSet<&str>, test: &HashSet<&str>) -> Option<f64> {
    if test.is_empty() {
        return None;
    }
    Some(reference.intersection(test).count() as f64 / test.len() as f64)
}

/// Share of reference tokens that were predicted.
pub fn recall(reference: &HashSet<&str>, test: &HashSet<&str>) -> Option<f64> {
    if reference.is_empty() {
        return None;
    }
    Some(reference.intersection(test).count() as f64 / reference.len() as f64)
}

/// Weighted harmonic mean of precision and recall.
pub fn f_measure(reference: &HashSet<&str>, test: &HashSet<&str>, alpha: f64) -> Option<f64> {
    let p = precision(reference, test)?;
    let r = recall(reference, test)?;
    if p == 0.0 || r == 0.0 {
        return Some(0.0);
    }
    Some(1.0 / (alpha / p + (1.0 - alpha) / r))
}

/// Per-metric values collected over a corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsReport {
    /// Scores per metric name, in pair order.
    pub values: BTreeMap<String, Vec<f64>>,
    /// Pairs skipped for being too short.
    pub skipped: usize,
}

impl MetricsReport {
    fn push(&mut self, metrics: Option<PairMetrics>) {
        match metrics {
            Some(m) => {
                for (name, value) in m.entries() {
                    self.values.entry(name.to_string()).or_default().push(value);
                }
            }
            None => self.skipped += 1,
        }
    }

    /// Values collected for one metric.
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// Mean of every metric.
    pub fn means(&self) -> BTreeMap<String, f64> {
        self.values
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.clone(), v.iter().sum::<f64>() / v.len() as f64))
            .collect()
    }
}

/// Score aligned ground-truth and prediction lists.
///
/// With `parallel` the pairs are scored on the rayon pool; the report is
/// identical either way.
pub fn get_metrics(gt: &[String], pred: &[String], parallel: bool) -> MetricsReport {
    let scored: Vec<Option<PairMetrics>> = if parallel {
        pred.par_iter()
            .zip(gt.par_iter())
            .map(|(p, g)| compute_metrics(p, g, DEFAULT_MIN_LENGTH))
            .collect()
    } else {
        pred.iter()
            .zip(gt)
            .map(|(p, g)| compute_metrics(p, g, DEFAULT_MIN_LENGTH))
            .collect()
    };

    let mut report = MetricsReport::default();
    for metrics in scored {
        report.push(metrics);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set<'a>(words: &[&'a str]) -> HashSet<&'a str> {
        words.iter().copied().collect()
    }

    #[test]
    fn short_pairs_are_skipped() {
        assert!(compute_metrics("abc", "abcdef", DEFAULT_MIN_LENGTH).is_none());
        assert!(compute_metrics("abcd", "abcd", DEFAULT_MIN_LENGTH).is_some());
    }

    #[test]
    fn identical_pair_scores_perfectly() {
        let m = compute_metrics("a b c d e", "a b c d e", DEFAULT_MIN_LENGTH).unwrap();
        assert_eq!(m.edit_dist, 0.0);
        assert!((m.bleu - 1.0).abs() < 1e-12);
        assert_eq!(m.precision, Some(1.0));
        assert_eq!(m.recall, Some(1.0));
        assert_eq!(m.f_measure, Some(1.0));
    }

    #[test]
    fn edit_distance_is_normalized_by_longer_side() {
        assert!((normalized_edit_distance("kitten", "sitting") - 3.0 / 7.0).abs() < 1e-12);
        assert_eq!(normalized_edit_distance("", ""), 0.0);
    }

    #[test]
    fn bleu_without_unigram_overlap_is_zero() {
        assert_eq!(sentence_bleu(&["a", "b", "c", "d"], &["w", "x", "y", "z"]), 0.0);
    }

    #[test]
    fn bleu_applies_brevity_penalty() {
        let reference = ["the", "cat", "sat", "on", "the", "mat", "today", "again"];
        let hypothesis = ["the", "cat", "sat", "on", "the", "mat"];
        let score = sentence_bleu(&reference, &hypothesis);
        let expected = (1.0f64 - 8.0 / 6.0).exp();
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn bleu_missing_high_orders_is_tiny_but_positive() {
        let score = sentence_bleu(&["a", "b", "c"], &["a", "x", "c"]);
        assert!(score > 0.0);
        assert!(score < 1e-50);
    }

    #[test]
    fn set_scores() {
        let reference = set(&["a", "b", "c", "d"]);
        let test = set(&["a", "b", "x"]);
        assert!((precision(&reference, &test).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(recall(&reference, &test), Some(0.5));
        let f = f_measure(&reference, &test, 0.5).unwrap();
        assert!((f - 1.0 / (0.5 / (2.0 / 3.0) + 0.5 / 0.5)).abs() < 1e-12);

        assert_eq!(precision(&reference, &HashSet::new()), None);
        assert_eq!(f_measure(&reference, &set(&["z"]), 0.5), Some(0.0));
    }

    #[test]
    fn report_collects_and_averages() {
        let gt = vec!["a b c d".to_string(), "tiny".to_string(), "x".to_string()];
        let pred = vec!["a b c d".to_string(), "tint".to_string(), "x".to_string()];

        let report = get_metrics(&gt, &pred, false);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.get("edit_dist").unwrap(), &[0.0, 0.25]);

        let means = report.means();
        assert!((means["edit_dist"] - 0.125).abs() < 1e-12);
        assert_eq!(means["recall"], 0.5);
    }

    #[test]
    fn parallel_matches_sequential() {
        let gt: Vec<String> = (0..50).map(|i| format!("row {i} cell {}", i * 3)).collect();
        let pred: Vec<String> = (0..50).map(|i| format!("row {i} cell {}", i * 2)).collect();
        assert_eq!(get_metrics(&gt, &pred, true), get_metrics(&gt, &pred, false));
    }
}
