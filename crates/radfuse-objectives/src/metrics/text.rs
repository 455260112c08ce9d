//! Text-generation quality accumulators: corpus BLEU-n, ROUGE-L, and the
//! report caption aggregate.
//!
//! Inputs are expected lower-cased; tokenization is whitespace splitting,
//! matching how the ground-truth reports are prepared upstream.

use std::collections::HashMap;

fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

fn ngram_counts<'a>(tokens: &[&'a str], n: usize) -> HashMap<Vec<&'a str>, u64> {
    let mut counts = HashMap::new();
    if tokens.len() < n {
        return counts;
    }
    for window in tokens.windows(n) {
        *counts.entry(window.to_vec()).or_insert(0) += 1;
    }
    counts
}

/// Corpus-level BLEU with n-gram order `1..=max_n`.
///
/// Clipped n-gram precision, geometric mean over orders, brevity penalty.
#[derive(Debug, Clone)]
pub struct BleuMetric {
    max_n: usize,
    matches: Vec<u64>,
    totals: Vec<u64>,
    candidate_len: u64,
    reference_len: u64,
}

impl BleuMetric {
    /// `max_n` must be at least 1.
    pub fn new(max_n: usize) -> Self {
        Self {
            max_n,
            matches: vec![0; max_n],
            totals: vec![0; max_n],
            candidate_len: 0,
            reference_len: 0,
        }
    }

    /// Accumulate candidate/reference pairs (one reference per candidate).
    pub fn update(&mut self, candidates: &[String], references: &[String]) {
        for (candidate, reference) in candidates.iter().zip(references.iter()) {
            let cand = tokenize(candidate);
            let refr = tokenize(reference);

            self.candidate_len += cand.len() as u64;
            self.reference_len += refr.len() as u64;

            for n in 1..=self.max_n {
                let cand_counts = ngram_counts(&cand, n);
                let ref_counts = ngram_counts(&refr, n);

                let mut matched = 0u64;
                let mut total = 0u64;
                for (gram, &count) in &cand_counts {
                    total += count;
                    let clip = ref_counts.get(gram).copied().unwrap_or(0);
                    matched += count.min(clip);
                }
                self.matches[n - 1] += matched;
                self.totals[n - 1] += total;
            }
        }
    }

    /// Corpus BLEU since the last reset.
    pub fn compute(&self) -> f32 {
        if self.candidate_len == 0 {
            return 0.0;
        }

        let mut log_precision_sum = 0.0f64;
        for n in 0..self.max_n {
            if self.totals[n] == 0 || self.matches[n] == 0 {
                return 0.0;
            }
            log_precision_sum += (self.matches[n] as f64 / self.totals[n] as f64).ln();
        }
        let geo_mean = (log_precision_sum / self.max_n as f64).exp();

        let brevity = if self.candidate_len >= self.reference_len {
            1.0
        } else {
            (1.0 - self.reference_len as f64 / self.candidate_len as f64).exp()
        };

        (geo_mean * brevity) as f32
    }

    pub fn reset(&mut self) {
        self.matches = vec![0; self.max_n];
        self.totals = vec![0; self.max_n];
        self.candidate_len = 0;
        self.reference_len = 0;
    }
}

/// ROUGE-L F-measure via longest common subsequence, averaged over pairs.
#[derive(Debug, Clone, Default)]
pub struct RougeMetric {
    f_sum: f64,
    count: u64,
}

fn lcs_len(a: &[&str], b: &[&str]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for token_a in a {
        for (j, token_b) in b.iter().enumerate() {
            curr[j + 1] = if token_a == token_b {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

impl RougeMetric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate candidate/reference pairs.
    pub fn update(&mut self, candidates: &[String], references: &[String]) {
        for (candidate, reference) in candidates.iter().zip(references.iter()) {
            let cand = tokenize(candidate);
            let refr = tokenize(reference);

            let lcs = lcs_len(&cand, &refr) as f64;
            let f = if lcs == 0.0 {
                0.0
            } else {
                let p = lcs / cand.len() as f64;
                let r = lcs / refr.len() as f64;
                2.0 * p * r / (p + r)
            };
            self.f_sum += f;
            self.count += 1;
        }
    }

    /// Mean ROUGE-L F-measure since the last reset.
    pub fn compute(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            (self.f_sum / self.count as f64) as f32
        }
    }

    pub fn reset(&mut self) {
        self.f_sum = 0.0;
        self.count = 0;
    }
}

/// Report caption quality aggregate: mean token-level F1 plus exact-match
/// rate against the reference report.
#[derive(Debug, Clone, Default)]
pub struct CaptionMetric {
    f_sum: f64,
    exact: u64,
    count: u64,
}

impl CaptionMetric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate candidate/reference pairs.
    pub fn update(&mut self, candidates: &[String], references: &[String]) {
        for (candidate, reference) in candidates.iter().zip(references.iter()) {
            let cand = tokenize(candidate);
            let refr = tokenize(reference);

            if candidate.trim() == reference.trim() {
                self.exact += 1;
            }

            let mut ref_counts: HashMap<&str, u64> = HashMap::new();
            for &token in &refr {
                *ref_counts.entry(token).or_insert(0) += 1;
            }
            let mut overlap = 0usize;
            for token in &cand {
                if let Some(count) = ref_counts.get_mut(token) {
                    if *count > 0 {
                        *count -= 1;
                        overlap += 1;
                    }
                }
            }

            let f = if overlap == 0 || cand.is_empty() || refr.is_empty() {
                0.0
            } else {
                let p = overlap as f64 / cand.len() as f64;
                let r = overlap as f64 / refr.len() as f64;
                2.0 * p * r / (p + r)
            };
            self.f_sum += f;
            self.count += 1;
        }
    }

    /// Mean token F1 since the last reset.
    pub fn compute(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            (self.f_sum / self.count as f64) as f32
        }
    }

    /// Fraction of exactly-matching captions.
    pub fn exact_match_rate(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            self.exact as f32 / self.count as f32
        }
    }

    pub fn reset(&mut self) {
        self.f_sum = 0.0;
        self.exact = 0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> String {
        text.to_string()
    }

    #[test]
    fn test_bleu_identical_is_one() {
        let mut bleu = BleuMetric::new(4);
        bleu.update(
            &[s("no acute cardiopulmonary process is seen")],
            &[s("no acute cardiopulmonary process is seen")],
        );
        assert!((bleu.compute() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bleu_disjoint_is_zero() {
        let mut bleu = BleuMetric::new(2);
        bleu.update(&[s("a b c d")], &[s("e f g h")]);
        assert_eq!(bleu.compute(), 0.0);
    }

    #[test]
    fn test_bleu_brevity_penalty() {
        // Perfect unigram precision but half-length candidate.
        let mut bleu = BleuMetric::new(1);
        bleu.update(&[s("a b")], &[s("a b c d")]);
        let expected = (1.0f64 - 4.0 / 2.0).exp() as f32;
        assert!((bleu.compute() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_rouge_identical_is_one() {
        let mut rouge = RougeMetric::new();
        rouge.update(&[s("the lungs are clear")], &[s("the lungs are clear")]);
        assert!((rouge.compute() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rouge_subsequence() {
        let mut rouge = RougeMetric::new();
        // LCS "a c" of len 2: P = 2/2, R = 2/3 -> F = 0.8
        rouge.update(&[s("a c")], &[s("a b c")]);
        assert!((rouge.compute() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_caption_exact_match() {
        let mut caption = CaptionMetric::new();
        caption.update(
            &[s("heart size is normal"), s("pleural effusion")],
            &[s("heart size is normal"), s("no pleural effusion")],
        );
        assert!((caption.exact_match_rate() - 0.5).abs() < 1e-6);
        assert!(caption.compute() > 0.0);
    }
}
