//! Beam-search caption decoding.
//!
//! The decoder collaborator supplies tokenization and a teacher-forced
//! forward pass; the search loop lives here. The cross-attention context
//! is replicated once per beam up front, then every step expands each live
//! beam by its top continuations, retiring beams that emit EOS.

use candle_core::{Tensor, D};
use candle_nn::ops::log_softmax;

use radfuse_core::{CaptionDecoder, CoreError};

use crate::error::{ObjectiveError, ObjectiveResult};

/// Beam-search parameters.
#[derive(Debug, Clone)]
pub struct BeamSearchConfig {
    /// Live beams kept per example.
    pub num_beams: usize,
    /// Maximum sequence length including the start token.
    pub max_len: usize,
}

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    score: f32,
}

impl Hypothesis {
    /// Length-normalized score; the start token carries no probability.
    fn normalized(&self) -> f32 {
        let generated = self.tokens.len().saturating_sub(1).max(1);
        self.score / generated as f32
    }
}

/// Decode one sequence per context row.
///
/// `encoder_hidden_states` is `[N, S, D]`; the result holds `N` token
/// sequences starting with BOS (EOS included when emitted).
pub fn beam_search(
    decoder: &dyn CaptionDecoder,
    encoder_hidden_states: &Tensor,
    config: &BeamSearchConfig,
) -> ObjectiveResult<Vec<Vec<u32>>> {
    let n = encoder_hidden_states.dim(0)?;
    let beams = config.num_beams;
    let device = encoder_hidden_states.device();

    // Replicate the context once per beam: row i serves beams [i*B, (i+1)*B).
    let mut expanded_idx = Vec::with_capacity(n * beams);
    for i in 0..n {
        expanded_idx.extend(std::iter::repeat(i as u32).take(beams));
    }
    let expanded_idx = Tensor::from_vec(expanded_idx, (n * beams,), device)?;
    let states = encoder_hidden_states.index_select(&expanded_idx, 0)?;

    let bos = decoder.bos_token_id();
    let eos = decoder.eos_token_id();
    let pad = decoder.pad_token_id();

    // Only the first beam starts viable; the rest would duplicate it.
    let mut live: Vec<Vec<Hypothesis>> = (0..n)
        .map(|_| {
            (0..beams)
                .map(|b| Hypothesis {
                    tokens: vec![bos],
                    score: if b == 0 { 0.0 } else { f32::NEG_INFINITY },
                })
                .collect()
        })
        .collect();
    let mut done: Vec<Vec<Hypothesis>> = vec![Vec::new(); n];

    for _ in 1..config.max_len {
        let exhausted = (0..n).all(|i| {
            done[i].len() >= beams
                || live[i].iter().all(|h| h.score == f32::NEG_INFINITY)
        });
        if exhausted {
            break;
        }

        // Pack every live beam into one padded forward pass.
        let cur_len = live
            .iter()
            .flat_map(|hs| hs.iter().map(|h| h.tokens.len()))
            .max()
            .unwrap_or(1);
        let mut ids = Vec::with_capacity(n * beams * cur_len);
        for hypotheses in &live {
            for hypothesis in hypotheses {
                ids.extend(hypothesis.tokens.iter().copied());
                ids.extend(std::iter::repeat(pad).take(cur_len - hypothesis.tokens.len()));
            }
        }
        let input_ids = Tensor::from_vec(ids, (n * beams, cur_len), device)?;

        let logits = decoder.forward(&input_ids, None, &states)?;
        let log_probs: Vec<Vec<Vec<f32>>> = log_softmax(&logits, D::Minus1)?.to_vec3()?;

        for i in 0..n {
            if done[i].len() >= beams {
                continue;
            }

            let mut candidates: Vec<(Hypothesis, bool)> = Vec::new();
            for (b, hypothesis) in live[i].iter().enumerate() {
                if hypothesis.score == f32::NEG_INFINITY {
                    continue;
                }
                let row = &log_probs[i * beams + b][hypothesis.tokens.len() - 1];

                let mut order: Vec<usize> = (0..row.len()).collect();
                order.sort_by(|&a, &c| {
                    row[c].partial_cmp(&row[a]).unwrap_or(std::cmp::Ordering::Equal)
                });
                for &token in order.iter().take(2 * beams) {
                    let mut tokens = hypothesis.tokens.clone();
                    tokens.push(token as u32);
                    let candidate =
                        Hypothesis { tokens, score: hypothesis.score + row[token] };
                    candidates.push((candidate, token as u32 == eos));
                }
            }
            candidates.sort_by(|a, b| {
                b.0.score.partial_cmp(&a.0.score).unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut next: Vec<Hypothesis> = Vec::with_capacity(beams);
            for (candidate, finished) in candidates {
                if finished {
                    if done[i].len() < beams {
                        done[i].push(candidate);
                    }
                } else if next.len() < beams {
                    next.push(candidate);
                }
                if next.len() >= beams && done[i].len() >= beams {
                    break;
                }
            }
            next.resize_with(beams, || Hypothesis {
                tokens: vec![bos],
                score: f32::NEG_INFINITY,
            });
            live[i] = next;
        }
    }

    let mut sequences = Vec::with_capacity(n);
    for i in 0..n {
        let best = done[i]
            .iter()
            .chain(live[i].iter().filter(|h| h.score > f32::NEG_INFINITY))
            .max_by(|a, b| {
                a.normalized().partial_cmp(&b.normalized()).unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
            .ok_or_else(|| {
                ObjectiveError::Core(CoreError::Generation(
                    "beam search produced no hypothesis".to_string(),
                ))
            })?;
        sequences.push(best.tokens);
    }
    Ok(sequences)
}
