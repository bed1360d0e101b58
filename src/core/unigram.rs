//! Unigram model: Viterbi search for the best-scoring segmentation over a
//! scored vocabulary.
//!
//! Scores are per-id log probabilities (higher is better). The dynamic
//! program runs over byte positions; the inner loop scans candidate starts
//! backwards with strictly-greater updates, which fixes the tie-break to the
//! reference behavior.

use super::vocab::Vocabulary;

/// Score assumed for the unk token when no score is known for it.
const FALLBACK_UNK_SCORE: f64 = -10.0;

pub struct UnigramModel {
    /// Insertion order is the id assignment: id = index.
    vocab: Vocabulary,
    /// Parallel to the vocab ids.
    scores: Vec<f64>,
    unk_id: Option<u32>,
    byte_fallback: bool,
    max_token_bytes: usize,
}

impl UnigramModel {
    pub fn new(vocab: Vocabulary, scores: Vec<f64>, unk_id: Option<u32>, byte_fallback: bool) -> Self {
        let max_token_bytes = vocab.max_token_bytes().max(1);
        Self {
            vocab,
            scores,
            unk_id,
            byte_fallback,
            max_token_bytes,
        }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn vocab_mut(&mut self) -> &mut Vocabulary {
        &mut self.vocab
    }

    /// Score of `id`, if the id belongs to the scored base vocabulary.
    /// Added tokens sit past the end of the score table and never win here.
    fn score_of(&self, id: u32) -> Option<f64> {
        self.scores.get(id as usize).copied()
    }

    /// Segment one fragment into vocabulary ids.
    pub fn tokenize(&self, fragment: &str) -> Vec<u32> {
        let bytes = fragment.as_bytes();
        let n = bytes.len();
        if n == 0 {
            return Vec::new();
        }

        let mut best = vec![f64::NEG_INFINITY; n + 1];
        let mut prev = vec![0usize; n + 1];
        let mut chosen: Vec<Option<u32>> = vec![None; n + 1];
        best[0] = 0.0;

        for i in 1..=n {
            let lo = i.saturating_sub(self.max_token_bytes);
            for j in (lo..i).rev() {
                if best[j] == f64::NEG_INFINITY {
                    continue;
                }
                let Some((id, score)) = self.candidate(&bytes[j..i]) else {
                    continue;
                };
                let total = best[j] + score;
                if total > best[i] {
                    best[i] = total;
                    prev[i] = j;
                    chosen[i] = Some(id);
                }
            }
            if best[i] == f64::NEG_INFINITY {
                // No piece ends here: consume the UTF-8 character ending at
                // this position as a single unk step.
                let start = char_start(bytes, i);
                let unk_score = self
                    .unk_id
                    .and_then(|unk| self.score_of(unk))
                    .unwrap_or(FALLBACK_UNK_SCORE);
                best[i] = best[start] + unk_score;
                prev[i] = start;
                chosen[i] = self.unk_id;
            }
        }

        let mut ids = Vec::new();
        let mut pos = n;
        while pos > 0 {
            if let Some(id) = chosen[pos] {
                ids.push(id);
            }
            pos = prev[pos];
        }
        ids.reverse();

        if let Some(unk) = self.unk_id {
            ids.dedup_by(|a, b| *a == unk && *b == unk);
        }
        ids
    }

    /// Best token for one span: the vocab entry itself, or a single-byte
    /// `<0xHH>` / unk fallback when byte fallback is on.
    fn candidate(&self, sub: &[u8]) -> Option<(u32, f64)> {
        if let Ok(s) = std::str::from_utf8(sub) {
            if let Some(id) = self.vocab.token_to_id(s) {
                if let Some(score) = self.score_of(id) {
                    return Some((id, score));
                }
            }
        }
        if self.byte_fallback && sub.len() == 1 {
            let hex = format!("<0x{:02X}>", sub[0]);
            if let Some(id) = self.vocab.token_to_id(&hex) {
                if let Some(score) = self.score_of(id) {
                    return Some((id, score));
                }
            }
            if let Some(unk) = self.unk_id {
                let score = self.score_of(unk).unwrap_or(FALLBACK_UNK_SCORE);
                return Some((unk, score));
            }
        }
        None
    }
}

/// First byte index of the UTF-8 character whose last byte is at `end - 1`.
fn char_start(bytes: &[u8], end: usize) -> usize {
    let mut start = end - 1;
    while start > 0 && bytes[start] & 0xC0 == 0x80 {
        start -= 1;
    }
    start
}
