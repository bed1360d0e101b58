//! WordPiece model: greedy longest-prefix segmentation with a continuation
//! prefix (conventionally `##`).

use super::vocab::Vocabulary;

pub struct WordPieceModel {
    vocab: Vocabulary,
    unk_id: Option<u32>,
    continuing_subword_prefix: String,
    max_input_chars_per_word: usize,
}

impl WordPieceModel {
    pub fn new(
        vocab: Vocabulary,
        unk_id: Option<u32>,
        continuing_subword_prefix: String,
        max_input_chars_per_word: usize,
    ) -> Self {
        Self {
            vocab,
            unk_id,
            continuing_subword_prefix,
            max_input_chars_per_word,
        }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn vocab_mut(&mut self) -> &mut Vocabulary {
        &mut self.vocab
    }

    /// Segment one word into vocabulary ids.
    ///
    /// Over-long words and words with an unmatchable position collapse to a
    /// single unk id (nothing at all if no unk token is configured).
    pub fn tokenize(&self, word: &str) -> Vec<u32> {
        if word.is_empty() {
            return Vec::new();
        }
        if word.chars().count() > self.max_input_chars_per_word {
            return self.unk_id.into_iter().collect();
        }

        let mut out = Vec::new();
        let mut start = 0;
        while start < word.len() {
            // Longest vocab prefix of the remaining text, continuation
            // prefix applied to every piece but the first.
            let mut found: Option<(usize, u32)> = None;
            let mut end = word.len();
            while end > start {
                let piece = if start == 0 {
                    word[start..end].to_string()
                } else {
                    format!("{}{}", self.continuing_subword_prefix, &word[start..end])
                };
                if let Some(id) = self.vocab.token_to_id(&piece) {
                    found = Some((end, id));
                    break;
                }
                end = prev_char_boundary(word, end);
            }
            match found {
                Some((end, id)) => {
                    out.push(id);
                    start = end;
                }
                None => return self.unk_id.into_iter().collect(),
            }
        }
        out
    }
}

/// Largest char boundary strictly below `end`.
fn prev_char_boundary(s: &str, end: usize) -> usize {
    let mut i = end - 1;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
