//! Added-token registry and raw-text splitter.
//!
//! Added tokens are matched verbatim in the raw input, before any
//! normalization, so their boundaries survive whatever the normalizer would
//! do to them. The input is split into alternating literal / added-token
//! units; only literal units continue down the pipeline.

use aho_corasick::{AhoCorasick, MatchKind};

use super::vocab::AddedToken;

/// One unit of the split input: a literal run, or a matched added token.
#[derive(Debug)]
pub struct SplitUnit<'a> {
    pub text: &'a str,
    pub token: Option<&'a AddedToken>,
}

/// The declared added tokens plus their raw-text matcher.
///
/// Matching uses leftmost-longest semantics over every token with
/// `normalized = false`, so at any position the longest declared content
/// wins and overlaps resolve left-to-right.
pub struct AddedVocabulary {
    tokens: Vec<AddedToken>,
    matcher: Option<AhoCorasick>,
    /// Matcher pattern index → index into `tokens`.
    pattern_tokens: Vec<usize>,
    special_ids: Vec<u32>,
}

impl AddedVocabulary {
    pub fn new(tokens: Vec<AddedToken>) -> Self {
        let mut patterns: Vec<&str> = Vec::new();
        let mut pattern_tokens = Vec::new();
        for (i, token) in tokens.iter().enumerate() {
            if !token.normalized && !token.content.is_empty() {
                patterns.push(token.content.as_str());
                pattern_tokens.push(i);
            }
        }
        let matcher = if patterns.is_empty() {
            None
        } else {
            match AhoCorasick::builder()
                .match_kind(MatchKind::LeftmostLongest)
                .build(&patterns)
            {
                Ok(m) => Some(m),
                Err(err) => {
                    log::warn!("added-token matcher failed to build: {err}");
                    None
                }
            }
        };
        let mut special_ids: Vec<u32> =
            tokens.iter().filter(|t| t.special).map(|t| t.id).collect();
        special_ids.sort_unstable();

        Self {
            tokens,
            matcher,
            pattern_tokens,
            special_ids,
        }
    }

    pub fn tokens(&self) -> &[AddedToken] {
        &self.tokens
    }

    pub fn is_special(&self, id: u32) -> bool {
        self.special_ids.binary_search(&id).is_ok()
    }

    /// Split raw input into literal / added-token units.
    ///
    /// `lstrip` tokens pull ASCII whitespace off the end of the preceding
    /// literal; `rstrip` tokens swallow it from the following one.
    pub fn split<'a>(&'a self, text: &'a str) -> Vec<SplitUnit<'a>> {
        if text.is_empty() {
            return Vec::new();
        }
        let Some(matcher) = &self.matcher else {
            return vec![SplitUnit { text, token: None }];
        };

        let bytes = text.as_bytes();
        let mut units = Vec::new();
        let mut cursor = 0;
        for m in matcher.find_iter(text) {
            if m.start() < cursor {
                // Swallowed by a previous token's rstrip.
                continue;
            }
            let token = &self.tokens[self.pattern_tokens[m.pattern().as_usize()]];

            let mut literal_end = m.start();
            if token.lstrip {
                while literal_end > cursor && bytes[literal_end - 1].is_ascii_whitespace() {
                    literal_end -= 1;
                }
            }
            let mut next_start = m.end();
            if token.rstrip {
                while next_start < bytes.len() && bytes[next_start].is_ascii_whitespace() {
                    next_start += 1;
                }
            }

            if literal_end > cursor {
                units.push(SplitUnit {
                    text: &text[cursor..literal_end],
                    token: None,
                });
            }
            units.push(SplitUnit {
                text: &text[m.start()..m.end()],
                token: Some(token),
            });
            cursor = next_start;
        }
        if cursor < text.len() {
            units.push(SplitUnit {
                text: &text[cursor..],
                token: None,
            });
        }
        units
    }
}
