//! Pre-tokenization stage.
//!
//! Pre-tokenizers refine a [`PreTokenizedString`] — a list of substring
//! fragments — until the fragments are small enough for the model to segment
//! independently. Each atom rewrites the fragment list in place; a `Sequence`
//! applies its children left-to-right.

use fancy_regex::Regex;

use super::byte_level;

/// The GPT-2 pre-tokenization pattern used by the ByteLevel pre-tokenizer.
///
/// Requires lookahead support (`\s+(?!\S)`), hence the fancy-regex engine.
pub const BYTE_LEVEL_SPLIT_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// Fragment list progressively refined by pre-tokenizer stages.
#[derive(Debug, Clone, Default)]
pub struct PreTokenizedString {
    pub splits: Vec<String>,
}

impl PreTokenizedString {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            splits: vec![text.into()],
        }
    }
}

/// What happens to the matched regions of a `Split` pre-tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitBehavior {
    /// Matched regions become fragments of their own.
    Isolated,
    /// Matched regions are dropped.
    Removed,
}

/// One pre-tokenization transform.
#[derive(Debug)]
pub enum PreTokenizer {
    /// Regex-driven splitting. `invert` keeps only the matched regions.
    Split {
        regex: Box<Regex>,
        invert: bool,
        behavior: SplitBehavior,
    },
    /// GPT-2 byte-level: optional regex split, then remap every raw byte
    /// into the visible byte alphabet.
    ByteLevel { split_regex: Option<Box<Regex>> },
    /// Isolate each ASCII digit into its own fragment.
    Digits { individual_digits: bool },
    /// Prefix-space insertion and space → sentinel substitution.
    Metaspace {
        replacement: String,
        add_prefix_space: bool,
    },
    /// BERT word/punctuation splitting.
    Bert,
    /// Split on (and drop) whitespace runs.
    WhitespaceSplit,
    /// Children applied left-to-right.
    Sequence(Vec<PreTokenizer>),
}

impl PreTokenizer {
    pub fn pre_tokenize(&self, pts: &mut PreTokenizedString) {
        match self {
            PreTokenizer::Split {
                regex,
                invert,
                behavior,
            } => {
                let mut next = Vec::with_capacity(pts.splits.len());
                for s in &pts.splits {
                    split_fragment(regex, s, *invert, *behavior, &mut next);
                }
                pts.splits = next;
            }
            PreTokenizer::ByteLevel { split_regex } => {
                if let Some(regex) = split_regex {
                    let mut next = Vec::with_capacity(pts.splits.len());
                    for s in &pts.splits {
                        split_fragment(regex, s, false, SplitBehavior::Isolated, &mut next);
                    }
                    pts.splits = next;
                }
                for s in pts.splits.iter_mut() {
                    *s = byte_level::encode_bytes(s.as_bytes());
                }
            }
            PreTokenizer::Digits { individual_digits } => {
                if !individual_digits {
                    return;
                }
                let mut next = Vec::with_capacity(pts.splits.len());
                for s in &pts.splits {
                    let mut run = String::new();
                    for ch in s.chars() {
                        if ch.is_ascii_digit() {
                            if !run.is_empty() {
                                next.push(std::mem::take(&mut run));
                            }
                            next.push(ch.to_string());
                        } else {
                            run.push(ch);
                        }
                    }
                    if !run.is_empty() {
                        next.push(run);
                    }
                }
                pts.splits = next;
            }
            PreTokenizer::Metaspace {
                replacement,
                add_prefix_space,
            } => {
                for s in pts.splits.iter_mut() {
                    if *add_prefix_space && !s.starts_with(' ') {
                        s.insert(0, ' ');
                    }
                    *s = s.replace(' ', replacement);
                }
            }
            PreTokenizer::Bert => {
                let mut next = Vec::with_capacity(pts.splits.len());
                for s in &pts.splits {
                    bert_split(s, &mut next);
                }
                pts.splits = next;
            }
            PreTokenizer::WhitespaceSplit => {
                let mut next = Vec::with_capacity(pts.splits.len());
                for s in &pts.splits {
                    next.extend(s.split_whitespace().map(str::to_string));
                }
                pts.splits = next;
            }
            PreTokenizer::Sequence(children) => {
                for child in children {
                    child.pre_tokenize(pts);
                }
            }
        }
    }
}

/// Scan one fragment with `regex`, pushing the resulting pieces onto `out`.
///
/// Zero-width matches contribute nothing and the scan still advances, so a
/// pattern that can match the empty string cannot loop.
fn split_fragment(
    regex: &Regex,
    s: &str,
    invert: bool,
    behavior: SplitBehavior,
    out: &mut Vec<String>,
) {
    let mut last_end = 0;
    for m in regex.find_iter(s) {
        let m = match m {
            Ok(m) => m,
            Err(_) => break,
        };
        if invert {
            if m.end() > m.start() {
                out.push(s[m.start()..m.end()].to_string());
            }
        } else {
            if m.start() > last_end {
                out.push(s[last_end..m.start()].to_string());
            }
            if behavior == SplitBehavior::Isolated && m.end() > m.start() {
                out.push(s[m.start()..m.end()].to_string());
            }
        }
        last_end = last_end.max(m.end());
    }
    if !invert && last_end < s.len() {
        out.push(s[last_end..].to_string());
    }
}

/// Split on whitespace (dropped) and isolate punctuation codepoints into
/// single-character fragments.
fn bert_split(s: &str, out: &mut Vec<String>) {
    let mut word = String::new();
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !word.is_empty() {
                out.push(std::mem::take(&mut word));
            }
        } else if is_punctuation(ch) {
            if !word.is_empty() {
                out.push(std::mem::take(&mut word));
            }
            out.push(ch.to_string());
        } else {
            word.push(ch);
        }
    }
    if !word.is_empty() {
        out.push(word);
    }
}

/// ASCII punctuation ranges plus non-ASCII codepoints that are neither
/// alphanumeric, whitespace nor control.
fn is_punctuation(ch: char) -> bool {
    ch.is_ascii_punctuation()
        || (!ch.is_ascii() && !ch.is_alphanumeric() && !ch.is_whitespace() && !ch.is_control())
}
