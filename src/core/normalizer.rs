//! Text normalization stage.
//!
//! Normalizers rewrite the literal (non-added-token) units of the input
//! before pre-tokenization. Each atom maps a string to a string; a
//! `Sequence` applies its children left-to-right.

use fancy_regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Pattern for the `Replace` normalizer: a literal needle or a compiled
/// regex, depending on the configuration shape.
#[derive(Debug)]
pub enum ReplacePattern {
    Literal(String),
    Regex(Box<Regex>),
}

/// One normalization transform.
#[derive(Debug)]
pub enum Normalizer {
    /// Unicode NFKC normalization.
    Nfkc,
    /// Unicode NFKD normalization.
    Nfkd,
    /// Codepoint-wise lowercasing.
    Lowercase,
    /// Decompose and drop combining marks.
    StripAccents,
    /// Prefix the string with a fixed literal.
    Prepend { prefix: String },
    /// Global, non-overlapping textual replacement.
    Replace {
        pattern: ReplacePattern,
        content: String,
    },
    /// SentencePiece-style precompiled map, approximated as NFKC followed by
    /// replacing U+200D (zero-width joiner) with a space.
    Precompiled,
    /// Composite BERT cleanup.
    Bert {
        clean_text: bool,
        handle_chinese_chars: bool,
        /// Defaults to `lowercase` when not set explicitly.
        strip_accents: Option<bool>,
        lowercase: bool,
    },
    /// Children applied left-to-right.
    Sequence(Vec<Normalizer>),
}

impl Normalizer {
    pub fn normalize(&self, text: &str) -> String {
        match self {
            Normalizer::Nfkc => text.nfkc().collect(),
            Normalizer::Nfkd => text.nfkd().collect(),
            Normalizer::Lowercase => text.chars().flat_map(char::to_lowercase).collect(),
            Normalizer::StripAccents => strip_accents(text),
            Normalizer::Prepend { prefix } => {
                let mut out = String::with_capacity(prefix.len() + text.len());
                out.push_str(prefix);
                out.push_str(text);
                out
            }
            Normalizer::Replace { pattern, content } => match pattern {
                ReplacePattern::Literal(needle) if needle.is_empty() => text.to_string(),
                ReplacePattern::Literal(needle) => text.replace(needle.as_str(), content),
                ReplacePattern::Regex(regex) => regex.replace_all(text, content.as_str()).into_owned(),
            },
            Normalizer::Precompiled => {
                let composed: String = text.nfkc().collect();
                composed.replace('\u{200D}', " ")
            }
            Normalizer::Bert {
                clean_text,
                handle_chinese_chars,
                strip_accents: strip,
                lowercase,
            } => {
                let mut out = text.to_string();
                if *clean_text {
                    out = bert_clean_text(&out);
                }
                if *handle_chinese_chars {
                    out = bert_pad_cjk(&out);
                }
                if strip.unwrap_or(*lowercase) {
                    out = strip_accents(&out);
                }
                if *lowercase {
                    out = out.chars().flat_map(char::to_lowercase).collect();
                }
                out
            }
            Normalizer::Sequence(children) => {
                let mut out = text.to_string();
                for child in children {
                    out = child.normalize(&out);
                }
                out
            }
        }
    }
}

/// Decompose, then drop every combining-mark codepoint.
fn strip_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Replace tab/newline/CR and other whitespace with a plain space; drop NUL,
/// U+FFFD and remaining control characters.
fn bert_clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == '\0' || ch == '\u{FFFD}' {
            continue;
        }
        if matches!(ch, '\t' | '\n' | '\r') || ch.is_whitespace() {
            out.push(' ');
        } else if ch.is_control() {
            continue;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Surround CJK-range codepoints with spaces so they split into single
/// characters downstream.
fn bert_pad_cjk(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if is_cjk(ch) {
            out.push(' ');
            out.push(ch);
            out.push(' ');
        } else {
            out.push(ch);
        }
    }
    out
}

/// The CJK unified ideograph blocks used by BERT's reference tokenizer.
fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0x2A700..=0x2B73F
            | 0x2B740..=0x2B81F
            | 0x2B820..=0x2CEAF
            | 0xF900..=0xFAFF
            | 0x2F800..=0x2FA1F
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nfkc_composes_decomposed_accents() {
        let n = Normalizer::Nfkc;
        assert_eq!(n.normalize("e\u{0301}"), "é");
    }

    #[test]
    fn nfkd_decomposes_compatibility_forms() {
        let n = Normalizer::Nfkd;
        // U+FB01 LATIN SMALL LIGATURE FI decomposes to "fi" under NFKD.
        assert_eq!(n.normalize("\u{FB01}"), "fi");
        assert_eq!(n.normalize("é"), "e\u{0301}");
    }

    #[test]
    fn lowercase_is_codepoint_wise() {
        let n = Normalizer::Lowercase;
        assert_eq!(n.normalize("Hello WÖRLD"), "hello wörld");
    }

    #[test]
    fn strip_accents_drops_combining_marks() {
        let n = Normalizer::StripAccents;
        assert_eq!(n.normalize("café"), "cafe");
        assert_eq!(n.normalize("über"), "uber");
    }

    #[test]
    fn prepend_prefixes_literal() {
        let n = Normalizer::Prepend { prefix: "▁".into() };
        assert_eq!(n.normalize("abc"), "▁abc");
    }

    #[test]
    fn replace_literal_is_global() {
        let n = Normalizer::Replace {
            pattern: ReplacePattern::Literal(" ".into()),
            content: "▁".into(),
        };
        assert_eq!(n.normalize("a b c"), "a▁b▁c");
    }

    #[test]
    fn replace_regex_is_global() {
        let n = Normalizer::Replace {
            pattern: ReplacePattern::Regex(Box::new(Regex::new(r"\s+").unwrap())),
            content: " ".into(),
        };
        assert_eq!(n.normalize("a \t b\n\nc"), "a b c");
    }

    #[test]
    fn precompiled_replaces_zwj() {
        let n = Normalizer::Precompiled;
        assert_eq!(n.normalize("a\u{200D}b"), "a b");
    }

    #[test]
    fn bert_defaults_clean_pad_and_lowercase() {
        let n = Normalizer::Bert {
            clean_text: true,
            handle_chinese_chars: true,
            strip_accents: None,
            lowercase: true,
        };
        assert_eq!(n.normalize("Hello\tWörld"), "hello world");
        assert_eq!(n.normalize("abc中def"), "abc 中 def");
        // NUL and control characters vanish.
        assert_eq!(n.normalize("a\0b\u{0007}c"), "abc");
    }

    #[test]
    fn bert_strip_accents_follows_lowercase_unless_set() {
        let keep = Normalizer::Bert {
            clean_text: false,
            handle_chinese_chars: false,
            strip_accents: Some(false),
            lowercase: true,
        };
        assert_eq!(keep.normalize("Café"), "café");
    }

    #[test]
    fn sequence_applies_left_to_right() {
        let n = Normalizer::Sequence(vec![
            Normalizer::Lowercase,
            Normalizer::Replace {
                pattern: ReplacePattern::Literal("hello".into()),
                content: "hi".into(),
            },
        ]);
        assert_eq!(n.normalize("HELLO world"), "hi world");
    }
}
