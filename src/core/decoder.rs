//! Decoder stage: invert tokenization.
//!
//! The chain receives one byte buffer per surviving token and rewrites the
//! list; the façade concatenates whatever remains. Working on bytes rather
//! than strings lets `<0xHH>` fallback tokens pass through as lone bytes
//! until their neighbors complete a UTF-8 sequence.

use super::byte_level;

/// One decode transform.
#[derive(Debug, Clone)]
pub enum Decoder {
    /// Map visible-alphabet characters back to raw bytes; characters outside
    /// the alphabet pass through.
    ByteLevel,
    /// Replace `<0xHH>` tokens with the single byte they encode.
    ByteFallback,
    /// Concatenate all tokens into one.
    Fuse,
    /// Remove leading `content` from the first token and/or trailing
    /// `content` from the last.
    Strip {
        content: String,
        start: u32,
        stop: u32,
    },
    /// Global textual replacement within each token.
    Replace { pattern: String, content: String },
    /// Join with spaces, gluing `prefix`-continuations to the previous token.
    WordPiece { prefix: String, cleanup: bool },
    /// Sentinel → space substitution.
    Metaspace {
        replacement: String,
        add_prefix_space: bool,
    },
    /// Children applied left-to-right.
    Sequence(Vec<Decoder>),
}

impl Decoder {
    pub fn decode(&self, tokens: &mut Vec<Vec<u8>>) {
        match self {
            Decoder::ByteLevel => {
                for token in tokens.iter_mut() {
                    if let Ok(text) = std::str::from_utf8(token) {
                        let mut out = Vec::with_capacity(token.len());
                        for ch in text.chars() {
                            match byte_level::char_to_byte(ch) {
                                Some(b) => out.push(b),
                                None => {
                                    let mut buf = [0u8; 4];
                                    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                                }
                            }
                        }
                        *token = out;
                    }
                }
            }
            Decoder::ByteFallback => {
                for token in tokens.iter_mut() {
                    if let Some(b) = parse_byte_token(token) {
                        *token = vec![b];
                    }
                }
            }
            Decoder::Fuse => {
                let fused: Vec<u8> = tokens.drain(..).flatten().collect();
                tokens.push(fused);
            }
            Decoder::Strip {
                content,
                start,
                stop,
            } => {
                let needle = content.as_bytes();
                if needle.is_empty() {
                    return;
                }
                if *start > 0 {
                    if let Some(first) = tokens.first_mut() {
                        if first.starts_with(needle) {
                            first.drain(..needle.len());
                        }
                    }
                }
                if *stop > 0 {
                    if let Some(last) = tokens.last_mut() {
                        if last.ends_with(needle) {
                            last.truncate(last.len() - needle.len());
                        }
                    }
                }
            }
            Decoder::Replace { pattern, content } => {
                for token in tokens.iter_mut() {
                    *token = replace_bytes(token, pattern.as_bytes(), content.as_bytes());
                }
            }
            Decoder::WordPiece { prefix, cleanup } => {
                let prefix = prefix.as_bytes();
                let mut joined = Vec::new();
                for (i, token) in tokens.iter().enumerate() {
                    if i > 0 {
                        if token.starts_with(prefix) {
                            joined.extend_from_slice(&token[prefix.len()..]);
                            continue;
                        }
                        joined.push(b' ');
                    }
                    joined.extend_from_slice(token);
                }
                if *cleanup {
                    for (from, to) in [
                        (" .", "."),
                        (" ,", ","),
                        (" !", "!"),
                        (" ?", "?"),
                        (" ' ", "'"),
                    ] {
                        joined = replace_bytes(&joined, from.as_bytes(), to.as_bytes());
                    }
                }
                *tokens = vec![joined];
            }
            Decoder::Metaspace {
                replacement,
                add_prefix_space,
            } => {
                for token in tokens.iter_mut() {
                    *token = replace_bytes(token, replacement.as_bytes(), b" ");
                }
                if *add_prefix_space {
                    if let Some(first) = tokens.first_mut() {
                        if first.first() == Some(&b' ') {
                            first.remove(0);
                        }
                    }
                }
            }
            Decoder::Sequence(children) => {
                for child in children {
                    child.decode(tokens);
                }
            }
        }
    }

    /// Toggle the `cleanup` flag of every WordPiece decoder in the chain.
    pub fn set_wordpiece_cleanup(&mut self, enabled: bool) {
        match self {
            Decoder::WordPiece { cleanup, .. } => *cleanup = enabled,
            Decoder::Sequence(children) => {
                for child in children {
                    child.set_wordpiece_cleanup(enabled);
                }
            }
            _ => {}
        }
    }
}

/// Parse a `<0xHH>` byte token.
fn parse_byte_token(token: &[u8]) -> Option<u8> {
    if token.len() != 6 || !token.starts_with(b"<0x") || token[5] != b'>' {
        return None;
    }
    let hex = std::str::from_utf8(&token[3..5]).ok()?;
    u8::from_str_radix(hex, 16).ok()
}

/// Replace every occurrence of `needle` in `haystack`.
fn replace_bytes(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}
