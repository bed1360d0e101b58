//! Integration tests for GPT-2 style byte-level BPE pipelines.
//!
//! Covers the byte-level split + remap path, added-token handling in raw
//! text, the template post-processor, and the universal roundtrip
//! properties a loaded tokenizer must satisfy.

use serde_json::json;
use subtok::core::byte_level::byte_to_char;
use subtok::Tokenizer;

/// A word and its space-prefixed successor segment as single ids.
#[test]
fn test_hello_world_segments_to_two_ids() {
    let tokenizer = gpt2_style_tokenizer();
    assert_eq!(tokenizer.encode("Hello world", false), vec![15496, 995]);
}

/// Byte-level decode restores the original spacing.
#[test]
fn test_hello_world_decodes_back() {
    let tokenizer = gpt2_style_tokenizer();
    assert_eq!(tokenizer.decode(&[15496, 995], true), "Hello world");
}

/// Added tokens are matched in the raw text and their `lstrip` flag eats
/// the whitespace run before them.
#[test]
fn test_added_token_lstrip_swallows_preceding_spaces() {
    let tokenizer = gpt2_style_tokenizer();
    let ids = tokenizer.encode("foo  <|endoftext|>bar", false);
    let foo = tokenizer.token_to_id("foo").unwrap();
    let bar = tokenizer.token_to_id("bar").unwrap();
    assert_eq!(ids, vec![foo, 50256, bar]);
}

/// An added token inside a word still splits it at the match boundary.
#[test]
fn test_added_token_precedence_over_literals() {
    let tokenizer = gpt2_style_tokenizer();
    let ids = tokenizer.encode("foo<|endoftext|>bar", false);
    assert_eq!(ids[1], 50256);
    assert_eq!(ids.len(), 3);
}

/// Repeated encodes are bit-identical: the BPE cache must never change
/// results.
#[test]
fn test_encode_is_deterministic_across_repeats() {
    let tokenizer = gpt2_style_tokenizer();
    let first = tokenizer.encode("Hello world foo bar", false);
    for _ in 0..5 {
        assert_eq!(tokenizer.encode("Hello world foo bar", false), first);
    }
}

/// token ↔ id lookups invert each other over the whole vocabulary.
#[test]
fn test_vocab_bijection() {
    let tokenizer = gpt2_style_tokenizer();
    for token in ["Hello", "Ġworld", "foo", "bar", "<|endoftext|>"] {
        let id = tokenizer.token_to_id(token).unwrap();
        assert_eq!(tokenizer.id_to_token(id), Some(token), "bijection broke at {token:?}");
    }
}

/// With a complete single-byte alphabet, encode ∘ decode is the identity on
/// arbitrary text — the forward and inverse byte tables compose to the
/// identity on all 256 values.
#[test]
fn test_byte_alphabet_roundtrips_arbitrary_text() {
    let mut vocab = serde_json::Map::new();
    for b in 0..=255u8 {
        vocab.insert(byte_to_char(b).to_string(), json!(b));
    }
    let tokenizer = Tokenizer::from_value(&json!({
        "model": { "type": "BPE", "vocab": vocab, "merges": [] },
        "pre_tokenizer": { "type": "ByteLevel", "use_regex": true },
        "decoder": { "type": "ByteLevel" }
    }))
    .unwrap();

    for text in ["plain", "  spaced  out  ", "tabs\tand\nnewlines", "héllo wörld", "日本語 🙂"] {
        let ids = tokenizer.encode(text, false);
        assert_eq!(tokenizer.decode(&ids, true), text, "roundtrip failed for {text:?}");
    }
}

/// A `single` template wraps the body in bos/eos exactly once, and only
/// when special tokens are requested.
#[test]
fn test_template_processing_wraps_body() {
    let tokenizer = Tokenizer::from_value(&json!({
        "model": { "type": "BPE", "vocab": { "hi": 7 }, "merges": [] },
        "added_tokens": [
            { "id": 1, "content": "<s>", "special": true },
            { "id": 2, "content": "</s>", "special": true }
        ],
        "post_processor": {
            "type": "TemplateProcessing",
            "single": [
                { "SpecialToken": { "id": "<s>" } },
                { "Sequence": {} },
                { "SpecialToken": { "id": "</s>" } }
            ]
        }
    }))
    .unwrap();

    let with_special = tokenizer.encode("hi", true);
    assert_eq!(with_special.first(), Some(&1));
    assert_eq!(with_special.last(), Some(&2));

    let without = tokenizer.encode("hi", false);
    assert!(!without.contains(&1) && !without.contains(&2));
}

/// Ids the vocabulary does not know contribute nothing to decode.
#[test]
fn test_decode_drops_unknown_ids() {
    let tokenizer = gpt2_style_tokenizer();
    assert_eq!(tokenizer.decode(&[15496, 777_777], true), "Hello");
}

// Helper: a minimal GPT-2 shaped bundle. Whole words sit in the vocab
// directly, so the byte-level split + remap is the part under test.
fn gpt2_style_tokenizer() -> Tokenizer {
    Tokenizer::from_value(&json!({
        "model": {
            "type": "BPE",
            "vocab": {
                "Hello": 15496,
                "Ġworld": 995,
                "foo": 21943,
                "bar": 5657,
                "Ġfoo": 22944,
                "Ġbar": 2318
            },
            "merges": []
        },
        "pre_tokenizer": { "type": "ByteLevel", "use_regex": true },
        "decoder": { "type": "ByteLevel" },
        "added_tokens": [
            {
                "id": 50256,
                "content": "<|endoftext|>",
                "special": true,
                "lstrip": true,
                "rstrip": false,
                "normalized": false
            }
        ]
    }))
    .unwrap()
}
