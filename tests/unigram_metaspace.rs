//! Integration tests for Unigram pipelines: Metaspace pre-tokenization,
//! Viterbi segmentation, byte fallback and the inverse decoder chain.

use serde_json::json;
use subtok::Tokenizer;

/// The emoji has no vocab entry, so it rides through as four `<0xHH>`
/// tokens; everything decodes back to the original text.
#[test]
fn test_byte_fallback_roundtrip() {
    let tokenizer = unigram_tokenizer();
    let ids = tokenizer.encode("Hello😀", false);
    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(tokenizer.decode(&ids, true), "Hello😀");
}

/// Viterbi picks the highest-scoring segmentation, not the first greedy one.
#[test]
fn test_viterbi_prefers_best_total_score() {
    let tokenizer = Tokenizer::from_value(&json!({
        "model": {
            "type": "Unigram",
            "vocab": [
                ["▁a", -1.0],
                ["▁ab", -1.2],
                ["b", -1.0],
                ["▁abc", -5.0],
                ["c", -1.0]
            ]
        },
        "pre_tokenizer": { "type": "Metaspace", "replacement": "▁", "add_prefix_space": true }
    }))
    .unwrap();
    // ▁ab + c = -2.2 beats ▁a + b + c = -3.0 and ▁abc = -5.0
    assert_eq!(tokenizer.encode("abc", false), vec![1, 4]);
}

/// Metaspace turns inner spaces into the sentinel, so each word gets its
/// own `▁`-prefixed piece.
#[test]
fn test_metaspace_marks_word_boundaries() {
    let tokenizer = Tokenizer::from_value(&json!({
        "model": {
            "type": "Unigram",
            "vocab": [["▁hi", -1.0], ["▁there", -1.0]]
        },
        "pre_tokenizer": { "type": "Metaspace", "replacement": "▁", "add_prefix_space": true },
        "decoder": {
            "type": "Sequence",
            "decoders": [
                { "type": "Metaspace", "replacement": "▁", "add_prefix_space": true },
                { "type": "ByteFallback" }
            ]
        }
    }))
    .unwrap();
    let ids = tokenizer.encode("hi there", false);
    assert_eq!(ids, vec![0, 1]);
    assert_eq!(tokenizer.decode(&ids, true), "hi there");
}

/// The Llama-style decoder chain (Replace + ByteFallback + Fuse + Strip)
/// behaves the same as the Metaspace decoder for plain text.
#[test]
fn test_replace_fuse_strip_decoder_chain() {
    let tokenizer = Tokenizer::from_value(&json!({
        "model": {
            "type": "Unigram",
            "vocab": [["▁hi", -1.0], ["▁there", -1.0]]
        },
        "pre_tokenizer": { "type": "Metaspace", "replacement": "▁", "add_prefix_space": true },
        "decoder": {
            "type": "Sequence",
            "decoders": [
                { "type": "Replace", "pattern": { "String": "▁" }, "content": " " },
                { "type": "ByteFallback" },
                { "type": "Fuse" },
                { "type": "Strip", "content": " ", "start": 1, "stop": 0 }
            ]
        }
    }))
    .unwrap();
    let ids = tokenizer.encode("hi there", false);
    assert_eq!(tokenizer.decode(&ids, true), "hi there");
}

/// Unknown characters become unk steps; contiguous unks merge into one id.
#[test]
fn test_unknown_runs_merge_into_single_unk() {
    let tokenizer = Tokenizer::from_value(&json!({
        "model": {
            "type": "Unigram",
            "unk_id": 0,
            "vocab": [["<unk>", -10.0], ["▁a", -1.0]]
        },
        "pre_tokenizer": { "type": "Metaspace", "replacement": "▁", "add_prefix_space": true }
    }))
    .unwrap();
    assert_eq!(tokenizer.encode("aЖЖ", false), vec![1, 0]);
}

/// Unigram ids follow vocabulary insertion order.
#[test]
fn test_ids_are_vocab_positions() {
    let tokenizer = unigram_tokenizer();
    assert_eq!(tokenizer.token_to_id("▁H"), Some(0));
    assert_eq!(tokenizer.token_to_id("ello"), Some(1));
    assert_eq!(tokenizer.id_to_token(2), Some("<0xF0>"));
}

// Helper: the byte-fallback scenario vocabulary.
fn unigram_tokenizer() -> Tokenizer {
    Tokenizer::from_value(&json!({
        "model": {
            "type": "Unigram",
            "byte_fallback": true,
            "vocab": [
                ["▁H", -1.0],
                ["ello", -2.0],
                ["<0xF0>", -8.0],
                ["<0x9F>", -8.0],
                ["<0x98>", -8.0],
                ["<0x80>", -8.0]
            ]
        },
        "pre_tokenizer": { "type": "Metaspace", "replacement": "▁", "add_prefix_space": true },
        "decoder": {
            "type": "Sequence",
            "decoders": [
                { "type": "Metaspace", "replacement": "▁", "add_prefix_space": true },
                { "type": "ByteFallback" }
            ]
        }
    }))
    .unwrap()
}
