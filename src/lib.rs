//! Subtok — a runtime subword tokenizer for language models.
//!
//! Loads a pretrained configuration bundle (vocabulary, optional merge
//! table, declarative pipeline description) and converts text ↔ token-id
//! sequences with byte-exact fidelity to the upstream reference tokenizer.
//!
//! ```no_run
//! use subtok::Tokenizer;
//!
//! let tokenizer = Tokenizer::from_json_str(r#"{ "model": { "vocab": {} } }"#).unwrap();
//! let ids = tokenizer.encode("Hello world", true);
//! let text = tokenizer.decode(&ids, true);
//! ```
//!
//! The pipeline is declarative: normalizer → pre-tokenizer → model
//! (BPE / WordPiece / Unigram) → post-processor, inverted by a decoder
//! chain on the way out. See [`core`] for the stage types and the
//! configuration shape.

pub mod chat;
pub mod core;

pub use chat::{ChatMessage, ChatTemplateError, ChatTemplateRenderer, JinjaRenderer};
pub use core::{
    Encoding, LoadError, Model, PreTokenizedString, Tokenizer, Vocabulary,
};
