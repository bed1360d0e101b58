//! Core pipeline engine.
//!
//! A loaded tokenizer is a six-stage pipeline:
//!
//! 1. [`AddedVocabulary`] splits raw input around declared added tokens
//! 2. [`Normalizer`] rewrites the literal units
//! 3. [`PreTokenizer`] refines them into model-sized fragments
//! 4. [`Model`] segments each fragment into vocabulary ids (BPE, WordPiece
//!    or Unigram)
//! 5. [`TemplateProcessing`] lays out declared special tokens around the
//!    id stream
//! 6. [`Decoder`] inverts the whole thing on the way back out
//!
//! The [`config`] factory assembles the stages from a parsed configuration
//! tree; [`Tokenizer`] owns the composed pipeline.

pub mod added;
pub mod bpe;
pub mod byte_level;
pub mod config;
pub mod decoder;
pub mod model;
pub mod normalizer;
pub mod post_processor;
pub mod pre_tokenizer;
pub mod tokenizer;
pub mod unigram;
pub mod vocab;
pub mod wordpiece;

pub use added::AddedVocabulary;
pub use bpe::BpeModel;
pub use config::LoadError;
pub use decoder::Decoder;
pub use model::Model;
pub use normalizer::Normalizer;
pub use post_processor::{Encoding, TemplateProcessing, TemplateStep};
pub use pre_tokenizer::{PreTokenizedString, PreTokenizer, SplitBehavior};
pub use tokenizer::Tokenizer;
pub use unigram::UnigramModel;
pub use vocab::{AddedToken, MergeTable, SpecialTokenSlots, Vocabulary};
pub use wordpiece::WordPieceModel;
