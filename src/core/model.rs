//! Model stage dispatch.

use super::bpe::BpeModel;
use super::unigram::UnigramModel;
use super::vocab::Vocabulary;
use super::wordpiece::WordPieceModel;

/// The segmentation model at the center of the pipeline.
pub enum Model {
    Bpe(BpeModel),
    WordPiece(WordPieceModel),
    Unigram(UnigramModel),
}

impl Model {
    /// Segment one pre-token fragment into vocabulary ids.
    pub fn tokenize(&self, fragment: &str) -> Vec<u32> {
        match self {
            Model::Bpe(m) => m.tokenize(fragment),
            Model::WordPiece(m) => m.tokenize(fragment),
            Model::Unigram(m) => m.tokenize(fragment),
        }
    }

    pub fn vocab(&self) -> &Vocabulary {
        match self {
            Model::Bpe(m) => m.vocab(),
            Model::WordPiece(m) => m.vocab(),
            Model::Unigram(m) => m.vocab(),
        }
    }

    pub fn vocab_mut(&mut self) -> &mut Vocabulary {
        match self {
            Model::Bpe(m) => m.vocab_mut(),
            Model::WordPiece(m) => m.vocab_mut(),
            Model::Unigram(m) => m.vocab_mut(),
        }
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab().token_to_id(token)
    }

    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.vocab().id_to_token(id)
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab().len()
    }
}
