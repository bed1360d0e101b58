//! Tokenizer façade: the composed pipeline plus the added-token registry
//! and the chat-template seam.
//!
//! Immutable after load; `encode`, `decode` and `apply_chat_template` are
//! safe to call concurrently (the only shared mutable state is the BPE
//! fragment cache, which serializes behind its own lock).

use rayon::prelude::*;
use serde_json::Value;

use crate::chat::{ChatMessage, ChatTemplateRenderer, JinjaRenderer};

use super::added::AddedVocabulary;
use super::config::{self, LoadError};
use super::decoder::Decoder;
use super::model::Model;
use super::normalizer::Normalizer;
use super::post_processor::{Encoding, TemplateProcessing};
use super::pre_tokenizer::{PreTokenizedString, PreTokenizer};
use super::vocab::SpecialTokenSlots;

pub struct Tokenizer {
    normalizer: Option<Normalizer>,
    pre_tokenizer: Option<PreTokenizer>,
    model: Model,
    post_processor: Option<TemplateProcessing>,
    decoder: Decoder,
    added: AddedVocabulary,
    specials: SpecialTokenSlots,
    chat_renderer: Option<Box<dyn ChatTemplateRenderer>>,
}

impl Tokenizer {
    /// Assemble from a parsed configuration tree. See the factory in
    /// [`config`] for the accepted shape.
    pub fn from_value(root: &Value) -> Result<Self, LoadError> {
        config::from_value(root)
    }

    /// Parse a JSON string and assemble.
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        let root: Value = serde_json::from_str(json)?;
        Self::from_value(&root)
    }

    pub(crate) fn from_parts(
        normalizer: Option<Normalizer>,
        pre_tokenizer: Option<PreTokenizer>,
        model: Model,
        post_processor: Option<TemplateProcessing>,
        decoder: Decoder,
        added: AddedVocabulary,
        specials: SpecialTokenSlots,
    ) -> Self {
        Self {
            normalizer,
            pre_tokenizer,
            model,
            post_processor,
            decoder,
            added,
            specials,
            chat_renderer: None,
        }
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    /// Encode text into token ids.
    pub fn encode(&self, text: &str, add_special_tokens: bool) -> Vec<u32> {
        self.encode_to_encoding(text, add_special_tokens).input_ids
    }

    /// Encode text into ids plus the all-ones attention mask.
    pub fn encode_to_encoding(&self, text: &str, add_special_tokens: bool) -> Encoding {
        if text.is_empty() {
            return Encoding::default();
        }

        let mut ids = Vec::new();
        for unit in self.added.split(text) {
            match unit.token {
                Some(token) => ids.push(token.id),
                None => self.encode_literal(unit.text, &mut ids),
            }
        }

        let mut encoding = Encoding::from_ids(ids);
        if add_special_tokens {
            match &self.post_processor {
                // A loaded template owns the special-token layout outright;
                // the direct bos/eos path is the fallback without one.
                Some(template) => template.process(&mut encoding),
                None => {
                    if let Some(bos) = self.specials.bos {
                        encoding.input_ids.insert(0, bos);
                    }
                    if let Some(eos) = self.specials.eos {
                        encoding.input_ids.push(eos);
                    }
                    encoding.attention_mask = vec![1; encoding.input_ids.len()];
                }
            }
        }
        encoding
    }

    /// Normalize, pre-tokenize and model-tokenize one literal unit.
    fn encode_literal(&self, text: &str, ids: &mut Vec<u32>) {
        let normalized = match &self.normalizer {
            Some(n) => n.normalize(text),
            None => text.to_string(),
        };
        if normalized.is_empty() {
            return;
        }
        let mut pts = PreTokenizedString::new(normalized);
        if let Some(pt) = &self.pre_tokenizer {
            pt.pre_tokenize(&mut pts);
        }
        for fragment in &pts.splits {
            ids.extend(self.model.tokenize(fragment));
        }
    }

    /// Encode many texts, parallelized across texts.
    pub fn encode_batch(&self, texts: &[String], add_special_tokens: bool) -> Vec<Vec<u32>> {
        texts
            .par_iter()
            .map(|text| self.encode(text, add_special_tokens))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------------

    /// Decode ids back into text. Unknown ids contribute nothing.
    pub fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> String {
        let mut tokens: Vec<Vec<u8>> = Vec::with_capacity(ids.len());
        for &id in ids {
            if skip_special_tokens && self.added.is_special(id) {
                continue;
            }
            if let Some(token) = self.model.id_to_token(id) {
                tokens.push(token.as_bytes().to_vec());
            }
        }
        self.decoder.decode(&mut tokens);
        let bytes: Vec<u8> = tokens.into_iter().flatten().collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Decode many id sequences, parallelized across sequences.
    pub fn decode_batch(&self, id_lists: &[Vec<u32>], skip_special_tokens: bool) -> Vec<String> {
        id_lists
            .par_iter()
            .map(|ids| self.decode(ids, skip_special_tokens))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Vocabulary access
    // -----------------------------------------------------------------------

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.model.token_to_id(token)
    }

    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.model.id_to_token(id)
    }

    pub fn vocab_size(&self) -> usize {
        self.model.vocab_size()
    }

    pub fn pad_token_id(&self) -> Option<u32> {
        self.specials.pad
    }

    pub fn bos_token_id(&self) -> Option<u32> {
        self.specials.bos
    }

    pub fn eos_token_id(&self) -> Option<u32> {
        self.specials.eos
    }

    pub fn unk_token_id(&self) -> Option<u32> {
        self.specials.unk
    }

    // -----------------------------------------------------------------------
    // Chat template
    // -----------------------------------------------------------------------

    /// Compile and install a chat template. A template that fails to compile
    /// leaves no renderer installed.
    pub fn set_chat_template(&mut self, source: &str) {
        match JinjaRenderer::new(source) {
            Ok(renderer) => self.chat_renderer = Some(Box::new(renderer)),
            Err(err) => {
                log::warn!("chat template rejected: {err}");
                self.chat_renderer = None;
            }
        }
    }

    /// Install a custom renderer behind the template seam.
    pub fn set_chat_template_renderer(&mut self, renderer: Box<dyn ChatTemplateRenderer>) {
        self.chat_renderer = Some(renderer);
    }

    /// Render the conversation into a prompt string. Returns an empty string
    /// when no template is set or rendering fails.
    pub fn apply_chat_template(
        &self,
        messages: &[ChatMessage],
        add_generation_prompt: bool,
    ) -> String {
        let Some(renderer) = &self.chat_renderer else {
            return String::new();
        };
        let bos = self
            .specials
            .bos
            .and_then(|id| self.id_to_token(id))
            .unwrap_or_default();
        let eos = self
            .specials
            .eos
            .and_then(|id| self.id_to_token(id))
            .unwrap_or_default();
        match renderer.render(messages, add_generation_prompt, bos, eos) {
            Ok(rendered) => rendered,
            Err(err) => {
                log::warn!("chat template render failed: {err}");
                String::new()
            }
        }
    }

    /// [`apply_chat_template`](Self::apply_chat_template) over a JSON array
    /// of `{role, content}` objects. Returns an empty string on malformed
    /// input, like every other chat-template failure.
    pub fn apply_chat_template_json(&self, json: &str, add_generation_prompt: bool) -> String {
        match serde_json::from_str::<Vec<ChatMessage>>(json) {
            Ok(messages) => self.apply_chat_template(&messages, add_generation_prompt),
            Err(err) => {
                log::warn!("chat messages failed to parse: {err}");
                String::new()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Configuration knobs
    // -----------------------------------------------------------------------

    /// Toggle the cleanup flag of every WordPiece decoder in the chain.
    pub fn set_clean_up_tokenization_spaces(&mut self, clean: bool) {
        self.decoder.set_wordpiece_cleanup(clean);
    }
}
