//! Component factory: build the pipeline from a parsed configuration tree.
//!
//! The file/bundle loader is external; this module receives the already
//! parsed JSON-shaped tree and assembles each stage from it. Stage nodes are
//! `type`-tagged; unknown atoms and uncompilable patterns degrade to inert
//! stages with a warning rather than failing the load — only a malformed
//! root or model section is fatal.

use serde_json::Value;
use thiserror::Error;

use super::added::AddedVocabulary;
use super::bpe::BpeModel;
use super::decoder::Decoder;
use super::model::Model;
use super::normalizer::{Normalizer, ReplacePattern};
use super::post_processor::{TemplateProcessing, TemplateStep};
use super::pre_tokenizer::{PreTokenizer, SplitBehavior, BYTE_LEVEL_SPLIT_PATTERN};
use super::tokenizer::Tokenizer;
use super::unigram::UnigramModel;
use super::vocab::{AddedToken, MergeTable, SpecialTokenSlots, Vocabulary};
use super::wordpiece::WordPieceModel;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration root is not an object")]
    RootNotObject,
    #[error("model section is malformed: {0}")]
    Model(&'static str),
}

/// Assemble a [`Tokenizer`] from a parsed configuration tree.
pub fn from_value(root: &Value) -> Result<Tokenizer, LoadError> {
    if !root.is_object() {
        return Err(LoadError::RootNotObject);
    }

    let mut model = build_model(root)?;
    let normalizer = root.get("normalizer").and_then(build_normalizer);
    let pre_tokenizer = root.get("pre_tokenizer").and_then(build_pre_tokenizer);
    let decoder = root
        .get("decoder")
        .and_then(build_decoder)
        .unwrap_or(Decoder::ByteLevel);

    let mut specials = SpecialTokenSlots::default();
    let added_tokens = parse_added_tokens(root.get("added_tokens"));
    for token in &added_tokens {
        model.vocab_mut().insert(token.content.clone(), token.id);
        specials.note_added_token(&token.content, token.id);
    }
    let added = AddedVocabulary::new(added_tokens);

    // Resolved after added tokens land in the vocab, so template steps can
    // reference them by name.
    let post_processor = root
        .get("post_processor")
        .and_then(|v| build_post_processor(v, &model));

    let mut chat_template = None;
    if let Some(overrides) = root.get("config_overrides") {
        apply_overrides(overrides, &model, &mut specials);
        if let Some(source) = overrides.get("chat_template").and_then(Value::as_str) {
            chat_template = Some(source.to_string());
        }
    }

    log::debug!(
        "loaded tokenizer: vocab={} added={} bos={:?} eos={:?}",
        model.vocab_size(),
        added.tokens().len(),
        specials.bos,
        specials.eos,
    );

    let mut tokenizer = Tokenizer::from_parts(
        normalizer,
        pre_tokenizer,
        model,
        post_processor,
        decoder,
        added,
        specials,
    );
    if let Some(source) = chat_template {
        tokenizer.set_chat_template(&source);
    }
    Ok(tokenizer)
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

enum ModelKind {
    Bpe,
    WordPiece,
    Unigram,
}

fn build_model(root: &Value) -> Result<Model, LoadError> {
    let model = root
        .get("model")
        .ok_or(LoadError::Model("missing model section"))?;
    if !model.is_object() {
        return Err(LoadError::Model("model section is not an object"));
    }
    let kind = detect_model_kind(model);
    match kind {
        ModelKind::Bpe => build_bpe(root, model).map(Model::Bpe),
        ModelKind::WordPiece => build_wordpiece(model).map(Model::WordPiece),
        ModelKind::Unigram => build_unigram(model).map(Model::Unigram),
    }
}

/// Explicit `model.type` wins; otherwise the vocab container shape decides:
/// an array is Unigram, an object without merges (or with a continuation
/// prefix) is WordPiece, anything else is BPE.
fn detect_model_kind(model: &Value) -> ModelKind {
    match model.get("type").and_then(Value::as_str) {
        Some("BPE") => return ModelKind::Bpe,
        Some("WordPiece") => return ModelKind::WordPiece,
        Some("Unigram") => return ModelKind::Unigram,
        Some(other) => log::warn!("unknown model type {other:?}, auto-detecting"),
        None => {}
    }
    if model.get("vocab").map_or(false, Value::is_array) {
        return ModelKind::Unigram;
    }
    if model.get("merges").is_none() || model.get("continuing_subword_prefix").is_some() {
        return ModelKind::WordPiece;
    }
    ModelKind::Bpe
}

fn parse_vocab_object(model: &Value) -> Result<Vocabulary, LoadError> {
    let entries = model
        .get("vocab")
        .and_then(Value::as_object)
        .ok_or(LoadError::Model("vocab is not an object"))?;
    let mut vocab = Vocabulary::with_capacity(entries.len());
    for (token, id) in entries {
        match id.as_u64() {
            Some(id) => vocab.insert(token.clone(), id as u32),
            None => log::warn!("vocab entry {token:?} has a non-integer id, skipping"),
        }
    }
    Ok(vocab)
}

fn build_bpe(root: &Value, model: &Value) -> Result<BpeModel, LoadError> {
    let vocab = parse_vocab_object(model)?;

    let mut merges = MergeTable::default();
    if let Some(items) = model.get("merges").and_then(Value::as_array) {
        let mut rank = 0;
        for item in items {
            let pair = match item {
                Value::String(line) => line
                    .split_once(' ')
                    .map(|(a, b)| (a.to_string(), b.to_string())),
                Value::Array(parts) if parts.len() >= 2 => {
                    match (parts[0].as_str(), parts[1].as_str()) {
                        (Some(a), Some(b)) => Some((a.to_string(), b.to_string())),
                        _ => None,
                    }
                }
                _ => None,
            };
            let Some((left, right)) = pair else { continue };
            if let (Some(l), Some(r)) = (vocab.token_to_id(&left), vocab.token_to_id(&right)) {
                merges.insert((l, r), rank);
                rank += 1;
            }
        }
    }

    let byte_fallback = bool_field(model, "byte_fallback", false);
    let byte_level_declared = ["pre_tokenizer", "post_processor", "decoder"]
        .iter()
        .any(|&key| root.get(key).map_or(false, subtree_has_byte_level));
    let pre_tokenizer_remaps = root
        .get("pre_tokenizer")
        .map_or(false, subtree_has_byte_level);

    // When the ByteLevel pre-tokenizer already remaps the fragments, the
    // model must not remap again.
    Ok(BpeModel::new(
        vocab,
        merges,
        byte_level_declared && !pre_tokenizer_remaps,
        byte_fallback,
    ))
}

fn build_wordpiece(model: &Value) -> Result<WordPieceModel, LoadError> {
    let vocab = parse_vocab_object(model)?;
    let unk_token = model
        .get("unk_token")
        .and_then(Value::as_str)
        .unwrap_or("[UNK]");
    let unk_id = vocab.token_to_id(unk_token);
    if unk_id.is_none() {
        log::warn!("WordPiece unk token {unk_token:?} is not in the vocab");
    }
    let prefix = model
        .get("continuing_subword_prefix")
        .and_then(Value::as_str)
        .unwrap_or("##")
        .to_string();
    let max_chars = model
        .get("max_input_chars_per_word")
        .and_then(Value::as_u64)
        .unwrap_or(100) as usize;
    Ok(WordPieceModel::new(vocab, unk_id, prefix, max_chars))
}

fn build_unigram(model: &Value) -> Result<UnigramModel, LoadError> {
    let entries = model
        .get("vocab")
        .and_then(Value::as_array)
        .ok_or(LoadError::Model("Unigram vocab is not an array"))?;
    let mut vocab = Vocabulary::with_capacity(entries.len());
    let mut scores = Vec::with_capacity(entries.len());
    for (id, entry) in entries.iter().enumerate() {
        let (token, score) = match entry.as_array() {
            Some(pair) if pair.len() >= 2 => (
                pair[0].as_str().unwrap_or_default(),
                pair[1].as_f64().unwrap_or(0.0),
            ),
            _ => {
                log::warn!("Unigram vocab entry {id} is not a [token, score] pair, skipping");
                continue;
            }
        };
        vocab.insert(token, id as u32);
        scores.push(score);
    }
    let unk_id = model.get("unk_id").and_then(Value::as_u64).map(|id| id as u32);
    let byte_fallback = bool_field(model, "byte_fallback", false);
    Ok(UnigramModel::new(vocab, scores, unk_id, byte_fallback))
}

/// Whether a stage subtree declares a ByteLevel node, directly or inside a
/// Sequence of pre-tokenizers / processors / decoders.
fn subtree_has_byte_level(node: &Value) -> bool {
    if !node.is_object() {
        return false;
    }
    if node.get("type").and_then(Value::as_str) == Some("ByteLevel") {
        return true;
    }
    ["pretokenizers", "processors", "decoders"]
        .iter()
        .filter_map(|key| node.get(*key).and_then(Value::as_array))
        .flatten()
        .any(|child| child.get("type").and_then(Value::as_str) == Some("ByteLevel"))
}

// ---------------------------------------------------------------------------
// Stage builders
// ---------------------------------------------------------------------------

fn build_normalizer(node: &Value) -> Option<Normalizer> {
    let kind = node.get("type").and_then(Value::as_str)?;
    match kind {
        "Sequence" => {
            let children: Vec<Normalizer> = node
                .get("normalizers")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(build_normalizer).collect())
                .unwrap_or_default();
            Some(Normalizer::Sequence(children))
        }
        "NFKC" => Some(Normalizer::Nfkc),
        "NFKD" => Some(Normalizer::Nfkd),
        "Lowercase" => Some(Normalizer::Lowercase),
        "StripAccents" => Some(Normalizer::StripAccents),
        "Prepend" => Some(Normalizer::Prepend {
            prefix: node
                .get("prepend")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        "Replace" => {
            let pattern = parse_replace_pattern(node.get("pattern")?)?;
            Some(Normalizer::Replace {
                pattern,
                content: node
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        }
        "Precompiled" => Some(Normalizer::Precompiled),
        "BertNormalizer" => Some(Normalizer::Bert {
            clean_text: bool_field(node, "clean_text", true),
            handle_chinese_chars: bool_field(node, "handle_chinese_chars", true),
            strip_accents: node.get("strip_accents").and_then(Value::as_bool),
            lowercase: bool_field(node, "lowercase", true),
        }),
        other => {
            log::warn!("unknown normalizer type {other:?}, skipping");
            None
        }
    }
}

fn build_pre_tokenizer(node: &Value) -> Option<PreTokenizer> {
    let kind = node.get("type").and_then(Value::as_str)?;
    match kind {
        "Sequence" => {
            let children: Vec<PreTokenizer> = node
                .get("pretokenizers")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(build_pre_tokenizer).collect())
                .unwrap_or_default();
            Some(PreTokenizer::Sequence(children))
        }
        "Split" => {
            let pattern = parse_regex_pattern(node.get("pattern")?)?;
            let regex = compile_regex(&pattern)?;
            let behavior = match node.get("behavior").and_then(Value::as_str) {
                Some("Removed") => SplitBehavior::Removed,
                _ => SplitBehavior::Isolated,
            };
            Some(PreTokenizer::Split {
                regex: Box::new(regex),
                invert: bool_field(node, "invert", false),
                behavior,
            })
        }
        "ByteLevel" => {
            let split_regex = if bool_field(node, "use_regex", true) {
                compile_regex(BYTE_LEVEL_SPLIT_PATTERN).map(Box::new)
            } else {
                None
            };
            Some(PreTokenizer::ByteLevel { split_regex })
        }
        "Digits" => Some(PreTokenizer::Digits {
            individual_digits: bool_field(node, "individual_digits", false),
        }),
        "Metaspace" => Some(PreTokenizer::Metaspace {
            replacement: metaspace_replacement(node),
            add_prefix_space: bool_field(node, "add_prefix_space", true),
        }),
        "BertPreTokenizer" => Some(PreTokenizer::Bert),
        "WhitespaceSplit" => Some(PreTokenizer::WhitespaceSplit),
        other => {
            log::warn!("unknown pre-tokenizer type {other:?}, skipping");
            None
        }
    }
}

fn build_decoder(node: &Value) -> Option<Decoder> {
    let kind = node.get("type").and_then(Value::as_str)?;
    match kind {
        "Sequence" => {
            let children: Vec<Decoder> = node
                .get("decoders")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(build_decoder).collect())
                .unwrap_or_default();
            Some(Decoder::Sequence(children))
        }
        "ByteLevel" => Some(Decoder::ByteLevel),
        "ByteFallback" => Some(Decoder::ByteFallback),
        "Fuse" => Some(Decoder::Fuse),
        "Strip" => Some(Decoder::Strip {
            content: node
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            start: node.get("start").and_then(Value::as_u64).unwrap_or(0) as u32,
            stop: node.get("stop").and_then(Value::as_u64).unwrap_or(0) as u32,
        }),
        "Replace" => {
            let pattern = parse_literal_pattern(node.get("pattern")?)?;
            Some(Decoder::Replace {
                pattern,
                content: node
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        }
        "WordPiece" => Some(Decoder::WordPiece {
            prefix: node
                .get("prefix")
                .and_then(Value::as_str)
                .unwrap_or("##")
                .to_string(),
            cleanup: bool_field(node, "cleanup", true),
        }),
        "Metaspace" => Some(Decoder::Metaspace {
            replacement: metaspace_replacement(node),
            add_prefix_space: bool_field(node, "add_prefix_space", true),
        }),
        other => {
            log::warn!("unknown decoder type {other:?}, skipping");
            None
        }
    }
}

fn build_post_processor(node: &Value, model: &Model) -> Option<TemplateProcessing> {
    match node.get("type").and_then(Value::as_str) {
        Some("TemplateProcessing") => build_template(node, model),
        Some("Sequence") => node
            .get("processors")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|child| child.get("type").and_then(Value::as_str) == Some("TemplateProcessing"))
            .and_then(|child| build_template(child, model)),
        _ => None,
    }
}

fn build_template(node: &Value, model: &Model) -> Option<TemplateProcessing> {
    let single = node.get("single").and_then(Value::as_array)?;
    let mut steps = Vec::with_capacity(single.len());
    for item in single {
        if let Some(special) = item.get("SpecialToken") {
            let name = special.get("id").and_then(Value::as_str).unwrap_or_default();
            let id = model.token_to_id(name);
            if id.is_none() {
                log::warn!("template special token {name:?} does not resolve to an id");
            }
            steps.push(TemplateStep::SpecialToken(id));
        } else if item.get("Sequence").is_some() {
            steps.push(TemplateStep::Sequence);
        }
    }
    Some(TemplateProcessing::new(steps))
}

// ---------------------------------------------------------------------------
// Added tokens and overrides
// ---------------------------------------------------------------------------

fn parse_added_tokens(node: Option<&Value>) -> Vec<AddedToken> {
    let Some(items) = node.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut tokens = Vec::with_capacity(items.len());
    for item in items {
        let content = item
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let Some(id) = item.get("id").and_then(Value::as_u64) else {
            continue;
        };
        if content.is_empty() {
            continue;
        }
        tokens.push(AddedToken {
            id: id as u32,
            content: content.to_string(),
            special: bool_field(item, "special", false),
            lstrip: bool_field(item, "lstrip", false),
            rstrip: bool_field(item, "rstrip", false),
            normalized: bool_field(item, "normalized", false),
        });
    }
    tokens
}

fn apply_overrides(overrides: &Value, model: &Model, specials: &mut SpecialTokenSlots) {
    let slots: [(&str, &mut Option<u32>); 4] = [
        ("bos_token", &mut specials.bos),
        ("eos_token", &mut specials.eos),
        ("pad_token", &mut specials.pad),
        ("unk_token", &mut specials.unk),
    ];
    for (key, slot) in slots {
        if let Some(node) = overrides.get(key) {
            if let Some(content) = token_content(node) {
                *slot = model.token_to_id(content);
            }
        }
    }
}

/// A special-token override is either a bare string or `{content: string}`.
fn token_content(node: &Value) -> Option<&str> {
    node.as_str()
        .or_else(|| node.get("content").and_then(Value::as_str))
}

// ---------------------------------------------------------------------------
// Pattern helpers
// ---------------------------------------------------------------------------

/// Replace-normalizer pattern: literal string, `{String}` literal, or
/// `{Regex}` compiled.
fn parse_replace_pattern(node: &Value) -> Option<ReplacePattern> {
    if let Some(literal) = node.as_str() {
        return Some(ReplacePattern::Literal(literal.to_string()));
    }
    if let Some(literal) = node.get("String").and_then(Value::as_str) {
        return Some(ReplacePattern::Literal(literal.to_string()));
    }
    if let Some(pattern) = node.get("Regex").and_then(Value::as_str) {
        return compile_regex(pattern).map(|r| ReplacePattern::Regex(Box::new(r)));
    }
    None
}

/// Split pre-tokenizer pattern: `{Regex}` or a bare string used as a regex,
/// `{String}` escaped into a literal match.
fn parse_regex_pattern(node: &Value) -> Option<String> {
    if let Some(pattern) = node.as_str() {
        return Some(pattern.to_string());
    }
    if let Some(pattern) = node.get("Regex").and_then(Value::as_str) {
        return Some(pattern.to_string());
    }
    if let Some(literal) = node.get("String").and_then(Value::as_str) {
        return Some(regex_escape(literal));
    }
    None
}

/// Decoder replace pattern: literal only.
fn parse_literal_pattern(node: &Value) -> Option<String> {
    node.as_str()
        .or_else(|| node.get("String").and_then(Value::as_str))
        .map(str::to_string)
}

fn metaspace_replacement(node: &Value) -> String {
    node.get("replacement")
        .and_then(Value::as_str)
        .or_else(|| node.get("str_rep").and_then(Value::as_str))
        .unwrap_or("\u{2581}")
        .to_string()
}

fn compile_regex(pattern: &str) -> Option<fancy_regex::Regex> {
    match fancy_regex::Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(err) => {
            log::warn!("regex {pattern:?} failed to compile, stage is inert: {err}");
            None
        }
    }
}

/// Escape regex metacharacters so a literal pattern matches verbatim.
fn regex_escape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for ch in literal.chars() {
        if matches!(
            ch,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '^' | '$'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn bool_field(node: &Value, key: &str, default: bool) -> bool {
    node.get(key).and_then(Value::as_bool).unwrap_or(default)
}
