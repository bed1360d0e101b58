//! Vocabulary and token-table types shared by every model.

use rustc_hash::FxHashMap;

/// A bijection between token strings and non-negative ids.
///
/// Built once during load. Added tokens may be inserted afterwards without
/// disturbing existing ids; everything else is read-only.
#[derive(Debug, Default, Clone)]
pub struct Vocabulary {
    token_to_id: FxHashMap<String, u32>,
    id_to_token: FxHashMap<u32, String>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            token_to_id: FxHashMap::with_capacity_and_hasher(cap, Default::default()),
            id_to_token: FxHashMap::with_capacity_and_hasher(cap, Default::default()),
        }
    }

    /// Insert a token/id pair, overwriting either direction if present.
    pub fn insert(&mut self, token: impl Into<String>, id: u32) {
        let token = token.into();
        self.token_to_id.insert(token.clone(), id);
        self.id_to_token.insert(id, token);
    }

    #[inline]
    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    #[inline]
    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(&id).map(String::as_str)
    }

    #[inline]
    pub fn contains(&self, token: &str) -> bool {
        self.token_to_id.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.token_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_to_id.is_empty()
    }

    /// Longest token length in bytes. Zero for an empty vocabulary.
    pub fn max_token_bytes(&self) -> usize {
        self.token_to_id.keys().map(|t| t.len()).max().unwrap_or(0)
    }
}

/// Ordered BPE merge ranks: `(left_id, right_id) → rank`, lower is earlier.
pub type MergeTable = FxHashMap<(u32, u32), u32>;

/// A token declared on top of the base vocabulary, matched verbatim in raw
/// input before normalization.
#[derive(Debug, Clone)]
pub struct AddedToken {
    pub id: u32,
    pub content: String,
    /// Skipped by `decode(.., skip_special_tokens = true)`.
    pub special: bool,
    /// Strip ASCII whitespace off the preceding literal.
    pub lstrip: bool,
    /// Strip ASCII whitespace off the following literal.
    pub rstrip: bool,
    /// When true the token goes through the normalizer like ordinary text
    /// instead of being matched in the raw input.
    pub normalized: bool,
}

/// The four distinguished special-token ids.
///
/// Resolved by scanning added-token contents for their canonical spellings,
/// then overridden by explicit `config_overrides` keys if present.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokenSlots {
    pub pad: Option<u32>,
    pub bos: Option<u32>,
    pub eos: Option<u32>,
    pub unk: Option<u32>,
}

impl SpecialTokenSlots {
    /// Record an added token if its content is one of the canonical spellings.
    pub fn note_added_token(&mut self, content: &str, id: u32) {
        match content {
            "[PAD]" | "<pad>" => self.pad = Some(id),
            "[BOS]" | "<s>" | "<bos>" => self.bos = Some(id),
            "[EOS]" | "</s>" | "<eos>" => self.eos = Some(id),
            "[UNK]" | "<unk>" => self.unk = Some(id),
            _ => {}
        }
    }
}
