//! Byte-pair-encoding model.
//!
//! Segments one pre-token at a time: build the initial atom sequence (bytes
//! remapped through the visible alphabet, or UTF-8 codepoints with `<0xHH>`
//! fallback), then greedily apply the lowest-ranked adjacent merge until no
//! merge applies. Results are memoized per fragment in an LRU cache, which
//! never changes the output, only the cost of repeats.

use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use rustc_hash::FxHasher;

use super::byte_level;
use super::vocab::{MergeTable, Vocabulary};

/// Default capacity of the per-model fragment cache.
const DEFAULT_CACHE_SIZE: usize = 4096;

pub struct BpeModel {
    vocab: Vocabulary,
    merges: MergeTable,
    cache: Mutex<LruCache<u64, Vec<u32>>>,
    /// Remap raw bytes through the visible alphabet before lookup. Must stay
    /// off when a ByteLevel pre-tokenizer already remapped the fragment, or
    /// the input would be mapped twice.
    use_byte_level: bool,
    /// Emit `<0xHH>` byte tokens for codepoints missing from the vocab.
    byte_fallback: bool,
}

impl BpeModel {
    pub fn new(
        vocab: Vocabulary,
        merges: MergeTable,
        use_byte_level: bool,
        byte_fallback: bool,
    ) -> Self {
        let cache_size = NonZeroUsize::new(DEFAULT_CACHE_SIZE).unwrap();
        Self {
            vocab,
            merges,
            cache: Mutex::new(LruCache::new(cache_size)),
            use_byte_level,
            byte_fallback,
        }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn vocab_mut(&mut self) -> &mut Vocabulary {
        &mut self.vocab
    }

    /// Segment one fragment into vocabulary ids.
    pub fn tokenize(&self, fragment: &str) -> Vec<u32> {
        if fragment.is_empty() {
            return Vec::new();
        }
        let hash = hash_fragment(fragment);
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(ids) = cache.get(&hash) {
                return ids.clone();
            }
        }
        let ids = self.tokenize_uncached(fragment);
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(hash, ids.clone());
        }
        ids
    }

    fn tokenize_uncached(&self, fragment: &str) -> Vec<u32> {
        let mut out = if self.use_byte_level {
            let visible = byte_level::encode_bytes(fragment.as_bytes());
            if let Some(id) = self.vocab.token_to_id(&visible) {
                return vec![id];
            }
            self.codepoint_atoms(&visible, false)
        } else {
            if let Some(id) = self.vocab.token_to_id(fragment) {
                return vec![id];
            }
            self.codepoint_atoms(fragment, self.byte_fallback)
        };
        self.merge_adjacent(&mut out);
        out
    }

    /// Initial atom sequence: one id per codepoint, with optional `<0xHH>`
    /// byte fallback on misses. Codepoints with no id contribute nothing.
    fn codepoint_atoms(&self, text: &str, byte_fallback: bool) -> Vec<u32> {
        let mut out = Vec::with_capacity(text.len());
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            let s: &str = ch.encode_utf8(&mut buf);
            if let Some(id) = self.vocab.token_to_id(s) {
                out.push(id);
            } else if byte_fallback {
                for &b in s.as_bytes() {
                    if let Some(id) = self.vocab.token_to_id(&format!("<0x{b:02X}>")) {
                        out.push(id);
                    }
                }
            }
        }
        out
    }

    /// Repeatedly merge the adjacent pair with the lowest rank (ties broken
    /// toward the lowest index) until no ranked pair remains or a merged
    /// token is missing from the vocab.
    fn merge_adjacent(&self, out: &mut Vec<u32>) {
        while out.len() > 1 {
            let mut best: Option<(usize, u32)> = None;
            for i in 0..out.len() - 1 {
                if let Some(&rank) = self.merges.get(&(out[i], out[i + 1])) {
                    if best.map_or(true, |(_, r)| rank < r) {
                        best = Some((i, rank));
                    }
                }
            }
            let Some((i, _)) = best else { break };
            let merged = match (self.vocab.id_to_token(out[i]), self.vocab.id_to_token(out[i + 1])) {
                (Some(left), Some(right)) => format!("{left}{right}"),
                _ => break,
            };
            let Some(id) = self.vocab.token_to_id(&merged) else {
                break;
            };
            out[i] = id;
            out.remove(i + 1);
        }
    }
}

fn hash_fragment(fragment: &str) -> u64 {
    let mut hasher = FxHasher::default();
    fragment.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_model(byte_fallback: bool) -> BpeModel {
        let mut vocab = Vocabulary::new();
        for (i, t) in ["l", "o", "w", "lo", "low"].iter().enumerate() {
            vocab.insert(*t, i as u32);
        }
        let mut merges = MergeTable::default();
        merges.insert((0, 1), 0); // l + o -> lo
        merges.insert((3, 2), 1); // lo + w -> low
        BpeModel::new(vocab, merges, false, byte_fallback)
    }

    #[test]
    fn merges_follow_rank_order() {
        let model = small_model(false);
        assert_eq!(model.tokenize("low"), vec![4]);
        assert_eq!(model.tokenize("lol"), vec![3, 0]);
    }

    #[test]
    fn whole_fragment_hit_short_circuits() {
        let model = small_model(false);
        assert_eq!(model.tokenize("lo"), vec![3]);
    }

    #[test]
    fn unknown_codepoints_are_dropped_without_fallback() {
        let model = small_model(false);
        assert_eq!(model.tokenize("lqo"), vec![3]); // q vanishes, l+o merge
    }

    #[test]
    fn byte_fallback_emits_hex_tokens() {
        let mut vocab = Vocabulary::new();
        vocab.insert("a", 0);
        vocab.insert("<0xC3>", 1);
        vocab.insert("<0xA9>", 2);
        let model = BpeModel::new(vocab, MergeTable::default(), false, true);
        // é is C3 A9 in UTF-8
        assert_eq!(model.tokenize("aé"), vec![0, 1, 2]);
    }

    #[test]
    fn byte_level_remaps_before_lookup() {
        let mut vocab = Vocabulary::new();
        vocab.insert("Ġ", 0); // visible form of 0x20
        vocab.insert("h", 1);
        vocab.insert("i", 2);
        vocab.insert("Ġhi", 3);
        let mut merges = MergeTable::default();
        merges.insert((0, 1), 0);
        merges.insert((4, 2), 1);
        vocab.insert("Ġh", 4);
        let model = BpeModel::new(vocab, merges, true, false);
        assert_eq!(model.tokenize(" hi"), vec![3]);
    }

    #[test]
    fn repeated_inputs_are_deterministic() {
        let model = small_model(false);
        let first = model.tokenize("lowlow");
        for _ in 0..3 {
            assert_eq!(model.tokenize("lowlow"), first);
        }
    }

    #[test]
    fn tie_on_rank_prefers_lowest_index() {
        let mut vocab = Vocabulary::new();
        vocab.insert("a", 0);
        vocab.insert("aa", 1);
        let mut merges = MergeTable::default();
        merges.insert((0, 0), 0);
        let model = BpeModel::new(vocab, merges, false, false);
        // aaa: (0,1) and (1,2) both rank 0; leftmost merges first -> [aa, a]
        assert_eq!(model.tokenize("aaa"), vec![1, 0]);
    }

    #[test]
    fn stops_when_merged_token_missing() {
        let mut vocab = Vocabulary::new();
        vocab.insert("x", 0);
        vocab.insert("y", 1);
        let mut merges = MergeTable::default();
        merges.insert((0, 1), 0); // "xy" is ranked but absent from the vocab
        let model = BpeModel::new(vocab, merges, false, false);
        assert_eq!(model.tokenize("xy"), vec![0, 1]);
    }
}
