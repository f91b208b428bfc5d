//! Trigram similarity with a bounded memoization cache.
//!
//! [`SimilarityEngine::similarity`] scores two strings by the Dice
//! coefficient of their character-trigram sets. Inputs are truncated to
//! [`MAX_COMPARE_CHARS`] before comparison, which bounds the cost of a
//! pairwise scan over large tool outputs.
//!
//! Results are memoized under an order-independent key. The cache holds at
//! most [`DEFAULT_CAPACITY`] entries and evicts in insertion order once full.
//! Caching never changes a result: the key is built from the same truncated
//! prefixes the computation sees.
//!
//! The engine uses interior mutability so a shared reference can be handed
//! to every strategy within a pass; concurrent callers serialize on the
//! cache mutex.

use crate::context::summarizer::truncate_chars;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// Characters of each input considered for similarity.
pub const MAX_COMPARE_CHARS: usize = 2000;

/// Default number of memoized pairs.
pub const DEFAULT_CAPACITY: usize = 1000;

type PairKey = (String, String);

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<PairKey, f64>,
    /// Keys in insertion order; the front is evicted first.
    order: VecDeque<PairKey>,
    hits: u64,
    misses: u64,
}

/// Similarity scorer owning its memoization cache.
#[derive(Debug)]
pub struct SimilarityEngine {
    cache: Mutex<CacheState>,
    capacity: usize,
}

impl SimilarityEngine {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(CacheState::default()),
            capacity,
        }
    }

    /// Symmetric similarity in `[0.0, 1.0]`.
    ///
    /// Identical strings score 1.0; if either side is empty, or too short
    /// to contain a trigram, the score is 0.0.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let a = truncate_chars(a, MAX_COMPARE_CHARS);
        let b = truncate_chars(b, MAX_COMPARE_CHARS);
        let key = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };

        {
            let mut cache = self.lock();
            if let Some(&score) = cache.entries.get(&key) {
                cache.hits += 1;
                return score;
            }
            cache.misses += 1;
        }

        let score = dice_coefficient(a, b);

        let mut cache = self.lock();
        if self.capacity > 0 && !cache.entries.contains_key(&key) {
            while cache.entries.len() >= self.capacity {
                match cache.order.pop_front() {
                    Some(oldest) => {
                        cache.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            cache.order.push_back(key.clone());
            cache.entries.insert(key, score);
        }
        score
    }

    /// Drop every memoized result.
    pub fn clear(&self) {
        let mut cache = self.lock();
        cache.entries.clear();
        cache.order.clear();
    }

    /// Number of memoized pairs.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of memoized pairs.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cache hit count.
    pub fn hits(&self) -> u64 {
        self.lock().hits
    }

    /// Cache miss count.
    pub fn misses(&self) -> u64 {
        self.lock().misses
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn trigrams(s: &str) -> HashSet<[char; 3]> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(3).map(|w| [w[0], w[1], w[2]]).collect()
}

fn dice_coefficient(a: &str, b: &str) -> f64 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    (2 * shared) as f64 / (ta.len() + tb.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_and_empty() {
        let engine = SimilarityEngine::new();
        assert_eq!(engine.similarity("abc", "abc"), 1.0);
        assert_eq!(engine.similarity("", ""), 1.0);
        assert_eq!(engine.similarity("abc", ""), 0.0);
        assert_eq!(engine.similarity("", "abc"), 0.0);
    }

    #[test]
    fn too_short_for_trigrams() {
        let engine = SimilarityEngine::new();
        assert_eq!(engine.similarity("ab", "ac"), 0.0);
    }

    #[test]
    fn dice_of_known_sets() {
        // "abcd" → {abc, bcd}, "abce" → {abc, bce}: 2·1 / (2+2) = 0.5
        let engine = SimilarityEngine::new();
        assert!((engine.similarity("abcd", "abce") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn symmetric_and_cached_once() {
        let engine = SimilarityEngine::new();
        let ab = engine.similarity("hello world", "hello there");
        let ba = engine.similarity("hello there", "hello world");
        assert_eq!(ab, ba);
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.misses(), 1);
        assert_eq!(engine.hits(), 1);
    }

    #[test]
    fn cache_never_changes_result() {
        let cold = SimilarityEngine::with_capacity(0);
        let warm = SimilarityEngine::new();
        let a = "fn main() { println!(\"a\"); }";
        let b = "fn main() { println!(\"b\"); }";
        let first = warm.similarity(a, b);
        let second = warm.similarity(a, b);
        assert_eq!(first, second);
        assert_eq!(first, cold.similarity(a, b));
        assert!(cold.is_empty());
    }

    #[test]
    fn only_prefix_is_compared() {
        let engine = SimilarityEngine::new();
        let base = "x".repeat(MAX_COMPARE_CHARS);
        let a = format!("{base}AAAA");
        let b = format!("{base}BBBB");
        assert_eq!(engine.similarity(&a, &b), 1.0);
    }

    #[test]
    fn evicts_in_insertion_order() {
        let engine = SimilarityEngine::with_capacity(2);
        engine.similarity("aaaa", "aaab");
        engine.similarity("bbbb", "bbbc");
        engine.similarity("cccc", "cccd");
        assert_eq!(engine.len(), 2);

        // The first pair was evicted: looking it up again is a miss.
        let misses = engine.misses();
        engine.similarity("aaaa", "aaab");
        assert_eq!(engine.misses(), misses + 1);
        // The third pair is still cached.
        let hits = engine.hits();
        engine.similarity("cccd", "cccc");
        assert_eq!(engine.hits(), hits + 1);
    }

    #[test]
    fn clear_and_introspection() {
        let engine = SimilarityEngine::new();
        assert_eq!(engine.capacity(), DEFAULT_CAPACITY);
        engine.similarity("one two", "one three");
        assert!(!engine.is_empty());
        engine.clear();
        assert!(engine.is_empty());
    }
}
