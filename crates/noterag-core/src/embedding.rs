//! Embedding trait, the deterministic local embedder, and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement.
//! Network-backed providers (OpenAI, Ollama) live in the `noterag` app
//! crate; [`HashEmbedder`] lives here because it is pure computation.
//!
//! One store must only ever hold vectors from one embedder: cosine
//! distances between vectors from different embedding spaces are
//! meaningless.

use anyhow::Result;
use async_trait::async_trait;

use crate::ids::rolling_hash;

/// Default vector dimensionality, compatible with OpenAI's
/// `text-embedding-3-small` / `ada-002`.
pub const DEFAULT_DIMS: usize = 1536;

/// Maps texts to fixed-dimension, L2-normalized vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts. The output has the same length and order as
    /// `texts`.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }
}

// ============ Deterministic local embedder ============

/// Offline pseudo-embedding built from the text's own characters.
///
/// Identical text always yields an identical vector and no network access
/// is needed, but the geometry is lexical, not semantic. Suitable for
/// offline or degraded operation and for tests.
///
/// Layout for dimension `D`:
///
/// | Slots | Feature |
/// |-------|---------|
/// | `0` | `tanh(len / 1000)` |
/// | `1..10` | relative frequency of `a`..`i` |
/// | `10..100` | `tanh(hash(word) / 1e9)` over the first 90 words (cycled) |
/// | `100..D` | `tanh(hash(window) / i32::MAX)` over a 10-char sliding window |
///
/// Slots beyond `D` are simply not written, so small dimensions work.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

const WORD_SLOTS: usize = 90;
const WORD_OFFSET: usize = 10;
const WINDOW_OFFSET: usize = 100;
const WINDOW_LEN: usize = 10;

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    /// Compute the embedding for one text.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dims];
        let chars: Vec<char> = text.chars().collect();
        let mut set = |slot: usize, value: f64| {
            if let Some(v) = embedding.get_mut(slot) {
                *v = value as f32;
            }
        };

        set(0, (chars.len() as f64 / 1000.0).tanh());

        for (offset, letter) in ('a'..='i').enumerate() {
            let freq = if chars.is_empty() {
                0.0
            } else {
                chars.iter().filter(|&&c| c == letter).count() as f64 / chars.len() as f64
            };
            set(offset + 1, freq);
        }

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();
        for i in 0..WORD_SLOTS {
            let word = if words.is_empty() {
                ""
            } else {
                words[i % words.len()]
            };
            let hash = rolling_hash(word) as f64;
            set(i + WORD_OFFSET, (hash / 1_000_000_000.0).tanh());
        }

        for slot in WINDOW_OFFSET..self.dims {
            let hash = window_hash(&chars, slot);
            set(slot, (hash as f64 / i32::MAX as f64).tanh());
        }

        normalize(&mut embedding);
        embedding
    }
}

/// Hash of the 10-char window starting at `(slot - 100) % len`, salted
/// with the slot index so repeated windows still spread across slots.
fn window_hash(chars: &[char], slot: usize) -> i32 {
    if chars.is_empty() {
        return 0;
    }
    let start = (slot - WINDOW_OFFSET) % chars.len();
    let end = (start + WINDOW_LEN).min(chars.len());
    chars[start..end].iter().fold(0i32, |hash, &c| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(c as i32)
            .wrapping_add(slot as i32)
    })
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "local-hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

// ============ Vector utilities ============

/// Scale `v` to unit length in place. A zero vector is left untouched.
pub fn normalize(v: &mut [f32]) {
    let magnitude = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= magnitude;
        }
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use noterag_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, zero
/// vectors, or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance `1 - cos`, clamped to `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    (1.0 - cosine_similarity(a, b)).clamp(0.0, 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn magnitude(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_hash_embedder_deterministic() {
        let e = HashEmbedder::new(DEFAULT_DIMS);
        let a = e.embed_text("Quarterly planning meeting notes");
        let b = e.embed_text("Quarterly planning meeting notes");
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_embedder_dims_and_norm() {
        let e = HashEmbedder::new(DEFAULT_DIMS);
        let v = e.embed_text("The quick brown fox jumps over the lazy dog.");
        assert_eq!(v.len(), DEFAULT_DIMS);
        assert!((magnitude(&v) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_hash_embedder_distinguishes_texts() {
        let e = HashEmbedder::new(DEFAULT_DIMS);
        let a = e.embed_text("budget review for the marketing team");
        let b = e.embed_text("recipe for sourdough bread");
        assert!(cosine_similarity(&a, &b) < 0.999);
    }

    #[test]
    fn test_hash_embedder_empty_text() {
        let e = HashEmbedder::new(DEFAULT_DIMS);
        let v = e.embed_text("");
        assert_eq!(v.len(), DEFAULT_DIMS);
        assert!(v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_hash_embedder_small_dims() {
        let e = HashEmbedder::new(8);
        let v = e.embed_text("abc");
        assert_eq!(v.len(), 8);
        assert!((magnitude(&v) - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let e = HashEmbedder::new(64);
        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let vectors = e.embed(&texts).await.unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[1], e.embed_text("two"));
        assert_eq!(e.embed_one("three").await.unwrap(), vectors[2]);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let mut v = vec![0.0f32; 4];
        normalize(&mut v);
        assert_eq!(v, vec![0.0; 4]);
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_distance(&v, &v) < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
