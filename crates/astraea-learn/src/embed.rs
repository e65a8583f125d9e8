//! The built-in sentence embedder.
//!
//! A deterministic feature-hashing embedder over word tokens and character
//! trigrams, L2-normalised. No model download, no external API: retrieval
//! quality comes from lexical overlap between mapping descriptions, which
//! is exactly what same-domain mapping prose exhibits. Embedding text is
//! natural-language prose, never serialised objects.

use std::hash::{DefaultHasher, Hash, Hasher};

/// Embedding dimensionality.
pub const EMBED_DIM: usize = 256;

/// Embed prose into a fixed-size normalised vector.
pub fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBED_DIM];
    let lowered = text.to_lowercase();

    for token in lowered.split(|c: char| !c.is_ascii_alphanumeric()) {
        if token.is_empty() {
            continue;
        }
        bump(&mut vector, b"tok", token.as_bytes());
        let bytes = token.as_bytes();
        if bytes.len() > 3 {
            for trigram in bytes.windows(3) {
                bump(&mut vector, b"tri", trigram);
            }
        }
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

fn bump(vector: &mut [f32], namespace: &[u8], feature: &[u8]) {
    let mut hasher = DefaultHasher::new();
    namespace.hash(&mut hasher);
    feature.hash(&mut hasher);
    let hash = hasher.finish();
    let slot = (hash % EMBED_DIM as u64) as usize;
    // Sign bit decorrelates colliding features.
    let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
    vector[slot] += sign;
}

/// Cosine similarity between two embeddings.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Serialise an embedding to little-endian bytes for BLOB storage.
pub fn to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Deserialise an embedding from BLOB bytes.
pub fn from_blob(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_is_deterministic_and_normalised() {
        let a = embed("SDTM domain AE variable AESEV. Mapping pattern LOOKUP_RECODE.");
        let b = embed("SDTM domain AE variable AESEV. Mapping pattern LOOKUP_RECODE.");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn similar_prose_scores_higher_than_unrelated() {
        let query = embed("SDTM domain AE adverse event severity mapping");
        let related = embed("SDTM domain AE variable AESEV severity lookup recode");
        let unrelated = embed("laboratory hemoglobin result in grams per deciliter");
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[test]
    fn blob_round_trip() {
        let original = embed("round trip");
        let restored = from_blob(&to_blob(&original));
        assert_eq!(original, restored);
    }
}
