//! Cosine scoring and top-K ranking over stored embeddings.

use crate::model::{Message, SearchResult};
use log::{debug, warn};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Cosine similarity of two vectors, accumulated in `f64`.
///
/// Returns 0 for vectors of different length and for any zero-magnitude
/// vector (including empty ones).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Candidate held in the top-K heap. Greater means better: higher score,
/// then earlier scan position.
struct Ranked {
    score: f64,
    position: usize,
    message: Message,
}

impl Ranked {
    /// NaN never outranks a real score.
    fn key(&self) -> f64 {
        if self.score.is_nan() {
            f64::NEG_INFINITY
        } else {
            self.score
        }
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key()
            .total_cmp(&other.key())
            .then_with(|| other.position.cmp(&self.position))
    }
}

/// Score every candidate against `query` and keep the best `limit`, ordered
/// by descending similarity. Exact ties keep the candidates' scan order.
pub fn rank<I>(query: &[f32], candidates: I, limit: usize) -> Vec<SearchResult>
where
    I: IntoIterator<Item = Message>,
{
    if limit == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(limit + 1);
    let mut scanned = 0usize;
    let mut mismatched = 0usize;
    for (position, message) in candidates.into_iter().enumerate() {
        scanned += 1;
        let embedding = message.embedding.as_deref().unwrap_or_default();
        if embedding.len() != query.len() {
            mismatched += 1;
        }
        let score = cosine_similarity(query, embedding);
        heap.push(Reverse(Ranked {
            score,
            position,
            message,
        }));
        if heap.len() > limit {
            heap.pop();
        }
    }
    if mismatched > 0 {
        warn!(
            "embedding dimension mismatch scored as zero (query_dim={}, mismatched={}, scanned={})",
            query.len(),
            mismatched,
            scanned
        );
    }
    debug!(
        "ranked candidates (scanned={}, returned={})",
        scanned,
        heap.len()
    );
    heap.into_sorted_vec()
        .into_iter()
        .map(|Reverse(ranked)| SearchResult {
            message: ranked.message,
            similarity: ranked.score,
        })
        .collect()
}
