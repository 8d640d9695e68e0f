//! Maximal Marginal Relevance re-ranking.
//!
//! Greedy selection balancing relevance and diversity:
//! `MMR(c) = lambda * score(c) - (1 - lambda) * max_sim(c, selected)`.
//! `lambda = 1.0` produces pure relevance ranking; `lambda = 0.0`
//! maximises diversity among selected results.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::numeric;
use crate::types::Chunk;

/// Configuration for MMR re-ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MmrConfig {
    /// Relevance vs diversity trade-off in [0, 1].
    pub lambda: f64,
    /// Number of chunks to select.
    pub target_k: usize,
}

impl Default for MmrConfig {
    fn default() -> Self {
        Self {
            lambda: 0.5,
            target_k: 8,
        }
    }
}

/// MMR re-ranker.
#[derive(Debug, Clone)]
pub struct MmrReranker {
    cfg: MmrConfig,
}

impl MmrReranker {
    /// Create a re-ranker, clamping lambda to [0, 1] and defaulting a zero
    /// target to 8.
    pub fn new(mut cfg: MmrConfig) -> Self {
        cfg.lambda = cfg.lambda.clamp(0.0, 1.0);
        if cfg.target_k == 0 {
            cfg.target_k = 8;
        }
        Self { cfg }
    }

    /// Current configuration.
    pub fn config(&self) -> &MmrConfig {
        &self.cfg
    }

    /// Select at most `target_k` chunks, in greedy-selection order.
    ///
    /// Inputs no longer than `target_k` are returned unchanged. Ties are
    /// broken by smallest original index.
    pub fn rerank(&self, chunks: &[Chunk]) -> Vec<Chunk> {
        if chunks.is_empty() {
            return Vec::new();
        }
        if chunks.len() <= self.cfg.target_k {
            return chunks.to_vec();
        }

        let scores = normalize_scores(chunks);
        let similarity = similarity_matrix(chunks);

        let n = chunks.len();
        let mut selected: Vec<usize> = Vec::with_capacity(self.cfg.target_k);
        let mut remaining = vec![true; n];

        while selected.len() < self.cfg.target_k {
            let mut best: Option<(usize, f64)> = None;
            for idx in 0..n {
                if !remaining[idx] {
                    continue;
                }
                let value = self.mmr_score(idx, &selected, &scores, &similarity);
                if best.map_or(true, |(_, b)| value > b) {
                    best = Some((idx, value));
                }
            }

            let Some((idx, _)) = best else {
                break;
            };
            selected.push(idx);
            remaining[idx] = false;
        }

        selected.iter().map(|&idx| chunks[idx].clone()).collect()
    }

    /// Re-rank using query similarity as the relevance signal.
    ///
    /// Useful when chunk scores are unavailable or unreliable. Chunks are
    /// cloned with their score replaced; the caller's slice is untouched.
    pub fn rerank_with_query(&self, chunks: &[Chunk], query_embedding: &[f32]) -> Vec<Chunk> {
        if chunks.is_empty() || query_embedding.is_empty() {
            return chunks.to_vec();
        }

        let rescored: Vec<Chunk> = chunks
            .iter()
            .map(|chunk| {
                let mut chunk = chunk.clone();
                chunk.score = numeric::cosine_similarity(&chunk.embedding, query_embedding) as f32;
                chunk
            })
            .collect();

        self.rerank(&rescored)
    }

    /// `lambda * relevance - (1 - lambda) * max_sim`, where the max over an
    /// empty selected set is 0.
    fn mmr_score(
        &self,
        candidate: usize,
        selected: &[usize],
        scores: &[f64],
        similarity: &[Vec<f64>],
    ) -> f64 {
        let relevance = scores[candidate];

        let mut max_sim = 0.0f64;
        for &idx in selected {
            if similarity[candidate][idx] > max_sim {
                max_sim = similarity[candidate][idx];
            }
        }

        self.cfg.lambda * relevance - (1.0 - self.cfg.lambda) * max_sim
    }
}

/// Min-max normalize chunk scores to [0, 1]; all-equal scores become 1.0.
fn normalize_scores(chunks: &[Chunk]) -> Vec<f64> {
    let mut min = f64::from(chunks[0].score);
    let mut max = min;
    for chunk in &chunks[1..] {
        let score = f64::from(chunk.score);
        if score < min {
            min = score;
        }
        if score > max {
            max = score;
        }
    }

    let range = max - min;
    if range == 0.0 {
        return vec![1.0; chunks.len()];
    }
    chunks
        .iter()
        .map(|c| (f64::from(c.score) - min) / range)
        .collect()
}

/// Symmetric cosine-similarity matrix with unit diagonal.
///
/// Pairs with a missing embedding get similarity 0.0. Rows are sharded over
/// the rayon pool and mirrored, preserving symmetry and the diagonal exactly.
fn similarity_matrix(chunks: &[Chunk]) -> Vec<Vec<f64>> {
    let n = chunks.len();
    let mut matrix: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut row = vec![0.0f64; n];
            row[i] = 1.0;
            for (j, other) in chunks.iter().enumerate().skip(i + 1) {
                row[j] = if chunks[i].embedding.is_empty() || other.embedding.is_empty() {
                    0.0
                } else {
                    1.0 - numeric::cosine_distance(&chunks[i].embedding, &other.embedding)
                };
            }
            row
        })
        .collect();

    for i in 0..n {
        for j in (i + 1)..n {
            matrix[j][i] = matrix[i][j];
        }
    }

    matrix
}

/// One-shot MMR re-ranking.
pub fn mmr_rerank(chunks: &[Chunk], lambda: f64, target_k: usize) -> Vec<Chunk> {
    MmrReranker::new(MmrConfig { lambda, target_k }).rerank(chunks)
}

/// Mean pairwise cosine distance of a selection; 0 for fewer than 2 chunks.
///
/// Higher values indicate a more diverse selection.
pub fn diversity_score(chunks: &[Chunk]) -> f64 {
    if chunks.len() < 2 {
        return 0.0;
    }

    let mut total = 0.0f64;
    let mut pairs = 0usize;
    for i in 0..chunks.len() - 1 {
        for j in (i + 1)..chunks.len() {
            total += numeric::cosine_distance(&chunks[i].embedding, &chunks[j].embedding);
            pairs += 1;
        }
    }

    total / pairs as f64
}

/// Mean over the original chunks of the minimum cosine distance to any
/// selected chunk. Lower means the selection covers the original set better.
pub fn coverage_score(selected: &[Chunk], original: &[Chunk]) -> f64 {
    if selected.is_empty() || original.is_empty() {
        return 0.0;
    }

    let mut total = 0.0f64;
    for chunk in original {
        let mut min_dist = 2.0f64;
        for candidate in selected {
            let dist = numeric::cosine_distance(&chunk.embedding, &candidate.embedding);
            if dist < min_dist {
                min_dist = dist;
            }
        }
        total += min_dist;
    }

    total / original.len() as f64
}
