//! Agglomerative clustering over chunk embeddings.
//!
//! Builds the full pairwise cosine-distance matrix, then greedily merges the
//! closest pair of clusters under the configured linkage until the best
//! pair's distance exceeds the threshold. O(N^2) memory, acceptable because
//! the input is an over-fetched candidate set (N typically <= 200).

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::numeric;
use crate::types::{Chunk, Cluster, ClusterResult};

/// How inter-cluster distance is reduced from member-pair distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Minimum pair distance. Merges chains aggressively.
    Single,
    /// Maximum pair distance. Keeps clusters compact.
    Complete,
    /// Mean over all cross-cluster pairs.
    #[default]
    Average,
}

/// Configuration for agglomerative clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Maximum cosine distance for merging clusters, in (0, 2].
    /// Lower values demand near-identical chunks before collapsing them.
    pub threshold: f64,
    /// Linkage used for inter-cluster distance.
    #[serde(default)]
    pub linkage: Linkage,
    /// Stop merging once this many active clusters remain (0 disables).
    #[serde(default)]
    pub min_clusters: usize,
    /// Stop after a merge leaves this many clusters (0 disables).
    #[serde(default)]
    pub max_clusters: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            threshold: 0.15,
            linkage: Linkage::Average,
            min_clusters: 0,
            max_clusters: 0,
        }
    }
}

impl ClusterConfig {
    /// Create config with a custom threshold.
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            ..Default::default()
        }
    }

    /// Strict duplicate definition (fewer merges).
    pub fn strict() -> Self {
        Self::with_threshold(0.10)
    }

    /// Loose duplicate definition (more merges).
    pub fn lenient() -> Self {
        Self::with_threshold(0.25)
    }
}

/// One active group during merging: member indices into the input slice
/// plus the running centroid.
struct ClusterNode {
    members: Vec<usize>,
    centroid: Vec<f32>,
    active: bool,
}

/// Agglomerative clusterer. Pure: no I/O, no shared mutation.
#[derive(Debug, Clone)]
pub struct Clusterer {
    cfg: ClusterConfig,
}

impl Clusterer {
    /// Create a clusterer, normalizing out-of-range configuration.
    pub fn new(mut cfg: ClusterConfig) -> Self {
        if !(cfg.threshold > 0.0 && cfg.threshold <= 2.0) {
            cfg.threshold = 0.15;
        }
        Self { cfg }
    }

    /// Current configuration.
    pub fn config(&self) -> &ClusterConfig {
        &self.cfg
    }

    /// Cluster the given chunks.
    ///
    /// Chunks are cloned into the result with their `cluster_id` assigned;
    /// the caller's slice is never mutated. Cannot fail: empty input,
    /// missing embeddings, and degenerate vectors all yield well-defined
    /// results.
    pub fn cluster(&self, chunks: &[Chunk]) -> ClusterResult {
        let start = Instant::now();
        let n = chunks.len();

        if n == 0 {
            return ClusterResult {
                latency: start.elapsed(),
                ..Default::default()
            };
        }

        if n == 1 {
            let mut member = chunks[0].clone();
            member.cluster_id = 0;
            let centroid = member.embedding.clone();
            return ClusterResult {
                clusters: vec![Cluster {
                    id: 0,
                    members: vec![member],
                    centroid,
                    representative: None,
                }],
                representatives: Vec::new(),
                input_count: 1,
                cluster_count: 1,
                latency: start.elapsed(),
            };
        }

        // Without any embeddings there is nothing to compare: every chunk
        // becomes its own cluster in input order.
        if chunks.iter().all(|c| c.embedding.is_empty()) {
            let clusters = chunks
                .iter()
                .enumerate()
                .map(|(i, chunk)| {
                    let mut member = chunk.clone();
                    member.cluster_id = i as i32;
                    Cluster {
                        id: i,
                        members: vec![member],
                        centroid: Vec::new(),
                        representative: None,
                    }
                })
                .collect();
            return ClusterResult {
                clusters,
                representatives: Vec::new(),
                input_count: n,
                cluster_count: n,
                latency: start.elapsed(),
            };
        }

        let mut nodes: Vec<ClusterNode> = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| ClusterNode {
                members: vec![i],
                centroid: chunk.embedding.clone(),
                active: true,
            })
            .collect();

        let matrix = distance_matrix(chunks);
        let mut active_count = n;

        while active_count > 1 {
            if self.cfg.min_clusters > 0 && active_count <= self.cfg.min_clusters {
                break;
            }

            // Closest active pair; strict < keeps the first minimal pair,
            // so ties resolve to smallest i, then smallest j.
            let mut min_dist = 2.0f64;
            let mut best: Option<(usize, usize)> = None;
            for i in 0..n {
                if !nodes[i].active {
                    continue;
                }
                for j in (i + 1)..n {
                    if !nodes[j].active {
                        continue;
                    }
                    let dist = self.linkage_distance(&nodes[i], &nodes[j], &matrix);
                    if dist < min_dist {
                        min_dist = dist;
                        best = Some((i, j));
                    }
                }
            }

            let Some((i, j)) = best else {
                break;
            };
            if min_dist > self.cfg.threshold {
                break;
            }

            // Merge j into i; i survives.
            let absorbed = std::mem::take(&mut nodes[j].members);
            nodes[j].active = false;
            nodes[i].members.extend(absorbed);
            let centroid = recompute_centroid(&nodes[i].members, chunks);
            nodes[i].centroid = centroid;
            active_count -= 1;

            if self.cfg.max_clusters > 0 && active_count <= self.cfg.max_clusters {
                break;
            }
        }

        // A node's own index is always its smallest member, so iterating
        // in index order renumbers clusters by earliest member position.
        let mut clusters = Vec::with_capacity(active_count);
        for node in nodes.iter().filter(|node| node.active) {
            let cluster_id = clusters.len();
            let members = node
                .members
                .iter()
                .map(|&idx| {
                    let mut member = chunks[idx].clone();
                    member.cluster_id = cluster_id as i32;
                    member
                })
                .collect();
            clusters.push(Cluster {
                id: cluster_id,
                members,
                centroid: node.centroid.clone(),
                representative: None,
            });
        }

        let cluster_count = clusters.len();
        ClusterResult {
            clusters,
            representatives: Vec::new(),
            input_count: n,
            cluster_count,
            latency: start.elapsed(),
        }
    }

    /// Inter-cluster distance under the configured linkage, over raw
    /// chunk-pair distances from the matrix.
    fn linkage_distance(&self, a: &ClusterNode, b: &ClusterNode, matrix: &[Vec<f64>]) -> f64 {
        match self.cfg.linkage {
            Linkage::Single => {
                let mut min = 2.0f64;
                for &i in &a.members {
                    for &j in &b.members {
                        if matrix[i][j] < min {
                            min = matrix[i][j];
                        }
                    }
                }
                min
            }
            Linkage::Complete => {
                let mut max = 0.0f64;
                for &i in &a.members {
                    for &j in &b.members {
                        if matrix[i][j] > max {
                            max = matrix[i][j];
                        }
                    }
                }
                max
            }
            Linkage::Average => {
                let mut sum = 0.0f64;
                let mut count = 0usize;
                for &i in &a.members {
                    for &j in &b.members {
                        sum += matrix[i][j];
                        count += 1;
                    }
                }
                if count == 0 {
                    2.0
                } else {
                    sum / count as f64
                }
            }
        }
    }
}

/// Full recomputation of a cluster centroid in member order.
///
/// Recomputing from scratch instead of updating incrementally absorbs any
/// accumulated numerical drift. Members without embeddings are skipped.
fn recompute_centroid(members: &[usize], chunks: &[Chunk]) -> Vec<f32> {
    let embedded: Vec<&[f32]> = members
        .iter()
        .map(|&idx| chunks[idx].embedding.as_slice())
        .filter(|e| !e.is_empty())
        .collect();

    let Some(first) = embedded.first() else {
        return Vec::new();
    };

    let mut centroid = vec![0.0f32; first.len()];
    numeric::mean_vector(&mut centroid, &embedded);
    centroid
}

/// Symmetric pairwise cosine-distance matrix.
///
/// Upper-triangle rows are computed independently (sharded over the rayon
/// pool) and mirrored afterwards, so every entry is computed exactly once
/// and the result is identical regardless of worker scheduling. Pairs with
/// a missing embedding get the maximum distance 2.0.
fn distance_matrix(chunks: &[Chunk]) -> Vec<Vec<f64>> {
    let n = chunks.len();
    let mut matrix: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut row = vec![0.0f64; n];
            for (j, other) in chunks.iter().enumerate().skip(i + 1) {
                row[j] = if chunks[i].embedding.is_empty() || other.embedding.is_empty() {
                    2.0
                } else {
                    numeric::cosine_distance(&chunks[i].embedding, &other.embedding)
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

/// One-shot clustering with the default config and a custom threshold.
pub fn cluster_by_threshold(chunks: &[Chunk], threshold: f64) -> ClusterResult {
    Clusterer::new(ClusterConfig::with_threshold(threshold)).cluster(chunks)
}

/// Sort clusters by member count (descending).
pub fn sort_clusters_by_size(clusters: &mut [Cluster]) {
    clusters.sort_by(|a, b| b.size().cmp(&a.size()));
}

/// Sort clusters by highest member score (descending).
pub fn sort_clusters_by_max_score(clusters: &mut [Cluster]) {
    use ordered_float::OrderedFloat;

    fn max_score(cluster: &Cluster) -> OrderedFloat<f32> {
        cluster
            .members
            .iter()
            .map(|c| OrderedFloat(c.score))
            .max()
            .unwrap_or(OrderedFloat(0.0))
    }

    clusters.sort_by(|a, b| max_score(b).cmp(&max_score(a)));
}
