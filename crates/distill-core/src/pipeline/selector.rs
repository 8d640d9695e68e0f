//! Representative selection: one chunk kept per cluster.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::numeric;
use crate::types::{Chunk, Cluster, ClusterResult};

/// How the representative chunk is picked from a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStrategy {
    /// Highest retrieval score. Preserves relevance ranking.
    #[default]
    Score,
    /// Closest to the cluster centroid. Picks the most typical chunk.
    Centroid,
    /// Longest text. Useful when longer chunks carry more information.
    Length,
    /// Weighted combination of score, centroid proximity and length.
    Hybrid,
}

/// Configuration for representative selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Selection method.
    #[serde(default)]
    pub strategy: SelectionStrategy,
    /// Weight for score in hybrid selection.
    pub score_weight: f64,
    /// Weight for centroid proximity in hybrid selection.
    pub centroid_weight: f64,
    /// Weight for text length in hybrid selection.
    pub length_weight: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::Score,
            score_weight: 0.7,
            centroid_weight: 0.3,
            length_weight: 0.0,
        }
    }
}

impl SelectorConfig {
    /// Create config for the given strategy with default hybrid weights.
    pub fn with_strategy(strategy: SelectionStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }
}

/// Picks representative chunks from clusters.
#[derive(Debug, Clone)]
pub struct Selector {
    cfg: SelectorConfig,
}

impl Selector {
    /// Create a new selector with the given config.
    pub fn new(cfg: SelectorConfig) -> Self {
        Self { cfg }
    }

    /// Current configuration.
    pub fn config(&self) -> &SelectorConfig {
        &self.cfg
    }

    /// Pick representatives from all clusters, in cluster-id order.
    ///
    /// Writes the representative back into each cluster and into the
    /// result's representative list.
    pub fn select(&self, result: &mut ClusterResult) -> Vec<Chunk> {
        let mut representatives = Vec::with_capacity(result.clusters.len());

        for cluster in &mut result.clusters {
            if let Some(rep) = self.select_from_cluster(cluster) {
                cluster.representative = Some(rep.clone());
                representatives.push(rep);
            }
        }

        result.representatives = representatives.clone();
        representatives
    }

    /// Pick a single representative from a cluster.
    ///
    /// Single-member clusters return the sole member without consulting the
    /// strategy. All tie-breaks favor the first occurrence in `members`.
    pub fn select_from_cluster(&self, cluster: &Cluster) -> Option<Chunk> {
        if cluster.members.is_empty() {
            return None;
        }
        if cluster.members.len() == 1 {
            return Some(cluster.members[0].clone());
        }

        let idx = match self.cfg.strategy {
            SelectionStrategy::Score => by_score(cluster),
            SelectionStrategy::Centroid => self.by_centroid(cluster),
            SelectionStrategy::Length => by_length(cluster),
            SelectionStrategy::Hybrid => self.by_hybrid(cluster),
        };
        Some(cluster.members[idx].clone())
    }

    fn by_centroid(&self, cluster: &Cluster) -> usize {
        if cluster.centroid.is_empty() {
            return by_score(cluster);
        }

        let mut best = 0;
        let mut best_dist = numeric::cosine_distance(&cluster.members[0].embedding, &cluster.centroid);
        for (i, member) in cluster.members.iter().enumerate().skip(1) {
            let dist = numeric::cosine_distance(&member.embedding, &cluster.centroid);
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        best
    }

    fn by_hybrid(&self, cluster: &Cluster) -> usize {
        if cluster.centroid.is_empty() {
            return by_score(cluster);
        }

        let total = self.cfg.score_weight + self.cfg.centroid_weight + self.cfg.length_weight;
        if total == 0.0 {
            return by_score(cluster);
        }
        let score_w = self.cfg.score_weight / total;
        let centroid_w = self.cfg.centroid_weight / total;
        let length_w = self.cfg.length_weight / total;

        let scores: Vec<f64> = cluster.members.iter().map(|m| f64::from(m.score)).collect();
        let distances: Vec<f64> = cluster
            .members
            .iter()
            .map(|m| numeric::cosine_distance(&m.embedding, &cluster.centroid))
            .collect();
        let lengths: Vec<f64> = cluster.members.iter().map(|m| m.text.len() as f64).collect();

        let (min_score, max_score) = min_max(&scores);
        let (min_dist, max_dist) = min_max(&distances);
        let (min_len, max_len) = min_max(&lengths);

        let mut best = 0;
        let mut best_value = f64::NEG_INFINITY;
        for i in 0..cluster.members.len() {
            // Min-max normalize each component; a zero range contributes
            // its weight in full. Centroid proximity is inverted so that
            // smaller distance scores higher.
            let mut value = 0.0;
            value += if max_score > min_score {
                score_w * (scores[i] - min_score) / (max_score - min_score)
            } else {
                score_w
            };
            value += if max_dist > min_dist {
                centroid_w * (1.0 - (distances[i] - min_dist) / (max_dist - min_dist))
            } else {
                centroid_w
            };
            value += if max_len > min_len {
                length_w * (lengths[i] - min_len) / (max_len - min_len)
            } else {
                length_w
            };

            if value > best_value {
                best_value = value;
                best = i;
            }
        }
        best
    }
}

fn by_score(cluster: &Cluster) -> usize {
    let mut best = 0;
    for (i, member) in cluster.members.iter().enumerate().skip(1) {
        if member.score > cluster.members[best].score {
            best = i;
        }
    }
    best
}

fn by_length(cluster: &Cluster) -> usize {
    let mut best = 0;
    for (i, member) in cluster.members.iter().enumerate().skip(1) {
        if member.text.len() > cluster.members[best].text.len() {
            best = i;
        }
    }
    best
}

fn min_max(values: &[f64]) -> (f64, f64) {
    let mut min = values[0];
    let mut max = values[0];
    for &v in &values[1..] {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    (min, max)
}

/// Select representatives, then keep the top `k` by descending score.
///
/// The sort is stable, so equal scores preserve cluster order.
pub fn select_top_k(result: &mut ClusterResult, k: usize, strategy: SelectionStrategy) -> Vec<Chunk> {
    let selector = Selector::new(SelectorConfig::with_strategy(strategy));
    let mut representatives = selector.select(result);

    if representatives.len() <= k {
        return representatives;
    }

    representatives.sort_by(|a, b| OrderedFloat(b.score).cmp(&OrderedFloat(a.score)));
    representatives.truncate(k);
    representatives
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_of(members: Vec<Chunk>, centroid: Vec<f32>) -> Cluster {
        Cluster {
            id: 0,
            members,
            centroid,
            representative: None,
        }
    }

    fn chunk(id: &str, text: &str, embedding: Vec<f32>, score: f32) -> Chunk {
        Chunk::new(id, text, embedding, score)
    }

    #[test]
    fn test_score_strategy_picks_highest() {
        let cluster = cluster_of(
            vec![
                chunk("a", "aaa", vec![1.0, 0.0], 0.5),
                chunk("b", "bbb", vec![1.0, 0.0], 0.9),
                chunk("c", "ccc", vec![1.0, 0.0], 0.7),
            ],
            vec![1.0, 0.0],
        );
        let selector = Selector::new(SelectorConfig::default());
        assert_eq!(selector.select_from_cluster(&cluster).unwrap().id, "b");
    }

    #[test]
    fn test_score_strategy_tie_breaks_first() {
        let cluster = cluster_of(
            vec![
                chunk("a", "", vec![1.0], 0.9),
                chunk("b", "", vec![1.0], 0.9),
            ],
            vec![1.0],
        );
        let selector = Selector::new(SelectorConfig::default());
        assert_eq!(selector.select_from_cluster(&cluster).unwrap().id, "a");
    }

    #[test]
    fn test_centroid_strategy_picks_most_typical() {
        let cluster = cluster_of(
            vec![
                chunk("edge", "", vec![1.0, 0.0], 0.9),
                chunk("middle", "", vec![0.707, 0.707], 0.1),
                chunk("other", "", vec![0.0, 1.0], 0.5),
            ],
            vec![0.707, 0.707],
        );
        let selector = Selector::new(SelectorConfig::with_strategy(SelectionStrategy::Centroid));
        assert_eq!(selector.select_from_cluster(&cluster).unwrap().id, "middle");
    }

    #[test]
    fn test_centroid_strategy_falls_back_to_score_without_centroid() {
        let cluster = cluster_of(
            vec![chunk("a", "", vec![], 0.2), chunk("b", "", vec![], 0.8)],
            vec![],
        );
        let selector = Selector::new(SelectorConfig::with_strategy(SelectionStrategy::Centroid));
        assert_eq!(selector.select_from_cluster(&cluster).unwrap().id, "b");
    }

    #[test]
    fn test_length_strategy_picks_longest() {
        let cluster = cluster_of(
            vec![
                chunk("a", "short", vec![1.0], 0.9),
                chunk("b", "much longer text body", vec![1.0], 0.1),
            ],
            vec![1.0],
        );
        let selector = Selector::new(SelectorConfig::with_strategy(SelectionStrategy::Length));
        assert_eq!(selector.select_from_cluster(&cluster).unwrap().id, "b");
    }

    #[test]
    fn test_hybrid_strategy_weighs_components() {
        // Pure score weight reduces hybrid to the score strategy.
        let cluster = cluster_of(
            vec![
                chunk("a", "aa", vec![1.0, 0.0], 0.9),
                chunk("b", "bbbb", vec![0.707, 0.707], 0.2),
            ],
            vec![0.9, 0.3],
        );
        let selector = Selector::new(SelectorConfig {
            strategy: SelectionStrategy::Hybrid,
            score_weight: 1.0,
            centroid_weight: 0.0,
            length_weight: 0.0,
        });
        assert_eq!(selector.select_from_cluster(&cluster).unwrap().id, "a");

        // Pure length weight picks the longest text instead.
        let selector = Selector::new(SelectorConfig {
            strategy: SelectionStrategy::Hybrid,
            score_weight: 0.0,
            centroid_weight: 0.0,
            length_weight: 1.0,
        });
        assert_eq!(selector.select_from_cluster(&cluster).unwrap().id, "b");
    }

    #[test]
    fn test_hybrid_zero_weights_fall_back_to_score() {
        let cluster = cluster_of(
            vec![
                chunk("a", "aa", vec![1.0, 0.0], 0.1),
                chunk("b", "bb", vec![0.0, 1.0], 0.8),
            ],
            vec![0.707, 0.707],
        );
        let selector = Selector::new(SelectorConfig {
            strategy: SelectionStrategy::Hybrid,
            score_weight: 0.0,
            centroid_weight: 0.0,
            length_weight: 0.0,
        });
        assert_eq!(selector.select_from_cluster(&cluster).unwrap().id, "b");
    }

    #[test]
    fn test_single_member_bypasses_strategy() {
        let cluster = cluster_of(vec![chunk("only", "", vec![], 0.0)], vec![]);
        let selector = Selector::new(SelectorConfig::with_strategy(SelectionStrategy::Hybrid));
        assert_eq!(selector.select_from_cluster(&cluster).unwrap().id, "only");
    }

    #[test]
    fn test_select_writes_representatives_back() {
        let mut result = ClusterResult {
            clusters: vec![
                cluster_of(
                    vec![
                        chunk("a", "", vec![1.0], 0.3),
                        chunk("b", "", vec![1.0], 0.6),
                    ],
                    vec![1.0],
                ),
                cluster_of(vec![chunk("c", "", vec![0.0, 1.0], 0.9)], vec![0.0, 1.0]),
            ],
            input_count: 3,
            cluster_count: 2,
            ..Default::default()
        };

        let reps = Selector::new(SelectorConfig::default()).select(&mut result);

        let ids: Vec<&str> = reps.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(result.representatives.len(), 2);
        assert_eq!(result.clusters[0].representative.as_ref().unwrap().id, "b");
        assert_eq!(result.clusters[1].representative.as_ref().unwrap().id, "c");
    }

    #[test]
    fn test_select_top_k_sorts_by_score() {
        let mut result = ClusterResult {
            clusters: vec![
                cluster_of(vec![chunk("low", "", vec![1.0], 0.2)], vec![1.0]),
                cluster_of(vec![chunk("high", "", vec![0.0, 1.0], 0.9)], vec![0.0, 1.0]),
                cluster_of(vec![chunk("mid", "", vec![1.0, 1.0], 0.5)], vec![1.0, 1.0]),
            ],
            input_count: 3,
            cluster_count: 3,
            ..Default::default()
        };

        let top = select_top_k(&mut result, 2, SelectionStrategy::Score);
        let ids: Vec<&str> = top.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid"]);
    }
}
