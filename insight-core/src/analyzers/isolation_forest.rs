//! Isolation forest.
//!
//! Anomalies are few and different, so random axis-aligned splits isolate them
//! in fewer steps than normal points. The forest grows `n_estimators` trees,
//! each on a subsample drawn without replacement, and scores a point by its
//! average path length normalized with `c(subsample)`:
//!
//! ```text
//! s(x) = 2^(-E[h(x)] / c(n))
//! c(n) = 2 (ln(n - 1) + γ) - 2 (n - 1) / n
//! ```
//!
//! Scores fall in `(0, 1]`; higher is more anomalous. All randomness comes
//! from a [`StdRng`] seeded by the caller, so a fit is fully reproducible.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use crate::error::{InsightError, Result};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Parameters of one forest fit.
#[derive(Debug, Clone)]
pub struct IsolationForestConfig {
    /// Number of trees (default: 100)
    pub n_estimators: usize,
    /// Subsample size per tree, capped at the number of points (default: 256)
    pub max_samples: usize,
    /// Seed for subsampling and split selection (default: 42)
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

enum Node {
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

/// A fitted forest. Lives only for the duration of one scoring call.
pub struct IsolationForest {
    trees: Vec<Node>,
    subsample_size: usize,
}

impl IsolationForest {
    /// Grows a forest over `data`, one fixed-length vector per point.
    pub fn fit(data: &[Vec<f64>], config: &IsolationForestConfig) -> Result<Self> {
        let n = data.len();
        if n == 0 {
            return Err(InsightError::internal("cannot fit an isolation forest on no points"));
        }
        if config.n_estimators == 0 {
            return Err(InsightError::invalid_config("n_estimators must be at least 1"));
        }
        let width = data[0].len();
        if let Some(point) = data.iter().find(|p| p.len() != width) {
            return Err(InsightError::internal(format!(
                "point has {} features, expected {width}",
                point.len()
            )));
        }

        let subsample_size = config.max_samples.clamp(1, n);
        let height_limit = (subsample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let trees = (0..config.n_estimators)
            .map(|_| {
                let sample = index::sample(&mut rng, n, subsample_size).into_vec();
                grow(data, sample, width, height_limit, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            subsample_size,
        })
    }

    pub fn subsample_size(&self) -> usize {
        self.subsample_size
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    /// Average path length of `point` over all trees.
    pub fn path_length(&self, point: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| path_length(tree, point)).sum();
        total / self.trees.len() as f64
    }

    /// Anomaly score of `point` in `(0, 1]`.
    pub fn score(&self, point: &[f64]) -> f64 {
        let normalizer = average_path_length(self.subsample_size);
        if normalizer > 0.0 {
            2f64.powf(-self.path_length(point) / normalizer)
        } else {
            0.5
        }
    }

    pub fn score_all(&self, data: &[Vec<f64>]) -> Vec<f64> {
        data.iter().map(|point| self.score(point)).collect()
    }
}

/// Expected path length of an unsuccessful search in a binary search tree
/// of `n` points, `c(n)`.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

fn grow(
    data: &[Vec<f64>],
    indices: Vec<usize>,
    width: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if indices.len() <= 1 || height_limit == 0 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Only features that vary inside this node can separate it
    let candidates: Vec<(usize, f64, f64)> = (0..width)
        .filter_map(|feature| {
            let (min, max) = indices.iter().fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), &i| (lo.min(data[i][feature]), hi.max(data[i][feature])),
            );
            (max > min).then_some((feature, min, max))
        })
        .collect();

    if candidates.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, min, max) = candidates[rng.random_range(0..candidates.len())];
    let value = min + rng.random::<f64>() * (max - min);

    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.iter().partition(|&&i| data[i][feature] < value);

    if left.is_empty() || right.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    Node::Split {
        feature,
        value,
        left: Box::new(grow(data, left, width, height_limit - 1, rng)),
        right: Box::new(grow(data, right, width, height_limit - 1, rng)),
    }
}

fn path_length(node: &Node, point: &[f64]) -> f64 {
    let mut node = node;
    let mut depth = 0.0;
    loop {
        match node {
            Node::Leaf { size } => return depth + average_path_length(*size),
            Node::Split {
                feature,
                value,
                left,
                right,
            } => {
                node = if point[*feature] < *value { left } else { right };
                depth += 1.0;
            }
        }
    }
}
