//! Gradient-boosted decision trees for binary classification
//!
//! Second-order boosting on the logistic loss: each round fits a
//! regression tree to the gradients and hessians of the current margins,
//! choosing splits by exact enumeration of the midpoints between sorted
//! feature values. Leaf weights are `-G / (H + lambda)` scaled by the
//! learning rate.
//!
//! Models are small (two features, shallow trees) and serialize with serde.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TrainError, TrainResult};

/// Number of classifier features: `[fuzzy_score, vector_score]`
pub const N_FEATURES: usize = 2;

pub type FeatureRow = [f64; N_FEATURES];

const MIN_HESSIAN: f64 = 1e-16;

/// Boosting hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GbdtParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// L2 regularization on leaf weights
    pub lambda: f64,
    /// Minimum hessian sum on each side of a split
    pub min_child_weight: f64,
    /// Minimum gain for a split to be kept
    pub gamma: f64,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 3,
            learning_rate: 0.3,
            lambda: 1.0,
            min_child_weight: 1.0,
            gamma: 0.0,
        }
    }
}

impl GbdtParams {
    pub fn validate(&self) -> TrainResult<()> {
        if self.n_trees == 0 {
            return Err(TrainError::InvalidParams("n_trees must be positive".to_string()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(TrainError::InvalidParams(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        if self.lambda < 0.0 || self.min_child_weight < 0.0 || self.gamma < 0.0 {
            return Err(TrainError::InvalidParams(
                "lambda, min_child_weight and gamma must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A regression tree stored as a node arena, root at index 0
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict(&self, x: &FeatureRow) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] < *threshold { *left } else { *right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Builds one tree from per-sample gradients
struct TreeBuilder<'a> {
    x: &'a [FeatureRow],
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a GbdtParams,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    fn build(mut self) -> Tree {
        let all: Vec<usize> = (0..self.x.len()).collect();
        self.grow(&all, 0);
        Tree { nodes: self.nodes }
    }

    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.params.lambda) * self.params.learning_rate
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.lambda)
    }

    /// Grow the subtree over `samples`, returning its node index
    fn grow(&mut self, samples: &[usize], depth: usize) -> usize {
        let g: f64 = samples.iter().map(|&i| self.grad[i]).sum();
        let h: f64 = samples.iter().map(|&i| self.hess[i]).sum();

        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.leaf_value(g, h),
        });

        if depth >= self.params.max_depth || samples.len() < 2 {
            return idx;
        }
        let Some(split) = self.best_split(samples, g, h) else {
            return idx;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&i| self.x[i][split.feature] < split.threshold);

        let left = self.grow(&left_samples, depth + 1);
        let right = self.grow(&right_samples, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&self, samples: &[usize], g: f64, h: f64) -> Option<SplitCandidate> {
        let parent = self.score(g, h);
        let mut best: Option<SplitCandidate> = None;

        for feature in 0..N_FEATURES {
            let mut order = samples.to_vec();
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let (mut gl, mut hl) = (0.0, 0.0);
            for pos in 0..order.len() - 1 {
                let i = order[pos];
                gl += self.grad[i];
                hl += self.hess[i];

                let here = self.x[i][feature];
                let next = self.x[order[pos + 1]][feature];
                if here == next {
                    continue;
                }
                let (gr, hr) = (g - gl, h - hl);
                if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                    continue;
                }

                let gain = 0.5 * (self.score(gl, hl) + self.score(gr, hr) - parent) - self.params.gamma;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (here + next) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Boosted tree ensemble predicting the probability of class 1
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GbdtClassifier {
    params: GbdtParams,
    /// Initial margin, the log-odds of the training prior
    base_margin: f64,
    trees: Vec<Tree>,
}

impl GbdtClassifier {
    /// Fit on feature rows `x` with binary targets `y` (0 or 1)
    pub fn fit(x: &[FeatureRow], y: &[u8], params: GbdtParams) -> TrainResult<Self> {
        params.validate()?;
        if x.len() != y.len() {
            return Err(TrainError::ShapeMismatch {
                features: x.len(),
                targets: y.len(),
            });
        }
        if x.is_empty() {
            return Err(TrainError::EmptyTrainingSet);
        }
        let positives = y.iter().filter(|&&t| t == 1).count();
        if positives == 0 || positives == y.len() {
            return Err(TrainError::SingleClass);
        }

        let prior = (positives as f64 / y.len() as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_margin = (prior / (1.0 - prior)).ln();
        let mut margins = vec![base_margin; x.len()];
        let mut grad = vec![0.0; x.len()];
        let mut hess = vec![0.0; x.len()];
        let mut trees = Vec::with_capacity(params.n_trees);

        for _ in 0..params.n_trees {
            for i in 0..x.len() {
                let p = sigmoid(margins[i]);
                grad[i] = p - f64::from(y[i]);
                hess[i] = (p * (1.0 - p)).max(MIN_HESSIAN);
            }
            let tree = TreeBuilder {
                x,
                grad: &grad,
                hess: &hess,
                params: &params,
                nodes: Vec::new(),
            }
            .build();
            for (margin, row) in margins.iter_mut().zip(x) {
                *margin += tree.predict(row);
            }
            trees.push(tree);
        }

        debug!(
            "fitted {} trees on {} rows ({} positive), max depth {}",
            trees.len(),
            x.len(),
            positives,
            trees.iter().map(Tree::depth).max().unwrap_or(0)
        );

        Ok(Self {
            params,
            base_margin,
            trees,
        })
    }

    #[inline]
    pub fn params(&self) -> &GbdtParams {
        &self.params
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Probability that `x` belongs to class 1
    pub fn predict_proba(&self, x: &FeatureRow) -> f64 {
        let margin: f64 = self.base_margin + self.trees.iter().map(|t| t.predict(x)).sum::<f64>();
        sigmoid(margin)
    }

    pub fn predict_proba_batch(&self, x: &[FeatureRow]) -> Vec<f64> {
        x.iter().map(|row| self.predict_proba(row)).collect()
    }
}
