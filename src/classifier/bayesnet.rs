//! Discrete Bayesian-network classifiers
//!
//! Both structures put the class variable at the root with an edge to every
//! feature:
//!
//! - **Naive Bayes**: features are independent given the class.
//! - **TAN** (tree-augmented naive Bayes): features additionally form a tree,
//!   the Chow–Liu maximum spanning tree over conditional mutual information
//!   `I(Xi; Xj | C)`, rooted at feature `root`.
//!
//! Conditional probability tables use Lidstone smoothing with `alpha`.
//! Inference sums log-probabilities; ties go to the lowest class code.

use super::{Capabilities, Complexity, Hyperparameters, TrialContext};
use crate::dataset::{Column, DatasetView};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Network structure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Structure {
    /// Class → every feature
    NaiveBayes,
    /// Naive Bayes plus a Chow–Liu tree among features
    Tan,
}

/// Bayesian-network classifier adapter.
#[derive(Debug, Clone)]
pub struct BayesNetClassifier {
    structure: Structure,
}

impl BayesNetClassifier {
    /// Classifier with the given structure.
    #[must_use]
    pub const fn new(structure: Structure) -> Self {
        Self { structure }
    }

    /// Structure family.
    #[must_use]
    pub const fn structure(&self) -> Structure {
        self.structure
    }

    /// Registered name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self.structure {
            Structure::NaiveBayes => "NaiveBayes",
            Structure::Tan => "TAN",
        }
    }

    /// Capability flags shared by every structure.
    #[must_use]
    pub const fn capabilities() -> Capabilities {
        Capabilities {
            probabilities: true,
            discrete_only: true,
            deterministic: true,
        }
    }

    /// Accepted hyperparameter names.
    #[must_use]
    pub fn valid_hyperparameters(&self) -> Vec<String> {
        match self.structure {
            Structure::NaiveBayes => vec!["alpha".to_string()],
            Structure::Tan => vec!["alpha".to_string(), "root".to_string()],
        }
    }

    /// Learn structure and parameters from `train`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaViolation`] for continuous columns,
    /// [`Error::Training`] for invalid hyperparameter values and
    /// [`Error::TimeBudgetExceeded`] if the budget runs out.
    pub fn fit(&self, train: &DatasetView<'_>, params: &Hyperparameters, ctx: &TrialContext) -> Result<Network> {
        let alpha = params.f64_or("alpha", 1.0)?;
        if !(alpha > 0.0 && alpha.is_finite()) {
            return Err(Error::Training(format!(
                "alpha must be positive, got {alpha}"
            )));
        }
        let columns = discrete_columns(train)?;
        let labels = train.labels();
        let n_classes = train.dataset().n_classes();
        let n_features = columns.len();

        let parents = match self.structure {
            Structure::NaiveBayes => vec![None; n_features],
            Structure::Tan => {
                let root = params.usize_or("root", 0)?;
                if n_features > 0 && root >= n_features {
                    return Err(Error::Training(format!(
                        "root {root} outside the {n_features} features"
                    )));
                }
                chow_liu_tree(&columns, &labels, n_classes, root, ctx)?
            }
        };

        let mut class_counts = vec![0usize; n_classes];
        for &label in &labels {
            class_counts[label as usize] += 1;
        }
        #[allow(clippy::cast_precision_loss)]
        let class_log_prior = class_counts
            .iter()
            .map(|&c| ((c as f64 + alpha) / (labels.len() as f64 + alpha * n_classes as f64)).ln())
            .collect();

        let mut nodes = Vec::with_capacity(n_features);
        for (feature, parent) in parents.into_iter().enumerate() {
            ctx.check_budget()?;
            nodes.push(Node::fit(&columns, &labels, n_classes, feature, parent, alpha));
        }

        Ok(Network {
            n_classes,
            class_log_prior,
            nodes,
        })
    }
}

/// Codes and state count of one discrete column, in view order.
struct DiscreteColumn {
    codes: Vec<u32>,
    n_states: usize,
}

fn discrete_columns(view: &DatasetView<'_>) -> Result<Vec<DiscreteColumn>> {
    view.dataset()
        .features()
        .iter()
        .map(|feature| match feature.column() {
            Column::Discrete { codes, states } => Ok(DiscreteColumn {
                codes: view.rows().iter().map(|&r| codes[r]).collect(),
                n_states: states.len(),
            }),
            Column::Continuous(_) => Err(Error::SchemaViolation(format!(
                "feature {} is continuous",
                feature.name()
            ))),
        })
        .collect()
}

/// Parent feature per feature of the maximum spanning tree over
/// `I(Xi; Xj | C)`, grown from `root` (Prim). Ties keep the lowest index.
fn chow_liu_tree(
    columns: &[DiscreteColumn],
    labels: &[u32],
    n_classes: usize,
    root: usize,
    ctx: &TrialContext,
) -> Result<Vec<Option<usize>>> {
    let n = columns.len();
    let mut weights = vec![vec![0.0; n]; n];
    for i in 0..n {
        ctx.check_budget()?;
        for j in (i + 1)..n {
            let w = conditional_mutual_information(&columns[i], &columns[j], labels, n_classes);
            weights[i][j] = w;
            weights[j][i] = w;
        }
    }

    let mut parents = vec![None; n];
    if n == 0 {
        return Ok(parents);
    }
    let mut in_tree = vec![false; n];
    in_tree[root] = true;
    let mut best: Vec<(f64, usize)> = (0..n).map(|j| (weights[root][j], root)).collect();
    for _ in 1..n {
        let mut next: Option<usize> = None;
        for j in (0..n).filter(|&j| !in_tree[j]) {
            if next.map_or(true, |k| best[j].0 > best[k].0) {
                next = Some(j);
            }
        }
        let Some(j) = next else { break };
        in_tree[j] = true;
        parents[j] = Some(best[j].1);
        for other in (0..n).filter(|&o| !in_tree[o]) {
            if weights[j][other] > best[other].0 {
                best[other] = (weights[j][other], j);
            }
        }
    }
    Ok(parents)
}

#[allow(clippy::cast_precision_loss)]
fn conditional_mutual_information(
    a: &DiscreteColumn,
    b: &DiscreteColumn,
    labels: &[u32],
    n_classes: usize,
) -> f64 {
    let (sa, sb) = (a.n_states, b.n_states);
    let mut joint = vec![0usize; n_classes * sa * sb];
    let mut with_a = vec![0usize; n_classes * sa];
    let mut with_b = vec![0usize; n_classes * sb];
    let mut per_class = vec![0usize; n_classes];
    for ((&x, &y), &c) in a.codes.iter().zip(&b.codes).zip(labels) {
        let (x, y, c) = (x as usize, y as usize, c as usize);
        joint[(c * sa + x) * sb + y] += 1;
        with_a[c * sa + x] += 1;
        with_b[c * sb + y] += 1;
        per_class[c] += 1;
    }
    let n = labels.len() as f64;
    let mut information = 0.0;
    for c in 0..n_classes {
        for x in 0..sa {
            for y in 0..sb {
                let count = joint[(c * sa + x) * sb + y];
                if count == 0 {
                    continue;
                }
                let ratio = (count * per_class[c]) as f64
                    / (with_a[c * sa + x] * with_b[c * sb + y]) as f64;
                information += count as f64 / n * ratio.ln();
            }
        }
    }
    information
}

/// One feature node and its conditional probability table.
#[derive(Debug, Clone)]
struct Node {
    n_states: usize,
    parent: Option<usize>,
    parent_states: usize,
    /// `log P(x | class, parent)`, indexed `((class * parent_states) + parent) * n_states + x`
    log_cpt: Vec<f64>,
}

impl Node {
    #[allow(clippy::cast_precision_loss)]
    fn fit(
        columns: &[DiscreteColumn],
        labels: &[u32],
        n_classes: usize,
        feature: usize,
        parent: Option<usize>,
        alpha: f64,
    ) -> Self {
        let column = &columns[feature];
        let n_states = column.n_states.max(1);
        let parent_states = parent.map_or(1, |p| columns[p].n_states.max(1));
        let mut counts = vec![0usize; n_classes * parent_states * n_states];
        for (row, (&x, &c)) in column.codes.iter().zip(labels).enumerate() {
            let p = parent.map_or(0, |p| columns[p].codes[row] as usize);
            counts[((c as usize * parent_states) + p) * n_states + x as usize] += 1;
        }
        let log_cpt = counts
            .chunks(n_states)
            .flat_map(|row| {
                let total: usize = row.iter().sum();
                let denominator = total as f64 + alpha * n_states as f64;
                row.iter()
                    .map(move |&count| ((count as f64 + alpha) / denominator).ln())
            })
            .collect();
        Self {
            n_states,
            parent,
            parent_states,
            log_cpt,
        }
    }

    /// `log P(codes[feature] | class, codes[parent])`.
    fn log_probability(&self, class: usize, feature: usize, codes: &[u32]) -> f64 {
        let p = self.parent.map_or(0, |p| codes[p] as usize);
        self.log_cpt[((class * self.parent_states) + p) * self.n_states + codes[feature] as usize]
    }
}

/// Fitted Bayesian network.
#[derive(Debug, Clone)]
pub struct Network {
    n_classes: usize,
    class_log_prior: Vec<f64>,
    nodes: Vec<Node>,
}

impl Network {
    /// Number of classes.
    #[must_use]
    pub const fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Parent feature of every feature node (`None` = class only).
    #[must_use]
    pub fn feature_parents(&self) -> Vec<Option<usize>> {
        self.nodes.iter().map(|n| n.parent).collect()
    }

    /// Nodes, edges and states of the network.
    #[must_use]
    pub fn complexity(&self) -> Complexity {
        Complexity {
            nodes: self.nodes.len() + 1,
            edges: self.nodes.len() + self.nodes.iter().filter(|n| n.parent.is_some()).count(),
            states: self.n_classes + self.nodes.iter().map(|n| n.n_states).sum::<usize>(),
        }
    }

    fn log_posterior(&self, codes: &[u32]) -> Vec<f64> {
        (0..self.n_classes)
            .map(|class| {
                self.class_log_prior[class]
                    + self
                        .nodes
                        .iter()
                        .enumerate()
                        .map(|(feature, node)| node.log_probability(class, feature, codes))
                        .sum::<f64>()
            })
            .collect()
    }

    fn row_codes(eval: &DatasetView<'_>) -> Result<Vec<Vec<u32>>> {
        let columns = discrete_columns(eval).map_err(|e| Error::Inference(e.to_string()))?;
        Ok((0..eval.len())
            .map(|i| columns.iter().map(|c| c.codes[i]).collect())
            .collect())
    }

    /// Most probable class per row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Inference`] for continuous columns and
    /// [`Error::TimeBudgetExceeded`] if the budget runs out.
    pub fn predict(&self, eval: &DatasetView<'_>, ctx: &TrialContext) -> Result<Vec<u32>> {
        Self::row_codes(eval)?
            .iter()
            .map(|codes| {
                ctx.check_budget()?;
                Ok(argmax(&self.log_posterior(codes)))
            })
            .collect()
    }

    /// Normalised class posterior per row.
    ///
    /// # Errors
    ///
    /// Same as [`Network::predict`].
    pub fn predict_probabilities(&self, eval: &DatasetView<'_>, ctx: &TrialContext) -> Result<Vec<Vec<f64>>> {
        Self::row_codes(eval)?
            .iter()
            .map(|codes| {
                ctx.check_budget()?;
                let log_posterior = self.log_posterior(codes);
                let max = log_posterior.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let unnormalised: Vec<f64> = log_posterior.iter().map(|l| (l - max).exp()).collect();
                let total: f64 = unnormalised.iter().sum();
                Ok(unnormalised.into_iter().map(|p| p / total).collect())
            })
            .collect()
    }
}

/// Index of the largest score, lowest index on ties.
#[allow(clippy::cast_possible_truncation)]
pub(super) fn argmax(scores: &[f64]) -> u32 {
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best] {
            best = i;
        }
    }
    best as u32
}
