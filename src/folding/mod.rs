//! Cross-validation fold generation
//!
//! A [`FoldPlan`] lists every (train, test) partition of one dataset for
//! `repetitions × k` folds. Plans are pure functions of
//! `(labels, k, repetitions, seed, stratified)`: the same inputs always yield
//! the same plan.
//!
//! Repetition `r` shuffles with seed `seed + r`. Plain k-fold splits the
//! shuffled rows into `k` contiguous chunks, the first `n % k` one row
//! larger. Stratified k-fold shuffles each class separately and deals its
//! rows round-robin across folds, continuing the fold cursor from one class
//! to the next so fold sizes stay balanced.

use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Default fold count.
pub const DEFAULT_K: usize = 5;
/// Default base seed.
pub const DEFAULT_SEED: u64 = 271;

/// Cross-validation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoldStrategy {
    /// Folds per repetition (`>= 2`)
    pub k: usize,
    /// Number of repetitions (`>= 1`)
    pub repetitions: usize,
    /// Base seed; repetition `r` uses `seed + r`
    pub seed: u64,
    /// Preserve class proportions in every fold
    pub stratified: bool,
}

impl Default for FoldStrategy {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            repetitions: 1,
            seed: DEFAULT_SEED,
            stratified: false,
        }
    }
}

impl FoldStrategy {
    /// Check the row-count independent constraints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `k < 2` or `repetitions < 1`.
    pub fn validate(&self) -> Result<()> {
        if self.k < 2 {
            return Err(Error::Configuration(format!(
                "fold count must be at least 2, got {}",
                self.k
            )));
        }
        if self.repetitions < 1 {
            return Err(Error::Configuration(
                "repetitions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Seeds of every repetition.
    #[must_use]
    pub fn seeds(&self) -> Vec<u64> {
        (0..self.repetitions as u64)
            .map(|r| self.seed.wrapping_add(r))
            .collect()
    }

    /// Total number of folds across repetitions.
    #[must_use]
    pub const fn total_folds(&self) -> usize {
        self.k * self.repetitions
    }
}

/// One train/test partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    /// Repetition index (0-based)
    pub repetition: usize,
    /// Fold index within the repetition (0-based)
    pub index: usize,
    /// Seed of the repetition that produced the fold
    pub seed: u64,
    /// Training rows, ascending
    pub train: Vec<usize>,
    /// Test rows, ascending
    pub test: Vec<usize>,
}

impl Fold {
    /// Position of the fold in the plan (`repetition * k + index`).
    #[must_use]
    pub const fn ordinal(&self, k: usize) -> usize {
        self.repetition * k + self.index
    }

    /// Identity of the fold, without its row sets.
    #[must_use]
    pub const fn coordinates(&self) -> FoldCoordinates {
        FoldCoordinates {
            repetition: self.repetition,
            fold: self.index,
            seed: self.seed,
        }
    }
}

/// Where a trial sits in the cross-validation protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FoldCoordinates {
    /// Repetition index
    pub repetition: usize,
    /// Fold index within the repetition
    pub fold: usize,
    /// Seed of the repetition
    pub seed: u64,
}

impl std::fmt::Display for FoldCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "repetition {} fold {}", self.repetition, self.fold)
    }
}

/// Ordered folds of one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldPlan {
    rows: usize,
    k: usize,
    repetitions: usize,
    folds: Vec<Fold>,
}

impl FoldPlan {
    /// Number of dataset rows the plan partitions.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Folds per repetition.
    #[must_use]
    pub const fn k(&self) -> usize {
        self.k
    }

    /// Number of repetitions.
    #[must_use]
    pub const fn repetitions(&self) -> usize {
        self.repetitions
    }

    /// Number of folds in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.folds.len()
    }

    /// Whether the plan holds no folds.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    /// Fold by plan position.
    #[must_use]
    pub fn get(&self, ordinal: usize) -> Option<&Fold> {
        self.folds.get(ordinal)
    }

    /// Folds in plan order.
    pub fn iter(&self) -> std::slice::Iter<'_, Fold> {
        self.folds.iter()
    }

    /// Check the partition invariants: within a fold train and test are
    /// disjoint and cover every row; within a repetition every row is tested
    /// exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] describing the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        for repetition in 0..self.repetitions {
            let mut tested = vec![0usize; self.rows];
            for fold in self.folds.iter().filter(|f| f.repetition == repetition) {
                let mut seen = vec![false; self.rows];
                for &row in fold.train.iter().chain(&fold.test) {
                    if row >= self.rows || seen[row] {
                        return Err(Error::Other(format!(
                            "fold {}/{}: row {row} repeated or out of range",
                            repetition, fold.index
                        )));
                    }
                    seen[row] = true;
                }
                if seen.iter().any(|s| !s) {
                    return Err(Error::Other(format!(
                        "fold {}/{}: train and test do not cover every row",
                        repetition, fold.index
                    )));
                }
                for &row in &fold.test {
                    tested[row] += 1;
                }
            }
            if let Some(row) = tested.iter().position(|&c| c != 1) {
                return Err(Error::Other(format!(
                    "repetition {repetition}: row {row} tested {} times",
                    tested[row]
                )));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a FoldPlan {
    type Item = &'a Fold;
    type IntoIter = std::slice::Iter<'a, Fold>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Builds fold plans for a fixed strategy.
#[derive(Debug, Clone, Copy)]
pub struct FoldGenerator {
    strategy: FoldStrategy,
}

impl FoldGenerator {
    /// Create a generator for `strategy`.
    #[must_use]
    pub const fn new(strategy: FoldStrategy) -> Self {
        Self { strategy }
    }

    /// Strategy the generator applies.
    #[must_use]
    pub const fn strategy(&self) -> &FoldStrategy {
        &self.strategy
    }

    /// Build the plan for a dataset with the given label column.
    ///
    /// Labels are only read by the stratified strategy; plain k-fold depends
    /// on the row count alone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the strategy is invalid or `k`
    /// exceeds the number of rows.
    pub fn plan(&self, labels: &[u32]) -> Result<FoldPlan> {
        let FoldStrategy {
            k,
            repetitions,
            stratified,
            ..
        } = self.strategy;
        self.strategy.validate()?;
        let rows = labels.len();
        if k > rows {
            return Err(Error::Configuration(format!(
                "fold count {k} exceeds the {rows} rows of the dataset"
            )));
        }

        let mut folds = Vec::with_capacity(k * repetitions);
        for (repetition, seed) in self.strategy.seeds().into_iter().enumerate() {
            let mut rng = StdRng::seed_from_u64(seed);
            let assignment = if stratified {
                stratified_assignment(labels, k, &mut rng)
            } else {
                plain_assignment(rows, k, &mut rng)
            };
            for index in 0..k {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..rows).partition(|&row| assignment[row] == index);
                folds.push(Fold {
                    repetition,
                    index,
                    seed,
                    train,
                    test,
                });
            }
        }

        Ok(FoldPlan {
            rows,
            k,
            repetitions,
            folds,
        })
    }
}

/// Fold index per row for plain k-fold.
fn plain_assignment(rows: usize, k: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rows).collect();
    order.shuffle(rng);

    let base = rows / k;
    let extra = rows % k;
    let mut assignment = vec![0; rows];
    let mut cursor = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        for &row in &order[cursor..cursor + size] {
            assignment[row] = fold;
        }
        cursor += size;
    }
    assignment
}

/// Fold index per row for stratified k-fold.
fn stratified_assignment(labels: &[u32], k: usize, rng: &mut StdRng) -> Vec<usize> {
    let n_classes = labels.iter().max().map_or(0, |&m| m as usize + 1);
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (row, &label) in labels.iter().enumerate() {
        by_class[label as usize].push(row);
    }

    let mut assignment = vec![0; labels.len()];
    let mut fold = 0;
    for mut rows in by_class {
        rows.shuffle(rng);
        for row in rows {
            assignment[row] = fold;
            fold = (fold + 1) % k;
        }
    }
    assignment
}
