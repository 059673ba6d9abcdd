//! Pluggable similarity measures over the 2×2 co-rating contingency
//! table.
//!
//! For a pair of items (or metadata values) A and B:
//! `k11` users rated both, `k12` rated only A, `k21` rated only B,
//! `k22` rated neither. The builder keeps raw counts on the diagonal
//! and weighs every off-diagonal cell through the configured measure.

/// Turns the contingency counts of a pair into a similarity score.
pub trait SimilarityMeasure: Send + Sync {
    fn name(&self) -> &'static str;

    /// Score for one off-diagonal cell. Must be non-negative and
    /// symmetric in (k12, k21).
    fn weigh(&self, k11: f64, k12: f64, k21: f64, k22: f64) -> f64;
}

/// Raw co-occurrence: the number of users who rated both. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cooccurrence;

impl SimilarityMeasure for Cooccurrence {
    fn name(&self) -> &'static str {
        "cooccurrence"
    }

    fn weigh(&self, k11: f64, _k12: f64, _k21: f64, _k22: f64) -> f64 {
        k11
    }
}

/// Log-likelihood ratio similarity (Dunning). Rewards pairs that co-occur
/// more than their independent frequencies predict, which keeps a pair of
/// merely-popular items from looking similar.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLikelihood;

impl SimilarityMeasure for LogLikelihood {
    fn name(&self) -> &'static str {
        "log-likelihood"
    }

    fn weigh(&self, k11: f64, k12: f64, k21: f64, k22: f64) -> f64 {
        let table = [k11, k12, k21, k22];
        let total: f64 = table.iter().sum();
        if total == 0.0 {
            return 0.0;
        }
        let llr = 2.0
            * total
            * (shannon_entropy(&table)
                - shannon_entropy(&[k11 + k12, k21 + k22])
                - shannon_entropy(&[k11 + k21, k12 + k22]));
        // Floating-point noise can push an independent pair a hair below
        // zero.
        llr.max(0.0)
    }
}

/// `Σ (x/N)·ln(x/N)` over nonzero entries. Note the sign: this is the
/// negated entropy, which makes the LLR difference above come out
/// positive.
pub fn shannon_entropy(counts: &[f64]) -> f64 {
    let total: f64 = counts.iter().sum();
    if total == 0.0 {
        return 0.0;
    }
    counts
        .iter()
        .filter(|&&x| x > 0.0)
        .map(|&x| (x / total) * (x / total).ln())
        .sum()
}
