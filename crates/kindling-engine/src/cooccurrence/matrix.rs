//! Dense square matrix with string labels on both axes.
//!
//! Small enough to stay dense: the rating domains this engine targets
//! are thousands of items, and the builder is throttled by a staleness
//! window rather than rebuilt per request.

use std::collections::HashMap;

/// Square f64 matrix whose rows and columns are keyed by the same sorted
/// label set (item ids, or metadata values for a field matrix).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledMatrix {
    labels: Vec<String>,
    index: HashMap<String, usize>,
    data: Vec<f64>,
}

impl LabeledMatrix {
    /// Build a zeroed matrix over the given labels. Labels are sorted and
    /// deduplicated so the layout is deterministic for a given set.
    pub fn zeroed(mut labels: Vec<String>) -> Self {
        labels.sort();
        labels.dedup();
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        let n = labels.len();
        Self {
            labels,
            index,
            data: vec![0.0; n * n],
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.labels.len() + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.labels.len() + col] = value;
    }

    pub fn add(&mut self, row: usize, col: usize, delta: f64) {
        self.data[row * self.labels.len() + col] += delta;
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Cell by label pair; `None` when either label is unknown.
    pub fn get_labeled(&self, row: &str, col: &str) -> Option<f64> {
        let r = self.index_of(row)?;
        let c = self.index_of(col)?;
        Some(self.get(r, c))
    }

    /// One row by label, as `(label, value)` pairs.
    pub fn row(&self, label: &str) -> Option<Vec<(String, f64)>> {
        let r = self.index_of(label)?;
        Some(
            self.labels
                .iter()
                .enumerate()
                .map(|(c, l)| (l.clone(), self.get(r, c)))
                .collect(),
        )
    }

    /// Raw row-major cells, for the builder's parallel per-row weighting.
    pub(crate) fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// `Mᵗ · v`, strict: every nonzero key of `v` must be a known label,
    /// or the matrix no longer matches the vector's dimension and the
    /// caller has to rebuild. Zero-weight entries carry no co-rating
    /// signal (the builder's incidence is binary over nonzero ratings)
    /// and are skipped, not treated as unknown. The result carries a
    /// score for every label.
    pub fn project(&self, vector: &HashMap<String, f64>) -> Result<HashMap<String, f64>, String> {
        let mut acc = vec![0.0; self.labels.len()];
        for (label, &weight) in vector {
            if weight == 0.0 {
                continue;
            }
            let row = self
                .index_of(label)
                .ok_or_else(|| format!("label '{label}' not in matrix"))?;
            for (col, cell) in acc.iter_mut().enumerate() {
                *cell += weight * self.get(row, col);
            }
        }
        Ok(self.labels.iter().cloned().zip(acc).collect())
    }

    /// `Mᵗ · v`, lenient: unknown keys contribute nothing. Used for
    /// category matrices, where a value missing from the matrix simply
    /// scores zero.
    pub fn project_lenient(&self, vector: &HashMap<String, f64>) -> HashMap<String, f64> {
        let mut acc = vec![0.0; self.labels.len()];
        for (label, &weight) in vector {
            if let Some(row) = self.index_of(label) {
                for (col, cell) in acc.iter_mut().enumerate() {
                    *cell += weight * self.get(row, col);
                }
            }
        }
        self.labels.iter().cloned().zip(acc).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> LabeledMatrix {
        // b: [2, 1; 1, 3] over labels [a, b] after sorting.
        let mut m = LabeledMatrix::zeroed(vec!["b".to_string(), "a".to_string()]);
        m.set(0, 0, 2.0);
        m.set(0, 1, 1.0);
        m.set(1, 0, 1.0);
        m.set(1, 1, 3.0);
        m
    }

    #[test]
    fn labels_are_sorted_and_deduped() {
        let m = LabeledMatrix::zeroed(vec!["b".into(), "a".into(), "b".into()]);
        assert_eq!(m.labels(), ["a".to_string(), "b".to_string()]);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn project_applies_transpose_dot() {
        let m = two_by_two();
        let v = HashMap::from([("a".to_string(), 1.0), ("b".to_string(), 2.0)]);
        let out = m.project(&v).unwrap();
        assert_eq!(out["a"], 1.0 * 2.0 + 2.0 * 1.0);
        assert_eq!(out["b"], 1.0 * 1.0 + 2.0 * 3.0);
    }

    #[test]
    fn project_rejects_unknown_label() {
        let m = two_by_two();
        let v = HashMap::from([("zz".to_string(), 1.0)]);
        assert!(m.project(&v).is_err());
    }

    #[test]
    fn project_skips_zero_weight_entries() {
        // A zero rating never made it into any observation, so its
        // label may legitimately be absent from the matrix.
        let m = two_by_two();
        let v = HashMap::from([("a".to_string(), 1.0), ("unrated".to_string(), 0.0)]);
        let out = m.project(&v).unwrap();
        assert_eq!(out["a"], 2.0);
        assert_eq!(out["b"], 1.0);
    }

    #[test]
    fn lenient_projection_ignores_unknown_label() {
        let m = two_by_two();
        let v = HashMap::from([("zz".to_string(), 1.0), ("a".to_string(), 1.0)]);
        let out = m.project_lenient(&v);
        assert_eq!(out["a"], 2.0);
        assert_eq!(out["b"], 1.0);
    }

    #[test]
    fn row_reads_back_by_label() {
        let m = two_by_two();
        let row = m.row("b").unwrap();
        assert_eq!(row, vec![("a".to_string(), 1.0), ("b".to_string(), 3.0)]);
        assert!(m.row("zz").is_none());
    }
}
