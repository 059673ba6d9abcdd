use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Running sum/count accumulators for one entity under one metadata field.
///
/// Keys are metadata values in the user direction ("how much has this user
/// engaged with items by author X") and user ids in the item direction.
/// Ratings overwrite, but these accumulate: rating five books by the same
/// author keeps counting as five engagements even after individual item
/// ratings change. The flip side is that rating edits and removals are
/// never corrected retroactively; `tot/n` is an approximation of the
/// entity's average affinity, accepted by design.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldAggregate {
    /// Sum of ratings per key.
    pub tot: HashMap<String, f64>,
    /// Number of ratings per key.
    pub n: HashMap<String, u64>,
}

impl FieldAggregate {
    /// Record one rating against `key`.
    pub fn bump(&mut self, key: &str, rating: f64) {
        *self.tot.entry(key.to_string()).or_insert(0.0) += rating;
        *self.n.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Average rating per key, with a zero count treated as divisor 1.
    pub fn affinity(&self) -> HashMap<String, f64> {
        self.tot
            .iter()
            .map(|(key, &tot)| {
                let n = self.n.get(key).copied().unwrap_or(0).max(1) as f64;
                (key.clone(), tot / n)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tot.is_empty() && self.n.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_accumulates_sum_and_count() {
        let mut agg = FieldAggregate::default();
        agg.bump("orwell", 5.0);
        agg.bump("orwell", 4.0);
        agg.bump("huxley", 3.0);
        assert_eq!(agg.tot["orwell"], 9.0);
        assert_eq!(agg.n["orwell"], 2);
        assert_eq!(agg.n["huxley"], 1);
    }

    #[test]
    fn affinity_is_average_per_key() {
        let mut agg = FieldAggregate::default();
        agg.bump("orwell", 5.0);
        agg.bump("orwell", 4.0);
        let aff = agg.affinity();
        assert!((aff["orwell"] - 4.5).abs() < 1e-12);
    }

    #[test]
    fn affinity_tolerates_missing_count() {
        // A zero/absent count divides by 1 instead of erroring.
        let agg = FieldAggregate {
            tot: HashMap::from([("x".to_string(), 2.0)]),
            n: HashMap::new(),
        };
        assert_eq!(agg.affinity()["x"], 2.0);
    }
}
