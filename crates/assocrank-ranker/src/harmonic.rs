//! Bounded harmonic-weighted sum.
//!
//! Keeps only the top `buffer` scores seen so memory and sort cost stay
//! fixed no matter how much evidence a key has. The result is
//! Σ value_i / rank_i over the retained values sorted descending.

/// Default number of retained scores per datasource.
pub const DEFAULT_BUFFER: usize = 1000;

/// Harmonic-weighted sum of `values`: sort descending, divide by 1-based rank.
/// Zeros contribute nothing regardless of rank.
pub fn harmonic_sum(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    sorted
        .iter()
        .enumerate()
        .map(|(i, v)| v / (i + 1) as f64)
        .sum()
}

/// Running top-K reducer. `add` is O(buffer) because of the min rescan.
#[derive(Debug, Clone)]
pub struct HarmonicSumScorer {
    data: Vec<f64>,
    min: f64,
    total: u64,
}

impl HarmonicSumScorer {
    pub fn new(buffer: usize) -> Self {
        let mut scorer = Self {
            data: vec![0.0; buffer],
            min: 0.0,
            total: 0,
        };
        scorer.refresh();
        scorer
    }

    /// Offer a score. Scores not above the current minimum are counted but
    /// do not change the result.
    pub fn add(&mut self, score: f64) {
        self.total += 1;
        if score > self.min {
            let min = self.min;
            if let Some(slot) = self.data.iter_mut().find(|v| **v == min) {
                *slot = score;
            }
            self.refresh();
        }
    }

    fn refresh(&mut self) {
        self.min = self.data.iter().copied().fold(f64::INFINITY, f64::min);
    }

    pub fn score(&self) -> f64 {
        harmonic_sum(&self.data)
    }

    /// Every score ever offered, retained or not.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Non-zero retained values, largest first.
    pub fn retained(&self) -> Vec<f64> {
        let mut kept: Vec<f64> = self.data.iter().copied().filter(|v| *v > 0.0).collect();
        kept.sort_by(|a, b| b.total_cmp(a));
        kept
    }
}

impl Default for HarmonicSumScorer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_top_three_of_five() {
        let mut h = HarmonicSumScorer::new(3);
        for s in [5.0, 4.0, 3.0, 2.0, 1.0] {
            h.add(s);
        }
        assert_eq!(h.retained(), vec![5.0, 4.0, 3.0]);
        // 5/1 + 4/2 + 3/3
        assert!((h.score() - 8.0).abs() < 1e-12);
        assert_eq!(h.total(), 5);
    }

    #[test]
    fn test_ascending_overflow_keeps_top_b() {
        let mut h = HarmonicSumScorer::new(3);
        for s in [1.0, 2.0, 3.0, 4.0] {
            h.add(s);
        }
        assert_eq!(h.retained(), vec![4.0, 3.0, 2.0]);
        assert_eq!(h.capacity(), 3);
    }

    #[test]
    fn test_underfilled_buffer_zero_slots_are_harmless() {
        let mut h = HarmonicSumScorer::new(1000);
        h.add(0.9);
        h.add(0.4);
        assert!((h.score() - (0.9 + 0.4 / 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_discarded_scores_still_counted() {
        let mut h = HarmonicSumScorer::new(2);
        h.add(0.8);
        h.add(0.9);
        h.add(0.1);
        assert_eq!(h.total(), 3);
        assert_eq!(h.retained(), vec![0.9, 0.8]);
    }

    #[test]
    fn test_zero_capacity_never_panics() {
        let mut h = HarmonicSumScorer::new(0);
        h.add(0.5);
        assert_eq!(h.score(), 0.0);
        assert_eq!(h.total(), 1);
    }

    #[test]
    fn test_bounded_buffer_matches_exact_top_k() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let values: Vec<f64> = (0..200).map(|_| rng.gen_range(0.0..1.0)).collect();
            let mut h = HarmonicSumScorer::new(25);
            for v in &values {
                h.add(*v);
            }
            let mut sorted = values.clone();
            sorted.sort_by(|a, b| b.total_cmp(a));
            sorted.truncate(25);
            assert!(h.retained().len() <= 25);
            assert!((h.score() - harmonic_sum(&sorted)).abs() < 1e-9);
        }
    }
}
