//! Randomness for hazard placement, forced-loss turns and reshuffle counts.
//!
//! Hazard positions carry direct monetary value, so the production source
//! draws from the operating system CSPRNG. `SeededRandom` and `ScriptedRandom`
//! are reproducible and only meant for simulation and tests.

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use rand_core::OsRng;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Uniform, unbiased random draws used by the round engine
pub trait RandomSource: Send + Sync {
    /// Sample `count` distinct values from `candidates` without replacement.
    /// Returns fewer than `count` values only if `candidates` is too small.
    fn sample_distinct(&self, candidates: &[u8], count: usize) -> Vec<u8>;

    /// Uniform integer in `low..=high`
    fn uniform_inclusive(&self, low: u8, high: u8) -> u8;
}

/// Operating system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn sample_distinct(&self, candidates: &[u8], count: usize) -> Vec<u8> {
        let mut rng = OsRng;
        candidates.choose_multiple(&mut rng, count).copied().collect()
    }

    fn uniform_inclusive(&self, low: u8, high: u8) -> u8 {
        if low >= high {
            return low;
        }
        OsRng.gen_range(low..=high)
    }
}

/// Deterministic source seeded from a `u64`
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn sample_distinct(&self, candidates: &[u8], count: usize) -> Vec<u8> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        candidates.choose_multiple(&mut *rng, count).copied().collect()
    }

    fn uniform_inclusive(&self, low: u8, high: u8) -> u8 {
        if low >= high {
            return low;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(low..=high)
    }
}

/// Replays scripted draws in order. Once a script runs dry, samples fall
/// back to the first candidates and integers to the low end of the range.
pub struct ScriptedRandom {
    samples: Mutex<VecDeque<Vec<u8>>>,
    integers: Mutex<VecDeque<u8>>,
}

impl ScriptedRandom {
    pub fn new(samples: Vec<Vec<u8>>, integers: Vec<u8>) -> Self {
        Self {
            samples: Mutex::new(samples.into()),
            integers: Mutex::new(integers.into()),
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn sample_distinct(&self, candidates: &[u8], count: usize) -> Vec<u8> {
        let scripted = self
            .samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        scripted.unwrap_or_else(|| candidates.iter().copied().take(count).collect())
    }

    fn uniform_inclusive(&self, low: u8, _high: u8) -> u8 {
        self.integers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or(low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sample_distinct_is_distinct_and_in_candidates() {
        let source = OsRandom;
        let candidates: Vec<u8> = (0..25).collect();
        for count in [1usize, 3, 12, 24, 25] {
            let sample = source.sample_distinct(&candidates, count);
            let unique: HashSet<_> = sample.iter().collect();
            assert_eq!(sample.len(), count);
            assert_eq!(unique.len(), count);
            assert!(sample.iter().all(|c| candidates.contains(c)));
        }
    }

    #[test]
    fn test_sample_respects_restricted_candidates() {
        let source = SeededRandom::new(7);
        let candidates = vec![3u8, 9, 14, 20];
        let sample = source.sample_distinct(&candidates, 10);
        assert_eq!(sample.len(), 4);
        assert!(sample.iter().all(|c| candidates.contains(c)));
    }

    #[test]
    fn test_uniform_inclusive_covers_range() {
        let source = SeededRandom::new(42);
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let value = source.uniform_inclusive(2, 4);
            assert!((2..=4).contains(&value));
            seen.insert(value);
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(OsRandom.uniform_inclusive(3, 3), 3);
    }

    #[test]
    fn test_seeded_source_is_reproducible() {
        let candidates: Vec<u8> = (0..25).collect();
        let a = SeededRandom::new(99).sample_distinct(&candidates, 5);
        let b = SeededRandom::new(99).sample_distinct(&candidates, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_scripted_source_replays_then_falls_back() {
        let source = ScriptedRandom::new(vec![vec![4, 9]], vec![3]);
        assert_eq!(source.sample_distinct(&[1, 2, 3], 2), vec![4, 9]);
        assert_eq!(source.sample_distinct(&[1, 2, 3], 2), vec![1, 2]);
        assert_eq!(source.uniform_inclusive(2, 4), 3);
        assert_eq!(source.uniform_inclusive(2, 4), 2);
    }

    #[test]
    fn test_placement_is_roughly_uniform() {
        let source = OsRandom;
        let candidates: Vec<u8> = (0..25).collect();
        let mut counts = [0u32; 25];
        let trials = 20_000;
        for _ in 0..trials {
            for cell in source.sample_distinct(&candidates, 5) {
                counts[cell as usize] += 1;
            }
        }
        // Expected hits per cell: trials * 5 / 25 = 4000
        for count in counts {
            assert!((3_400..=4_600).contains(&count), "cell hit {} times", count);
        }
    }
}
