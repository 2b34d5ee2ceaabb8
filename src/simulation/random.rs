//! Injected randomness
//!
//! Every random draw in a run (engagement times, page choices, jitter,
//! synthetic client IDs) goes through one [`RandomSource`]. Seeding it makes a
//! run's draws reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Cloneable, thread-safe handle to a seeded generator
///
/// The lock is only held for the duration of a single draw, never across an
/// await point.
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: Arc<Mutex<StdRng>>,
}

impl RandomSource {
    /// Deterministic source
    pub fn seeded(seed: u64) -> Self {
        debug!("Using deterministic seed: {}", seed);
        Self { rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))) }
    }

    /// Entropy-seeded source
    pub fn from_entropy() -> Self {
        Self { rng: Arc::new(Mutex::new(StdRng::from_entropy())) }
    }

    /// Seeded when a seed is given, entropy otherwise
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // A poisoned generator is still a valid generator
        let mut guard = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// Uniform draw from `[low, high]`; returns `low` when the bounds are inverted
    pub fn range_u64(&self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        self.with_rng(|rng| rng.gen_range(low..=high))
    }

    /// Uniform draw from `[low, high]`; returns `low` when the bounds are inverted
    pub fn range_u32(&self, low: u32, high: u32) -> u32 {
        if high <= low {
            return low;
        }
        self.with_rng(|rng| rng.gen_range(low..=high))
    }

    /// Uniform duration between two bounds given in milliseconds
    pub fn duration_ms(&self, low: u64, high: u64) -> Duration {
        Duration::from_millis(self.range_u64(low, high))
    }

    /// Uniformly chosen element, `None` for an empty slice
    pub fn choose<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.with_rng(|rng| rng.gen_range(0..items.len()));
        items.get(idx)
    }

    /// Ten-digit decimal suffix used in synthesized client IDs
    pub fn client_suffix(&self) -> u64 {
        self.range_u64(1_000_000_000, 9_999_999_999)
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_sources_agree() {
        let a = RandomSource::seeded(7);
        let b = RandomSource::seeded(7);
        for _ in 0..20 {
            assert_eq!(a.range_u64(0, 1_000_000), b.range_u64(0, 1_000_000));
        }
    }

    #[test]
    fn test_clones_share_state() {
        let a = RandomSource::seeded(11);
        let b = a.clone();
        let reference = RandomSource::seeded(11);

        let first = a.range_u64(0, u64::MAX - 1);
        let second = b.range_u64(0, u64::MAX - 1);
        assert_eq!(first, reference.range_u64(0, u64::MAX - 1));
        assert_eq!(second, reference.range_u64(0, u64::MAX - 1));
    }

    #[test]
    fn test_ranges_are_inclusive_and_tolerate_degenerate_bounds() {
        let rng = RandomSource::seeded(3);
        for _ in 0..200 {
            let v = rng.range_u32(2, 4);
            assert!((2..=4).contains(&v));
        }
        assert_eq!(rng.range_u64(5, 5), 5);
        assert_eq!(rng.range_u64(9, 1), 9);
        assert_eq!(rng.duration_ms(30, 30), Duration::from_millis(30));
    }

    #[test]
    fn test_choose_and_suffix() {
        let rng = RandomSource::seeded(5);
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());
        assert!(["a", "b"].contains(rng.choose(&["a", "b"]).unwrap()));

        let suffix = rng.client_suffix();
        assert_eq!(suffix.to_string().len(), 10);
    }
}
