//! Randomized backoff for retryable failures.
//!
//! Many workflows are retried by the same driver at once; a fixed delay would
//! line their retries up into bursts. Delays are therefore drawn uniformly from
//! a per-class window. The randomness source is injected so tests can pin it.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ErrorClass;

// =============================================================================
// Jitter Sources
// =============================================================================

/// Source of uniformly distributed delays.
pub trait JitterSource: Send + Sync {
    /// Returns a value in `min..=max`.
    fn between(&self, min: u32, max: u32) -> u32;
}

/// Thread-local RNG; the production source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn between(&self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        rand::rng().random_range(min..=max)
    }
}

/// Deterministic RNG seeded at construction.
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn between(&self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.random_range(min..=max)
    }
}

/// Always picks one end of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedJitter {
    Min,
    Max,
}

impl JitterSource for FixedJitter {
    fn between(&self, min: u32, max: u32) -> u32 {
        match self {
            FixedJitter::Min => min,
            FixedJitter::Max => max.max(min),
        }
    }
}

// =============================================================================
// Bounds
// =============================================================================

/// How heavy the backend call that failed was.
///
/// Throttling on mutations indicates sustained contention and backs off
/// longer than throttling on reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationWeight {
    #[default]
    Mutation,
    Light,
}

/// Inclusive delay window in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min_secs: u32,
    pub max_secs: u32,
}

impl Bounds {
    pub const fn new(min_secs: u32, max_secs: u32) -> Self {
        Self { min_secs, max_secs }
    }

    /// Returns true if `secs` lies inside the window.
    pub fn contains(&self, secs: u32) -> bool {
        (self.min_secs..=self.max_secs).contains(&secs)
    }
}

/// Delay windows per retryable class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffBounds {
    /// Throttling or conflict on a mutating call.
    pub throttled_mutation: Bounds,

    /// Throttling or conflict on a list/describe call.
    pub throttled_light: Bounds,

    /// Transient server error.
    pub transient: Bounds,
}

impl Default for BackoffBounds {
    fn default() -> Self {
        Self {
            throttled_mutation: Bounds::new(60, 300),
            throttled_light: Bounds::new(40, 70),
            transient: Bounds::new(5, 100),
        }
    }
}

impl BackoffBounds {
    /// Returns the window for a class, or `None` for terminal classes.
    pub fn for_class(&self, class: ErrorClass, weight: OperationWeight) -> Option<Bounds> {
        match (class, weight) {
            (ErrorClass::Throttled, OperationWeight::Mutation) => Some(self.throttled_mutation),
            (ErrorClass::Throttled, OperationWeight::Light) => Some(self.throttled_light),
            (ErrorClass::Transient, _) => Some(self.transient),
            _ => None,
        }
    }
}

// =============================================================================
// Policy
// =============================================================================

/// Backoff policy: bounds plus a jitter source.
pub struct BackoffPolicy {
    bounds: BackoffBounds,
    jitter: Box<dyn JitterSource>,
}

impl std::fmt::Debug for BackoffPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackoffPolicy")
            .field("bounds", &self.bounds)
            .field("jitter", &"<jitter>")
            .finish()
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(BackoffBounds::default(), ThreadRngJitter)
    }
}

impl BackoffPolicy {
    pub fn new(bounds: BackoffBounds, jitter: impl JitterSource + 'static) -> Self {
        Self {
            bounds,
            jitter: Box::new(jitter),
        }
    }

    pub fn bounds(&self) -> &BackoffBounds {
        &self.bounds
    }

    /// Draws a delay for a retryable class; `None` for terminal classes.
    pub fn delay_for(&self, class: ErrorClass, weight: OperationWeight) -> Option<u32> {
        let window = self.bounds.for_class(class, weight)?;
        Some(self.jitter.between(window.min_secs, window.max_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_jitter_hits_exact_bounds() {
        let low = BackoffPolicy::new(BackoffBounds::default(), FixedJitter::Min);
        let high = BackoffPolicy::new(BackoffBounds::default(), FixedJitter::Max);

        assert_eq!(low.delay_for(ErrorClass::Throttled, OperationWeight::Mutation), Some(60));
        assert_eq!(high.delay_for(ErrorClass::Throttled, OperationWeight::Mutation), Some(300));
        assert_eq!(low.delay_for(ErrorClass::Throttled, OperationWeight::Light), Some(40));
        assert_eq!(high.delay_for(ErrorClass::Throttled, OperationWeight::Light), Some(70));
        assert_eq!(low.delay_for(ErrorClass::Transient, OperationWeight::Mutation), Some(5));
        assert_eq!(high.delay_for(ErrorClass::Transient, OperationWeight::Light), Some(100));
    }

    #[test]
    fn test_terminal_classes_have_no_delay() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(ErrorClass::NotFound, OperationWeight::Mutation), None);
        assert_eq!(policy.delay_for(ErrorClass::Unknown, OperationWeight::Light), None);
    }

    #[test]
    fn test_random_delays_stay_in_bounds() {
        let policy = BackoffPolicy::default();
        let bounds = BackoffBounds::default();
        for _ in 0..500 {
            let d = policy
                .delay_for(ErrorClass::Throttled, OperationWeight::Mutation)
                .unwrap();
            assert!(bounds.throttled_mutation.contains(d), "{d} out of bounds");
            let d = policy
                .delay_for(ErrorClass::Transient, OperationWeight::Mutation)
                .unwrap();
            assert!(bounds.transient.contains(d), "{d} out of bounds");
        }
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let a = SeededJitter::new(42);
        let b = SeededJitter::new(42);
        let xs: Vec<u32> = (0..20).map(|_| a.between(5, 100)).collect();
        let ys: Vec<u32> = (0..20).map(|_| b.between(5, 100)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_degenerate_window() {
        assert_eq!(ThreadRngJitter.between(7, 7), 7);
        assert_eq!(SeededJitter::new(1).between(9, 3), 9);
    }
}
