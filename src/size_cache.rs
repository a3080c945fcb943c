//! Offset / index / total-size queries over fixed or variable per-item sizes.
//!
//! Two variants, matching §4.1: a uniform cache does O(1) arithmetic; a
//! variable cache holds a fully materialized prefix-sum array rebuilt on
//! every `rebuild`, and answers `index_at` with a binary search.

use crate::error::ConfigError;

/// A function producing the declared (not measured) size of an item by index.
pub type SizeFn = std::rc::Rc<dyn Fn(usize) -> f64>;

/// Offset / index / total-size queries over a sequence of `n` item sizes.
#[derive(Clone)]
pub enum SizeCache {
    /// All items share one size; every query is O(1).
    Uniform {
        /// Per-item size in pixels.
        size: f64,
        /// Item count.
        n: usize,
    },
    /// Per-item sizes given by a function, snapshotted into a prefix-sum
    /// array on `rebuild`. `index_at` is O(log n).
    Variable {
        /// `f(i)` is only consulted by `rebuild`; subsequent queries read
        /// `offsets`.
        f: SizeFn,
        /// `offsets[i]` is the offset of item `i`; `offsets.len() == n + 1`,
        /// with `offsets[n]` equal to the total size.
        offsets: Vec<f64>,
    },
}

impl std::fmt::Debug for SizeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uniform { size, n } => f.debug_struct("Uniform").field("size", size).field("n", n).finish(),
            Self::Variable { offsets, .. } => f
                .debug_struct("Variable")
                .field("n", &offsets.len().saturating_sub(1))
                .field("total_size", &offsets.last().copied().unwrap_or(0.0))
                .finish_non_exhaustive(),
        }
    }
}

impl SizeCache {
    /// Construct a uniform cache of `n` items, each `size` pixels.
    pub fn uniform(size: f64, n: usize) -> Self { Self::Uniform { size, n } }

    /// Construct a variable cache, immediately rebuilding for `n` items.
    pub fn variable(f: SizeFn, n: usize) -> Result<Self, ConfigError> {
        let mut cache = Self::Variable { f, offsets: vec![0.0] };
        cache.rebuild(n)?;
        Ok(cache)
    }

    /// Whether this is a [`SizeCache::Variable`] cache.
    pub fn is_variable(&self) -> bool { matches!(self, Self::Variable { .. }) }

    /// Number of items the cache currently covers.
    pub fn total(&self) -> usize {
        match self {
            Self::Uniform { n, .. } => *n,
            Self::Variable { offsets, .. } => offsets.len() - 1,
        }
    }

    /// Total pixel size spanned by all items.
    pub fn total_size(&self) -> f64 {
        match self {
            Self::Uniform { size, n } => size * (*n as f64),
            Self::Variable { offsets, .. } => *offsets.last().unwrap_or(&0.0),
        }
    }

    /// Pixel size of item `i`. Panics if `i >= total()`; callers are
    /// expected to have already range-checked against `total()`.
    pub fn size(&self, i: usize) -> f64 {
        match self {
            Self::Uniform { size, .. } => *size,
            Self::Variable { offsets, .. } => offsets[i + 1] - offsets[i],
        }
    }

    /// Prefix offset of item `i`, i.e. the sum of sizes of items `0..i`.
    /// `offset(total())` is defined and equals `total_size()`.
    pub fn offset(&self, i: usize) -> f64 {
        match self {
            Self::Uniform { size, .. } => size * (i as f64),
            Self::Variable { offsets, .. } => offsets[i],
        }
    }

    /// Index whose span `[offset(i), offset(i+1))` contains `y`.
    ///
    /// Clamps: negative `y` maps to `0`; `y >= total_size()` maps to the
    /// last index; an empty cache maps to `0`.
    pub fn index_at(&self, y: f64) -> usize {
        let n = self.total();
        if n == 0 {
            return 0;
        }
        if y <= 0.0 {
            return 0;
        }
        match self {
            Self::Uniform { size, .. } => {
                if *size <= 0.0 {
                    return 0;
                }
                let idx = (y / size).floor() as i64;
                idx.clamp(0, n as i64 - 1) as usize
            }
            Self::Variable { offsets, .. } => {
                if y >= *offsets.last().unwrap() {
                    return n - 1;
                }
                // Binary search for the last offset <= y.
                let mut lo = 0usize;
                let mut hi = n; // offsets[n] is total_size, already handled above
                while lo + 1 < hi {
                    let mid = lo + (hi - lo) / 2;
                    if offsets[mid] <= y {
                        lo = mid;
                    } else {
                        hi = mid;
                    }
                }
                lo
            }
        }
    }

    /// Recompute the cache for `n` items. Idempotent: rebuilding twice with
    /// the same `n` produces identical offsets.
    pub fn rebuild(&mut self, n: usize) -> Result<(), ConfigError> {
        match self {
            Self::Uniform { n: cur, .. } => {
                *cur = n;
                Ok(())
            }
            Self::Variable { f, offsets } => {
                let mut new_offsets = Vec::with_capacity(n + 1);
                new_offsets.push(0.0);
                let mut acc = 0.0f64;
                for i in 0..n {
                    let size = f(i);
                    if !size.is_finite() || size <= 0.0 {
                        return Err(ConfigError::InvalidSize { index: i, value: size });
                    }
                    acc += size;
                    new_offsets.push(acc);
                }
                *offsets = new_offsets;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_is_o1_and_consistent() {
        let cache = SizeCache::uniform(40.0, 100);
        assert_eq!(cache.offset(0), 0.0);
        assert_eq!(cache.offset(100), 4000.0);
        assert_eq!(cache.total_size(), 4000.0);
        for i in 0..100 {
            assert_eq!(cache.index_at(cache.offset(i)), i);
        }
    }

    #[test]
    fn variable_offsets_match_s3() {
        let sizes = [10.0, 20.0, 30.0, 40.0, 50.0];
        let cache = SizeCache::variable(std::rc::Rc::new(move |i| sizes[i]), 5).unwrap();
        let expected_offsets = [0.0, 10.0, 30.0, 60.0, 100.0, 150.0];
        for i in 0..=5 {
            assert_eq!(cache.offset(i), expected_offsets[i]);
        }
        assert_eq!(cache.total_size(), 150.0);
        assert_eq!(cache.index_at(0.0), 0);
        assert_eq!(cache.index_at(9.0), 0);
        assert_eq!(cache.index_at(10.0), 1);
        assert_eq!(cache.index_at(29.0), 1);
        assert_eq!(cache.index_at(30.0), 2);
        assert_eq!(cache.index_at(149.0), 4);
    }

    #[test]
    fn index_at_clamps_out_of_range() {
        let cache = SizeCache::uniform(10.0, 5);
        assert_eq!(cache.index_at(-100.0), 0);
        assert_eq!(cache.index_at(1_000_000.0), 4);
        let empty = SizeCache::uniform(10.0, 0);
        assert_eq!(empty.index_at(50.0), 0);
    }

    #[test]
    fn invariants_hold_for_arbitrary_variable_sizes() {
        let f = |i: usize| 1.0 + (i % 7) as f64 * 3.5;
        let cache = SizeCache::variable(std::rc::Rc::new(f), 257).unwrap();
        assert_eq!(cache.offset(0), 0.0);
        assert_eq!(cache.offset(257), cache.total_size());
        let mut prev = cache.offset(0);
        for i in 1..=257 {
            let cur = cache.offset(i);
            assert!(cur >= prev);
            prev = cur;
        }
        for i in 0..257 {
            assert_eq!(cache.index_at(cache.offset(i)), i);
        }
        let total = cache.total_size();
        let mut y = 0.0;
        while y < total {
            let idx = cache.index_at(y);
            assert!(cache.offset(idx) <= y);
            assert!(y < cache.offset(idx + 1));
            y += 3.3;
        }
    }

    #[test]
    fn rebuild_is_idempotent() {
        let f = |i: usize| 5.0 + i as f64;
        let mut cache = SizeCache::variable(std::rc::Rc::new(f), 10).unwrap();
        let once: Vec<f64> = (0..=10).map(|i| cache.offset(i)).collect();
        cache.rebuild(10).unwrap();
        let twice: Vec<f64> = (0..=10).map(|i| cache.offset(i)).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn rebuild_rejects_non_positive_size() {
        let mut cache = SizeCache::variable(std::rc::Rc::new(|_| 10.0), 3).unwrap();
        let bad = cache.rebuild_with(std::rc::Rc::new(|i| if i == 1 { 0.0 } else { 10.0 }), 3);
        assert!(bad.is_err());
        // Original cache (post successful rebuild) is unaffected by the failed attempt.
        assert_eq!(cache.total(), 3);
    }

    impl SizeCache {
        /// Test helper: swap the size function and rebuild in one step.
        fn rebuild_with(&mut self, f: SizeFn, n: usize) -> Result<(), ConfigError> {
            if let Self::Variable { f: slot, .. } = self {
                *slot = f;
            }
            self.rebuild(n)
        }
    }
}
