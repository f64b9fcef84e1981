//! Seeded index sampling compatible with NumPy's legacy `RandomState`
//!
//! The initial centroids are picked with `RandomState(seed).choice(n, k, replace=False)`
//! semantics so that a seed selects the same rows NumPy would: a 32-bit Mersenne
//! Twister seeded with `init_genrand`, a backward Fisher-Yates permutation of `0..n`
//! driven by masked rejection sampling, and the first `k` entries of that permutation.

use rand::{Error, RngCore};

const N: usize = 624;
const M: usize = 397;
const MATRIX_A: u32 = 0x9908_b0df;
const UPPER_MASK: u32 = 0x8000_0000;
const LOWER_MASK: u32 = 0x7fff_ffff;

/// 32-bit Mersenne Twister (MT19937)
#[derive(Clone)]
pub struct Mt19937 {
    state: [u32; N],
    index: usize,
}

impl std::fmt::Debug for Mt19937 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mt19937").field("index", &self.index).finish()
    }
}

impl Mt19937 {
    /// Seed with the reference `init_genrand` routine
    pub fn new(seed: u32) -> Self {
        let mut state = [0u32; N];
        state[0] = seed;
        for i in 1..N {
            let prev = state[i - 1];
            state[i] = 1_812_433_253u32
                .wrapping_mul(prev ^ (prev >> 30))
                .wrapping_add(i as u32);
        }
        Self { state, index: N }
    }

    fn twist(&mut self) {
        for i in 0..N {
            let y = (self.state[i] & UPPER_MASK) | (self.state[(i + 1) % N] & LOWER_MASK);
            let mut next = self.state[(i + M) % N] ^ (y >> 1);
            if y & 1 != 0 {
                next ^= MATRIX_A;
            }
            self.state[i] = next;
        }
        self.index = 0;
    }

    fn next_tempered(&mut self) -> u32 {
        if self.index >= N {
            self.twist();
        }
        let mut y = self.state[self.index];
        self.index += 1;

        y ^= y >> 11;
        y ^= (y << 7) & 0x9d2c_5680;
        y ^= (y << 15) & 0xefc6_0000;
        y ^ (y >> 18)
    }
}

impl RngCore for Mt19937 {
    fn next_u32(&mut self) -> u32 {
        self.next_tempered()
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.next_tempered() as u64;
        let lo = self.next_tempered() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_tempered().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Uniform integer in `0..=max` by masked rejection
pub fn bounded_interval<R: RngCore>(rng: &mut R, max: u64) -> u64 {
    if max == 0 {
        return 0;
    }

    let mut mask = max;
    mask |= mask >> 1;
    mask |= mask >> 2;
    mask |= mask >> 4;
    mask |= mask >> 8;
    mask |= mask >> 16;
    mask |= mask >> 32;

    if max <= u32::MAX as u64 {
        loop {
            let value = rng.next_u32() as u64 & mask;
            if value <= max {
                return value;
            }
        }
    } else {
        loop {
            let value = rng.next_u64() & mask;
            if value <= max {
                return value;
            }
        }
    }
}

/// Random permutation of `0..n` (backward Fisher-Yates)
pub fn permutation<R: RngCore>(rng: &mut R, n: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = bounded_interval(rng, i as u64) as usize;
        indices.swap(i, j);
    }
    indices
}

/// `k` distinct indices from `0..n`, in draw order
///
/// Returns `None` when `k > n`.
pub fn choice_without_replacement<R: RngCore>(rng: &mut R, n: usize, k: usize) -> Option<Vec<usize>> {
    if k > n {
        return None;
    }
    let mut indices = permutation(rng, n);
    indices.truncate(k);
    Some(indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_output() {
        // first output of the reference implementation for its default seed
        let mut rng = Mt19937::new(5489);
        assert_eq!(rng.next_u32(), 3_499_211_612);

        let mut rng = Mt19937::new(74);
        let outputs: Vec<u32> = (0..3).map(|_| rng.next_u32()).collect();
        assert_eq!(outputs, vec![868_452_254, 1_806_447_451, 3_369_606_281]);
    }

    #[test]
    fn test_permutation_matches_legacy_numpy() {
        let mut rng = Mt19937::new(0);
        assert_eq!(permutation(&mut rng, 10), vec![2, 8, 4, 9, 1, 6, 7, 3, 0, 5]);
    }

    #[test]
    fn test_choice_with_seed_74() {
        let cases: [(usize, [usize; 3]); 6] = [
            (3, [0, 1, 2]),
            (5, [2, 0, 4]),
            (6, [5, 0, 2]),
            (10, [0, 5, 7]),
            (20, [0, 1, 17]),
            (30, [21, 26, 18]),
        ];
        for (n, expected) in cases {
            let mut rng = Mt19937::new(74);
            let picked = choice_without_replacement(&mut rng, n, 3).unwrap();
            assert_eq!(picked, expected.to_vec(), "n = {}", n);
        }
    }

    #[test]
    fn test_choice_larger_than_population() {
        let mut rng = Mt19937::new(74);
        assert_eq!(choice_without_replacement(&mut rng, 2, 3), None);
    }

    proptest! {
        #[test]
        fn choice_is_distinct_and_in_range(seed in any::<u32>(), n in 3usize..500) {
            let mut rng = Mt19937::new(seed);
            let picked = choice_without_replacement(&mut rng, n, 3).unwrap();
            prop_assert_eq!(picked.len(), 3);
            prop_assert!(picked.iter().all(|&i| i < n));
            prop_assert!(picked[0] != picked[1] && picked[1] != picked[2] && picked[0] != picked[2]);
        }

        #[test]
        fn bounded_interval_stays_in_range(seed in any::<u32>(), max in 0u64..10_000) {
            let mut rng = Mt19937::new(seed);
            prop_assert!(bounded_interval(&mut rng, max) <= max);
        }
    }
}
