//! Seam jitter for physics sub-passes.
//!
//! One draw per sub-pass, shared by all three axes. Hash-based and
//! seedable so a tick schedule can be replayed in tests.

/// Stateful jitter source. Each draw advances a counter hashed with the seed.
#[derive(Debug, Clone)]
pub struct SeamJitter {
    seed: u32,
    draws: u32,
}

impl SeamJitter {
    pub fn new(seed: u32) -> Self {
        Self { seed, draws: 0 }
    }

    /// Seed from the wall clock.
    pub fn from_time() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
            .unwrap_or(0);
        log::debug!("Seam jitter seeded with {nanos:#x}");
        Self::new(nanos)
    }

    /// Draw an integer in `[0, bound - 1]`. A zero bound always yields 0.
    pub fn next_below(&mut self, bound: u32) -> u32 {
        let h = mix(self.seed, self.draws);
        self.draws = self.draws.wrapping_add(1);
        if bound == 0 {
            0
        } else {
            h % bound
        }
    }
}

/// PCG-style integer mix of a seed and a counter.
fn mix(seed: u32, counter: u32) -> u32 {
    let mut state = seed
        .wrapping_mul(0x9E3779B9)
        .wrapping_add(counter.wrapping_mul(0x2545F491));

    state = state ^ (state >> 16);
    state = state.wrapping_mul(0x45D9F3B);
    state = state ^ (state >> 16);
    state = state.wrapping_mul(0x45D9F3B);
    state = state ^ (state >> 16);

    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draws_in_range() {
        let mut jitter = SeamJitter::new(99);
        for _ in 0..10_000 {
            assert!(jitter.next_below(16) < 16);
        }
        assert_eq!(jitter.next_below(1), 0);
        assert_eq!(jitter.next_below(0), 0);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SeamJitter::new(5);
        let mut b = SeamJitter::new(5);
        for _ in 0..64 {
            assert_eq!(a.next_below(16), b.next_below(16));
        }
    }

    #[test]
    fn test_covers_whole_range() {
        let mut jitter = SeamJitter::new(1);
        let mut seen = [false; 16];
        for _ in 0..1000 {
            seen[jitter.next_below(16) as usize] = true;
        }
        assert!(seen.iter().all(|&s| s), "some jitter values never drawn: {seen:?}");
    }

    #[test]
    fn test_distribution() {
        let mut jitter = SeamJitter::new(1234);
        let low = (0..10_000).filter(|_| jitter.next_below(16) < 8).count();
        let frac = low as f32 / 10_000.0;
        assert!(frac > 0.4 && frac < 0.6, "poor distribution: {frac}");
    }
}
