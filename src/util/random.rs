use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};


/// Source of randomness for sequence numbers. Sessions draw their initial sequence number from
///  this, and segments without an explicit sequence number get a random one.
///
/// This is a trait (rather than calling `rand` directly) so that tests can either mock it or use
///  a seeded implementation and assert exact sequence ranges.
#[cfg_attr(test, mockall::automock)]
pub trait SequenceRandom: Send {
    fn next_u32(&mut self) -> u32;

    /// a value in `0..=max`
    fn gen_u32_inclusive(&mut self, max: u32) -> u32;
}

pub struct RngSequenceRandom {
    rng: StdRng,
}
impl RngSequenceRandom {
    pub fn new() -> RngSequenceRandom {
        RngSequenceRandom {
            rng: StdRng::from_entropy(),
        }
    }

    /// deterministic sequence of values for a given seed
    pub fn seeded(seed: u64) -> RngSequenceRandom {
        RngSequenceRandom {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}
impl Default for RngSequenceRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceRandom for RngSequenceRandom {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn gen_u32_inclusive(&mut self, max: u32) -> u32 {
        self.rng.gen_range(0..=max)
    }
}
