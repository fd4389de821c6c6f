//! Small shared helpers.
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Seed a [`SmallRng`]. A seed of `0` falls back to OS entropy, for
/// callers that didn't ask for a reproducible run.
pub fn create_rng(seed: u64) -> SmallRng {
    if seed == 0 {
        SmallRng::from_entropy()
    } else {
        SmallRng::seed_from_u64(seed)
    }
}
