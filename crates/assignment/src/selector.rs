//! Weighted-random variant selection.

use paywall_core::error::{ConfigError, ConfigResult};
use paywall_core::types::{Variant, VariantOption};
use rand::Rng;

/// Source of uniform draws for variant selection. Substituting this is how
/// tests pin selection without patching anything global.
pub trait Randomiser: Send + Sync {
    /// Uniform draw in `[0, upper)`. Callers guarantee `upper > 0`.
    fn next_in(&self, upper: u32) -> u32;
}

/// Production randomiser over the thread-local RNG.
#[derive(Default)]
pub struct ThreadRngRandomiser;

impl Randomiser for ThreadRngRandomiser {
    fn next_in(&self, upper: u32) -> u32 {
        rand::thread_rng().gen_range(0..upper)
    }
}

/// Picks one option, weighted by `percentage`.
///
/// The weight space `[0, sum)` is partitioned into contiguous half-open
/// ranges in list order; the draw selects the owning range. An all-zero
/// weight list deterministically yields the first option — a defined
/// fallback, not an error. Selection frequency converges to
/// `percentage / sum` under a uniform randomiser.
pub fn choose_variant(
    options: &[VariantOption],
    randomiser: &dyn Randomiser,
) -> ConfigResult<Variant> {
    let Some(first) = options.first() else {
        return Err(ConfigError::NoVariantsFound);
    };
    if options.len() == 1 {
        return Ok(first.to_variant());
    }

    let sum: u32 = options.iter().map(|o| o.percentage).sum();
    if sum == 0 {
        return Ok(first.to_variant());
    }

    let threshold = randomiser.next_in(sum);
    let mut cumulative = 0u32;
    for option in options {
        cumulative += option.percentage;
        if threshold < cumulative {
            return Ok(option.to_variant());
        }
    }

    // Unreachable while the draw stays inside [0, sum).
    Err(ConfigError::InvalidState)
}
