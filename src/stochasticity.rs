/*!
Seeded random sub-streams.

There is no shared mutable generator in the model. Every random draw comes
from a ChaCha stream whose key is a pure function of the global seed, the
owner of the draw (a matched pair or a single agent), the season and the
purpose of the draw. The order in which agents are processed, sequentially or
on the rayon pool, therefore never changes any drawn value.

```rust
use model::stochasticity::{substream, DrawPurpose};
use rand::Rng;

let mut a = substream(42, 3, 7, DrawPurpose::YieldVariability);
let mut b = substream(42, 3, 7, DrawPurpose::YieldVariability);
assert_eq!(a.gen::<u64>(), b.gen::<u64>());
```
*/
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};
use serde_derive::{Deserialize, Serialize};

use crate::error::SamplingError;
use crate::Season;

/// What a random draw is used for. Each purpose gets an independent stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrawPurpose {
    YieldVariability,
    PriceVolatility,
    LandSize,
    Network,
}

impl DrawPurpose {
    fn tag(self) -> u64 {
        match self {
            DrawPurpose::YieldVariability => 1,
            DrawPurpose::PriceVolatility => 2,
            DrawPurpose::LandSize => 3,
            DrawPurpose::Network => 4,
        }
    }
}

/// SplitMix64 finalizer
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// The stream number for one (owner, season, purpose) triple.
pub fn stream_key(owner: u64, season: Season, purpose: DrawPurpose) -> u64 {
    mix(mix(mix(owner) ^ u64::from(season)) ^ purpose.tag())
}

/// A fresh generator for the given draw. Calling this twice with the same
/// arguments yields two generators producing identical sequences.
pub fn substream(seed: u64, owner: u64, season: Season, purpose: DrawPurpose) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream_key(owner, season, purpose));
    rng
}

/// Check that `[min, max]` can be sampled from.
pub fn check_range(min: f64, max: f64) -> Result<(), SamplingError> {
    if !min.is_finite() || !max.is_finite() {
        return Err(SamplingError::NonFiniteRange { min, max });
    }
    if min > max {
        return Err(SamplingError::InvertedRange { min, max });
    }
    Ok(())
}

/**
Draw uniformly from `[min, max)`.

A point range `min == max` is legal and returns `min` without consuming
randomness; an inverted range is an error.

```rust
use model::stochasticity::{sample_uniform, substream, DrawPurpose};
use model::error::SamplingError;

let mut rng = substream(1, 0, 1, DrawPurpose::YieldVariability);
let x = sample_uniform(&mut rng, 0.8, 1.2).unwrap();
assert!((0.8..1.2).contains(&x));
assert_eq!(sample_uniform(&mut rng, 1.0, 1.0), Ok(1.0));
assert_eq!(
    sample_uniform(&mut rng, 1.2, 0.8),
    Err(SamplingError::InvertedRange { min: 1.2, max: 0.8 })
);
```
*/
pub fn sample_uniform<R: rand::Rng>(rng: &mut R, min: f64, max: f64) -> Result<f64, SamplingError> {
    check_range(min, max)?;
    if min == max {
        return Ok(min);
    }
    Ok(Uniform::new(min, max).sample(rng))
}
