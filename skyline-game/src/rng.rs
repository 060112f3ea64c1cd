//! Per-purpose random streams and the dice helpers built on top of them.
//!
//! Each purpose that consumes randomness (purchase drops, mini events, role
//! luck, event deck) owns an independent stream so that adding a draw to one
//! system never shifts the outcomes of another. Streams are derived from a
//! single session seed with HMAC-SHA256 domain separation.

use std::fmt;

use hmac::{Hmac, Mac};
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::constants::{RNG_TAG_DECK, RNG_TAG_LOOT, RNG_TAG_LUCK, RNG_TAG_MINI_EVENT};
use crate::numbers::{floor_f64_to_i64, floor_f64_to_index, i64_to_f64, u32_to_f64};

/// Boxed random source so tests can swap in scripted generators.
pub type DynRng = Box<dyn RngCore + Send>;

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl<R: RngCore> CountingRng<R> {
    pub const fn new(rng: R) -> Self {
        Self { rng, draws: 0 }
    }

    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: RngCore> RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

/// Draw counters for every stream, used by replay checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngDraws {
    pub loot: u64,
    pub mini_event: u64,
    pub luck: u64,
    pub deck: u64,
}

/// Bundle of independent RNG streams owned by a session.
pub struct RngBundle {
    loot: CountingRng<DynRng>,
    mini_event: CountingRng<DynRng>,
    luck: CountingRng<DynRng>,
    deck: CountingRng<DynRng>,
}

impl RngBundle {
    /// Derive all streams from a single session seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        let stream = |tag: &[u8]| -> DynRng {
            Box::new(SmallRng::seed_from_u64(derive_stream_seed(seed, tag)))
        };
        Self::from_streams(
            stream(RNG_TAG_LOOT),
            stream(RNG_TAG_MINI_EVENT),
            stream(RNG_TAG_LUCK),
            stream(RNG_TAG_DECK),
        )
    }

    /// Build a bundle from explicit generators.
    #[must_use]
    pub fn from_streams(loot: DynRng, mini_event: DynRng, luck: DynRng, deck: DynRng) -> Self {
        Self {
            loot: CountingRng::new(loot),
            mini_event: CountingRng::new(mini_event),
            luck: CountingRng::new(luck),
            deck: CountingRng::new(deck),
        }
    }

    /// Use clones of one generator for every stream. Handy with `StepRng`.
    #[must_use]
    pub fn uniform<R>(rng: R) -> Self
    where
        R: RngCore + Clone + Send + 'static,
    {
        Self::from_streams(
            Box::new(rng.clone()),
            Box::new(rng.clone()),
            Box::new(rng.clone()),
            Box::new(rng),
        )
    }

    /// Stream for purchase item drops.
    pub fn loot(&mut self) -> &mut CountingRng<DynRng> {
        &mut self.loot
    }

    /// Stream for mini-event triggers and their payloads.
    pub fn mini_event(&mut self) -> &mut CountingRng<DynRng> {
        &mut self.mini_event
    }

    /// Stream for role skill rolls (random discount, lucky income).
    pub fn luck(&mut self) -> &mut CountingRng<DynRng> {
        &mut self.luck
    }

    /// Stream for drawing event cards.
    pub fn deck(&mut self) -> &mut CountingRng<DynRng> {
        &mut self.deck
    }

    #[must_use]
    pub const fn draws(&self) -> RngDraws {
        RngDraws {
            loot: self.loot.draws(),
            mini_event: self.mini_event.draws(),
            luck: self.luck.draws(),
            deck: self.deck.draws(),
        }
    }
}

impl fmt::Debug for RngBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RngBundle")
            .field("draws", &self.draws())
            .finish_non_exhaustive()
    }
}

/// Derive a stream seed from the session seed and a domain tag.
#[must_use]
pub fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()) else {
        return user_seed;
    };
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// Uniform float in `[0, 1)`.
pub fn unit<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.r#gen::<f64>()
}

/// True with probability `chance`.
pub fn roll_chance<R: Rng + ?Sized>(rng: &mut R, chance: f64) -> bool {
    unit(rng) < chance
}

/// Uniform index into a collection of `len` entries.
pub fn pick_index<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let len_f = u32::try_from(len).map_or(f64::from(u32::MAX), u32_to_f64);
    Some(floor_f64_to_index(unit(rng) * len_f, len))
}

/// Weighted index: roll `u * total`, subtract weights in order, stop at the
/// first entry that takes the roll to zero or below. Zero weights never win.
pub fn pick_weighted<R: Rng + ?Sized>(rng: &mut R, weights: &[u32]) -> Option<usize> {
    let total: u64 = weights.iter().map(|w| u64::from(*w)).sum();
    if total == 0 {
        return None;
    }
    let total_f = i64::try_from(total).map_or(f64::MAX, i64_to_f64);
    let mut roll = unit(rng) * total_f;
    let mut last_eligible = None;
    for (idx, weight) in weights.iter().enumerate() {
        if *weight == 0 {
            continue;
        }
        last_eligible = Some(idx);
        roll -= u32_to_f64(*weight);
        if roll <= 0.0 {
            return Some(idx);
        }
    }
    last_eligible
}

/// Uniform integer in `[min, max]`; returns `min` when the range is empty.
pub fn roll_inclusive<R: Rng + ?Sized>(rng: &mut R, min: i64, max: i64) -> i64 {
    if max <= min {
        return min;
    }
    let span = max.saturating_sub(min).saturating_add(1);
    let offset = floor_f64_to_i64(unit(rng) * i64_to_f64(span)).clamp(0, span - 1);
    min.saturating_add(offset)
}
