//! Pure biology functions: TGC cube-root growth, daily mortality sampling,
//! and FCR-based feed demand. No I/O, no shared state; all randomness is
//! injected as a caller-derived seed so runs replay byte-identically.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

/// Outcome of one day of growth for a single average fish.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GrowthStep {
    pub prev_weight_g: f64,
    pub new_weight_g: f64,
    pub gain_g: f64,
    pub temperature_c: f64,
    /// True when the stage safety cap clamped the result.
    pub capped: bool,
}

/// One day of the cube-root TGC formula:
/// `W(t+1)^(1/3) = W(t)^(1/3) + tgc/1000 * T_eff`.
pub fn grow_one_day(
    weight_g: f64,
    tgc_per_thousand: f64,
    temperature_c: f64,
    weight_cap_g: Option<f64>,
) -> GrowthStep {
    let tgc = tgc_per_thousand / 1000.0;
    let grown = (weight_g.cbrt() + tgc * temperature_c).powi(3);
    let (new_weight_g, capped) = match weight_cap_g {
        Some(cap) if grown > cap => (cap.max(weight_g), true),
        _ => (grown, false),
    };
    GrowthStep {
        prev_weight_g: weight_g,
        new_weight_g,
        gain_g: new_weight_g - weight_g,
        temperature_c,
        capped,
    }
}

/// Outcome of one day of mortality sampling for one assignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MortalityDraw {
    pub deaths: u64,
    pub daily_rate: f64,
}

/// Samples deaths for one day: `max(0, round(rate * population + noise))`
/// with deterministic noise of up to +/-10% of the expectation.
pub fn mortality_for_day(population: u64, daily_rate: f64, seed: u64) -> MortalityDraw {
    if population == 0 || daily_rate <= 0.0 {
        return MortalityDraw {
            deaths: 0,
            daily_rate,
        };
    }
    let expected = daily_rate * population as f64;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let noise = rng.gen_range(-0.10..=0.10) * expected;
    let deaths = (expected + noise).round().max(0.0) as u64;
    MortalityDraw {
        deaths: deaths.min(population),
        daily_rate,
    }
}

/// Closed-form mortality used by projections: the rounded expectation,
/// no noise.
pub fn projected_mortality(population: u64, daily_rate: f64) -> u64 {
    if population == 0 || daily_rate <= 0.0 {
        return 0;
    }
    ((daily_rate * population as f64).round() as u64).min(population)
}

/// Daily feed requirement for one container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeedDemand {
    pub feed_kg: f64,
    pub expected_gain_kg: f64,
}

/// `feed = fcr * expected daily biomass gain`. Zero FCR (egg & alevin)
/// yields zero demand.
pub fn feed_demand(population: u64, growth: &GrowthStep, fcr: f64) -> FeedDemand {
    let expected_gain_kg = population as f64 * growth.gain_g / 1000.0;
    FeedDemand {
        feed_kg: (fcr * expected_gain_kg).max(0.0),
        expected_gain_kg,
    }
}

/// Deterministic seed for one `(batch, day, event kind)` draw. FNV-1a over
/// the key keeps the stream stable across hosts and runs.
pub fn event_seed(batch_number: &str, day_number: u32, kind: &str) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for byte in batch_number
        .as_bytes()
        .iter()
        .chain(&day_number.to_le_bytes())
        .chain(kind.as_bytes())
    {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// A deterministic RNG for one event-kind draw.
pub fn event_rng(batch_number: &str, day_number: u32, kind: &str) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(event_seed(batch_number, day_number, kind))
}
