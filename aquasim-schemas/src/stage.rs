//! Defines the six ordered lifecycle stages a batch moves through, together
//! with the stage attributes the rest of the system keys on: default stage
//! durations, the hall role serving each freshwater stage, permissive weight
//! caps, and the freshwater/seawater split that drives temperature selection.

use serde::{Deserialize, Serialize};

/// The ordered biological stages of a salmon batch, from fertilized egg to
/// harvest-ready adult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    EggAlevin,
    Fry,
    Parr,
    Smolt,
    PostSmolt,
    Adult,
}

/// The specialization tag of a freshwater hall. Halls with role `A` hold
/// egg & alevin trays, `B` fry tanks, and so on; adult fish live in sea
/// rings, which belong to areas rather than halls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HallRole {
    A,
    B,
    C,
    D,
    E,
}

impl LifecycleStage {
    pub const ALL: [LifecycleStage; 6] = [
        LifecycleStage::EggAlevin,
        LifecycleStage::Fry,
        LifecycleStage::Parr,
        LifecycleStage::Smolt,
        LifecycleStage::PostSmolt,
        LifecycleStage::Adult,
    ];

    /// One-based biological order of the stage.
    pub fn order(&self) -> u8 {
        match self {
            LifecycleStage::EggAlevin => 1,
            LifecycleStage::Fry => 2,
            LifecycleStage::Parr => 3,
            LifecycleStage::Smolt => 4,
            LifecycleStage::PostSmolt => 5,
            LifecycleStage::Adult => 6,
        }
    }

    /// Default stage duration in days. The six durations sum to 900.
    pub fn duration_days(&self) -> u32 {
        match self {
            LifecycleStage::Adult => 450,
            _ => 90,
        }
    }

    /// Day on which this stage ends, counted from batch day 0.
    pub fn cumulative_end_day(&self) -> u32 {
        LifecycleStage::ALL
            .iter()
            .take_while(|s| s.order() <= self.order())
            .map(|s| s.duration_days())
            .sum()
    }

    /// The stage that follows this one, or `None` for `Adult`.
    pub fn next(&self) -> Option<LifecycleStage> {
        match self {
            LifecycleStage::EggAlevin => Some(LifecycleStage::Fry),
            LifecycleStage::Fry => Some(LifecycleStage::Parr),
            LifecycleStage::Parr => Some(LifecycleStage::Smolt),
            LifecycleStage::Smolt => Some(LifecycleStage::PostSmolt),
            LifecycleStage::PostSmolt => Some(LifecycleStage::Adult),
            LifecycleStage::Adult => None,
        }
    }

    /// Stage active on the given lifecycle day (0-based). Days at or past the
    /// final boundary report `Adult`.
    pub fn at_day(day: u32) -> LifecycleStage {
        for stage in LifecycleStage::ALL {
            if day < stage.cumulative_end_day() {
                return stage;
            }
        }
        LifecycleStage::Adult
    }

    /// Hall role serving this stage, or `None` for `Adult` (sea rings).
    pub fn hall_role(&self) -> Option<HallRole> {
        match self {
            LifecycleStage::EggAlevin => Some(HallRole::A),
            LifecycleStage::Fry => Some(HallRole::B),
            LifecycleStage::Parr => Some(HallRole::C),
            LifecycleStage::Smolt => Some(HallRole::D),
            LifecycleStage::PostSmolt => Some(HallRole::E),
            LifecycleStage::Adult => None,
        }
    }

    /// Permissive per-fish weight cap in grams. A safety limit on the growth
    /// step, never a transition trigger.
    pub fn weight_cap_g(&self) -> Option<f64> {
        match self {
            LifecycleStage::EggAlevin => None,
            LifecycleStage::Fry => Some(10.0),
            LifecycleStage::Parr => Some(100.0),
            LifecycleStage::Smolt => Some(250.0),
            LifecycleStage::PostSmolt => Some(700.0),
            LifecycleStage::Adult => Some(8000.0),
        }
    }

    /// Freshwater stages use a constant rearing temperature; seawater stages
    /// read from the geography's temperature profile.
    pub fn is_freshwater(&self) -> bool {
        !matches!(self, LifecycleStage::PostSmolt | LifecycleStage::Adult)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LifecycleStage::EggAlevin => "Egg&Alevin",
            LifecycleStage::Fry => "Fry",
            LifecycleStage::Parr => "Parr",
            LifecycleStage::Smolt => "Smolt",
            LifecycleStage::PostSmolt => "Post-Smolt",
            LifecycleStage::Adult => "Adult",
        }
    }
}

/// Total length of the default lifecycle in days.
pub const FULL_LIFECYCLE_DAYS: u32 = 900;
