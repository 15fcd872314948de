//! Temperature inputs for the growth formula. Freshwater stages rear at a
//! controlled constant; seawater stages read a per-geography profile keyed
//! by day of year.

use crate::stage::LifecycleStage;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Controlled rearing temperature for all freshwater stages.
pub const FRESHWATER_TEMP_C: f64 = 12.0;

/// Mid-month sea temperatures for one geography. Lookup interpolates
/// linearly between the two nearest mid-month anchors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureProfile {
    pub profile_id: String,
    pub geography_id: String,
    pub monthly_sea_temp_c: [f64; 12],
}

impl TemperatureProfile {
    /// Sea temperature on a calendar date.
    pub fn sea_temperature_on(&self, date: NaiveDate) -> f64 {
        let month = date.month0() as usize;
        let day = date.day() as f64;
        // Anchor each month's value at day 15 and interpolate toward the
        // neighbouring month.
        let (from, to, frac) = if day < 15.0 {
            let prev = (month + 11) % 12;
            (prev, month, (day + 15.0) / 30.0)
        } else {
            let next = (month + 1) % 12;
            (month, next, (day - 15.0) / 30.0)
        };
        let a = self.monthly_sea_temp_c[from];
        let b = self.monthly_sea_temp_c[to];
        a + (b - a) * frac
    }

    /// Effective temperature for the growth formula: the freshwater constant
    /// for freshwater stages, the seeded profile for seawater stages.
    pub fn temperature_for(&self, date: NaiveDate, stage: LifecycleStage) -> f64 {
        if stage.is_freshwater() {
            FRESHWATER_TEMP_C
        } else {
            self.sea_temperature_on(date)
        }
    }
}

/// Default profiles for the seeded geographies.
pub fn default_profiles() -> Vec<TemperatureProfile> {
    vec![
        TemperatureProfile {
            profile_id: "SEA-FO".to_string(),
            geography_id: "FO".to_string(),
            monthly_sea_temp_c: [
                7.2, 6.8, 6.9, 7.4, 8.2, 9.4, 10.6, 11.2, 10.9, 9.8, 8.7, 7.8,
            ],
        },
        TemperatureProfile {
            profile_id: "SEA-SC".to_string(),
            geography_id: "SC".to_string(),
            monthly_sea_temp_c: [
                7.8, 7.4, 7.5, 8.1, 9.2, 10.8, 12.2, 12.9, 12.4, 11.0, 9.6, 8.5,
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> TemperatureProfile {
        default_profiles().remove(0)
    }

    #[test]
    fn freshwater_stages_are_constant() {
        let p = profile();
        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        for stage in [
            LifecycleStage::EggAlevin,
            LifecycleStage::Fry,
            LifecycleStage::Parr,
            LifecycleStage::Smolt,
        ] {
            assert_eq!(p.temperature_for(date, stage), FRESHWATER_TEMP_C);
        }
    }

    #[test]
    fn seawater_stages_read_the_profile() {
        let p = profile();
        let mid_august = NaiveDate::from_ymd_opt(2025, 8, 15).unwrap();
        assert!((p.temperature_for(mid_august, LifecycleStage::Adult) - 11.2).abs() < 1e-9);
        let mid_february = NaiveDate::from_ymd_opt(2025, 2, 15).unwrap();
        assert!((p.temperature_for(mid_february, LifecycleStage::PostSmolt) - 6.8).abs() < 1e-9);
    }

    #[test]
    fn interpolation_stays_between_anchors() {
        let p = profile();
        for day in 1..=28 {
            let date = NaiveDate::from_ymd_opt(2025, 6, day).unwrap();
            let t = p.sea_temperature_on(date);
            assert!((8.2..=10.6).contains(&t), "day {} gave {}", day, t);
        }
    }
}
