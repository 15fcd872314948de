//! Per-station feed inventory with FIFO lot consumption. One silo exists per
//! `(station, feed name)` pair; stock falling below 20% of silo capacity
//! triggers an automatic replenishment purchase instead of blocking the
//! feeding step.

use crate::error::SimError;
use aquasim_schemas::feed::Feed;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Refill threshold as a fraction of silo capacity.
const REORDER_FRACTION: f64 = 0.20;

#[derive(Debug, Clone, PartialEq)]
pub struct FeedLot {
    pub lot_id: String,
    pub purchased_on: NaiveDate,
    pub remaining_kg: f64,
}

/// A replenishment purchase executed during consumption.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPurchase {
    pub lot_id: String,
    pub station_id: String,
    pub feed_name: String,
    pub amount_kg: f64,
}

/// Result of drawing feed from a silo.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedDraw {
    pub consumed_kg: f64,
    /// Replenishments triggered by this draw: a top-up when stock could not
    /// cover the demand, and/or a reorder when the draw left the silo below
    /// the threshold.
    pub purchases: Vec<FeedPurchase>,
}

struct Silo {
    capacity_kg: f64,
    lots: VecDeque<FeedLot>,
    next_lot: u64,
}

impl Silo {
    fn stock_kg(&self) -> f64 {
        self.lots.iter().map(|l| l.remaining_kg).sum()
    }
}

#[derive(Default)]
pub struct FeedInventory {
    silos: Mutex<HashMap<(String, String), Silo>>,
}

impl FeedInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws `amount_kg` of a feed at a station, consuming lots oldest
    /// first. Silos start full on first use; a draw that leaves less than
    /// 20% of capacity buys a top-up lot dated the same day.
    pub fn consume(
        &self,
        station_id: &str,
        feed: &Feed,
        amount_kg: f64,
        date: NaiveDate,
    ) -> Result<FeedDraw, SimError> {
        if amount_kg <= 0.0 {
            return Ok(FeedDraw {
                consumed_kg: 0.0,
                purchases: Vec::new(),
            });
        }
        let mut silos = self.silos.lock();
        let silo = silos
            .entry((station_id.to_string(), feed.name.clone()))
            .or_insert_with(|| Silo {
                capacity_kg: feed.silo_capacity_kg,
                lots: VecDeque::from([FeedLot {
                    lot_id: format!("{}-{}-L1", station_id, feed.feed_id),
                    purchased_on: date,
                    remaining_kg: feed.silo_capacity_kg,
                }]),
                next_lot: 2,
            });

        let mut purchases = Vec::new();
        if silo.stock_kg() < amount_kg {
            // A single day's demand exceeding a full silo means the silo is
            // undersized for the stage; surface it rather than looping on
            // purchases.
            if amount_kg > silo.capacity_kg {
                return Err(SimError::FeedStockLow {
                    station_id: station_id.to_string(),
                    feed_name: feed.name.clone(),
                });
            }
            purchases.push(Self::replenish(silo, station_id, feed, date));
        }

        let mut left = amount_kg;
        while left > 0.0 {
            let Some(front) = silo.lots.front_mut() else {
                return Err(SimError::FeedStockLow {
                    station_id: station_id.to_string(),
                    feed_name: feed.name.clone(),
                });
            };
            if front.remaining_kg > left {
                front.remaining_kg -= left;
                left = 0.0;
            } else {
                left -= front.remaining_kg;
                silo.lots.pop_front();
            }
        }

        if silo.stock_kg() < REORDER_FRACTION * silo.capacity_kg {
            purchases.push(Self::replenish(silo, station_id, feed, date));
        }

        Ok(FeedDraw {
            consumed_kg: amount_kg,
            purchases,
        })
    }

    pub fn stock_kg(&self, station_id: &str, feed_name: &str) -> f64 {
        self.silos
            .lock()
            .get(&(station_id.to_string(), feed_name.to_string()))
            .map(|s| s.stock_kg())
            .unwrap_or(0.0)
    }

    fn replenish(silo: &mut Silo, station_id: &str, feed: &Feed, date: NaiveDate) -> FeedPurchase {
        let amount_kg = silo.capacity_kg - silo.stock_kg();
        let lot_id = format!("{}-{}-L{}", station_id, feed.feed_id, silo.next_lot);
        silo.next_lot += 1;
        silo.lots.push_back(FeedLot {
            lot_id: lot_id.clone(),
            purchased_on: date,
            remaining_kg: amount_kg,
        });
        FeedPurchase {
            lot_id,
            station_id: station_id.to_string(),
            feed_name: feed.name.clone(),
            amount_kg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed() -> Feed {
        Feed {
            feed_id: "FEED-ST-10".to_string(),
            name: "Starter Feed 1.0mm".to_string(),
            pellet_size_mm: 1.0,
            silo_capacity_kg: 1_000.0,
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn draws_consume_fifo() {
        let inventory = FeedInventory::new();
        let f = feed();
        inventory.consume("FO-S01", &f, 300.0, date(1)).unwrap();
        assert!((inventory.stock_kg("FO-S01", &f.name) - 700.0).abs() < 1e-9);
        // Stations do not share silos.
        assert_eq!(inventory.stock_kg("FO-S02", &f.name), 0.0);
    }

    #[test]
    fn falling_below_threshold_replenishes() {
        let inventory = FeedInventory::new();
        let f = feed();
        let draw = inventory.consume("FO-S01", &f, 700.0, date(1)).unwrap();
        assert!(draw.purchases.is_empty());

        // 300 left; drawing 150 leaves 150 < 200 (20% of 1000).
        let draw = inventory.consume("FO-S01", &f, 150.0, date(2)).unwrap();
        assert_eq!(draw.purchases.len(), 1);
        assert!((draw.purchases[0].amount_kg - 850.0).abs() < 1e-9);
        assert!((inventory.stock_kg("FO-S01", &f.name) - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn demand_beyond_stock_buys_first() {
        let inventory = FeedInventory::new();
        let f = feed();
        let first = inventory.consume("FO-S01", &f, 900.0, date(1)).unwrap();
        // The first draw left 100 in stock, below the reorder threshold.
        assert_eq!(first.purchases.len(), 1);
        let draw = inventory.consume("FO-S01", &f, 600.0, date(2)).unwrap();
        assert!((draw.consumed_kg - 600.0).abs() < 1e-9);
    }

    #[test]
    fn oversized_demand_is_an_error() {
        let inventory = FeedInventory::new();
        let f = feed();
        let err = inventory.consume("FO-S01", &f, 1_500.0, date(1)).unwrap_err();
        assert!(matches!(err, SimError::FeedStockLow { .. }));
    }
}
