//! Feed catalog records and the stage-to-feed policy.

use crate::stage::LifecycleStage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub feed_id: String,
    /// Exact-match name the feeding step selects by (e.g. "Starter Feed 1.0mm").
    pub name: String,
    pub pellet_size_mm: f64,
    /// Capacity of the per-station silo holding this feed.
    pub silo_capacity_kg: f64,
}

/// Maps each feeding stage to the exact feed name it consumes. Egg & alevin
/// do not feed and have no entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPolicy {
    pub fry: String,
    pub parr: String,
    pub smolt: String,
    pub post_smolt: String,
    pub adult: String,
}

impl FeedPolicy {
    pub fn feed_name_for(&self, stage: LifecycleStage) -> Option<&str> {
        match stage {
            LifecycleStage::EggAlevin => None,
            LifecycleStage::Fry => Some(&self.fry),
            LifecycleStage::Parr => Some(&self.parr),
            LifecycleStage::Smolt => Some(&self.smolt),
            LifecycleStage::PostSmolt => Some(&self.post_smolt),
            LifecycleStage::Adult => Some(&self.adult),
        }
    }
}

impl Default for FeedPolicy {
    fn default() -> Self {
        FeedPolicy {
            fry: "Starter Feed 1.0mm".to_string(),
            parr: "Grower Feed 2.0mm".to_string(),
            smolt: "Grower Feed 3.0mm".to_string(),
            post_smolt: "Sea Feed 4.5mm".to_string(),
            adult: "Sea Feed 7.0mm".to_string(),
        }
    }
}

/// The default feed catalog matching `FeedPolicy::default`.
pub fn default_feeds() -> Vec<Feed> {
    vec![
        Feed {
            feed_id: "FEED-ST-10".to_string(),
            name: "Starter Feed 1.0mm".to_string(),
            pellet_size_mm: 1.0,
            silo_capacity_kg: 20_000.0,
        },
        Feed {
            feed_id: "FEED-GR-20".to_string(),
            name: "Grower Feed 2.0mm".to_string(),
            pellet_size_mm: 2.0,
            silo_capacity_kg: 40_000.0,
        },
        Feed {
            feed_id: "FEED-GR-30".to_string(),
            name: "Grower Feed 3.0mm".to_string(),
            pellet_size_mm: 3.0,
            silo_capacity_kg: 60_000.0,
        },
        Feed {
            feed_id: "FEED-SEA-45".to_string(),
            name: "Sea Feed 4.5mm".to_string(),
            pellet_size_mm: 4.5,
            silo_capacity_kg: 150_000.0,
        },
        Feed {
            feed_id: "FEED-SEA-70".to_string(),
            name: "Sea Feed 7.0mm".to_string(),
            pellet_size_mm: 7.0,
            silo_capacity_kg: 300_000.0,
        },
    ]
}
