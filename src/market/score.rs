//! The Power Score engine: a weighted sum of four independently-capped,
//! tier-thresholded components over one `MarketSnapshot`.
//!
//! Tiers instead of a continuous formula keep the score stable against
//! outlier prices and make the bands readable to a human flipper. The tables
//! are data so tuning doesn't mean re-deriving the function.

use crate::market::condition::ConditionBucket;
use crate::market::snapshot::MarketSnapshot;
use serde::{Deserialize, Serialize};

/// Descending thresholds paired with awarded points; `floor` applies when no
/// threshold is exceeded.
pub struct TierTable {
    tiers: &'static [(f64, u8)],
    floor: u8,
}

impl TierTable {
    pub fn apply(&self, value: f64) -> u8 {
        self.tiers
            .iter()
            .find(|(threshold, _)| value > *threshold)
            .map(|(_, points)| *points)
            .unwrap_or(self.floor)
    }
}

/// Price component, cap 40, over the primary bucket's average sold price.
pub const PRICE_TIERS: TierTable = TierTable {
    tiers: &[(100.0, 40), (60.0, 35), (30.0, 25), (15.0, 15)],
    floor: 8,
};

/// Sell-through component, cap 40, over the sell-through percentage.
pub const SELL_THROUGH_TIERS: TierTable = TierTable {
    tiers: &[(60.0, 40), (40.0, 32), (20.0, 24), (10.0, 16)],
    floor: 8,
};

/// Volume component, cap 20, over the total sold count.
pub const VOLUME_TIERS: TierTable = TierTable {
    tiers: &[(50.0, 20), (25.0, 16), (10.0, 12), (5.0, 8)],
    floor: 4,
};

/// The price signal comes from Used first, then New. ForParts never drives
/// the price component; it only feeds the bonus.
const PRIMARY_BUCKET_ORDER: &[ConditionBucket] = &[ConditionBucket::Used, ConditionBucket::New];

const PARTS_BONUS_MIN_PRICE: f64 = 20.0;
const PARTS_BONUS: u8 = 10;
const MAX_SCORE: u8 = 100;

/// Per-component view of a score, returned alongside the total so API
/// consumers can explain the number to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub price: u8,
    pub sell_through: u8,
    pub volume: u8,
    pub parts_bonus: u8,
    pub total: u8,
}

/// Compute the full component breakdown. Pure and deterministic: the same
/// snapshot always yields the same result.
pub fn breakdown(snapshot: &MarketSnapshot) -> ScoreBreakdown {
    let price = PRICE_TIERS.apply(primary_average_price(snapshot));
    let sell_through = SELL_THROUGH_TIERS.apply(snapshot.sell_through_rate());
    let volume = VOLUME_TIERS.apply(f64::from(snapshot.total_sold_count));
    let parts_bonus = match snapshot.bucket(ConditionBucket::ForParts) {
        Some(stats) if stats.average_price > PARTS_BONUS_MIN_PRICE => PARTS_BONUS,
        _ => 0,
    };
    // unclamped maximum is 110
    let total = (price + sell_through + volume + parts_bonus).min(MAX_SCORE);
    ScoreBreakdown {
        price,
        sell_through,
        volume,
        parts_bonus,
        total,
    }
}

/// The 0-100 Power Score for one snapshot.
pub fn power_score(snapshot: &MarketSnapshot) -> u8 {
    breakdown(snapshot).total
}

/// Average sold price of the primary bucket (Used, then New, else 0).
pub fn primary_average_price(snapshot: &MarketSnapshot) -> f64 {
    PRIMARY_BUCKET_ORDER
        .iter()
        .find_map(|bucket| snapshot.bucket(*bucket))
        .map(|stats| stats.average_price)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::snapshot::{BucketStats, SoldListing, aggregate};
    use std::collections::BTreeMap;

    fn snapshot_with(
        buckets: &[(ConditionBucket, f64, u32)],
        total_sold: u32,
        total_active: u32,
    ) -> MarketSnapshot {
        let sold_by_condition: BTreeMap<_, _> = buckets
            .iter()
            .map(|(bucket, avg, count)| {
                (
                    *bucket,
                    BucketStats {
                        average_price: *avg,
                        count: *count,
                    },
                )
            })
            .collect();
        MarketSnapshot {
            sold_by_condition,
            total_sold_count: total_sold,
            total_active_count: total_active,
        }
    }

    #[test]
    fn all_zero_snapshot_scores_twenty() {
        let out = breakdown(&MarketSnapshot::zero());
        assert_eq!(out.price, 8);
        assert_eq!(out.sell_through, 8);
        assert_eq!(out.volume, 4);
        assert_eq!(out.parts_bonus, 0);
        assert_eq!(out.total, 20);
    }

    #[test]
    fn parts_only_snapshot_scores_thirty() {
        let snapshot = snapshot_with(&[(ConditionBucket::ForParts, 25.0, 1)], 0, 0);
        let out = breakdown(&snapshot);
        // price falls back to 0 because neither Used nor New has data
        assert_eq!(out.price, 8);
        assert_eq!(out.sell_through, 8);
        assert_eq!(out.volume, 4);
        assert_eq!(out.parts_bonus, 10);
        assert_eq!(out.total, 30);
    }

    #[test]
    fn cheap_parts_bucket_earns_no_bonus() {
        let snapshot = snapshot_with(&[(ConditionBucket::ForParts, 20.0, 2)], 2, 0);
        assert_eq!(breakdown(&snapshot).parts_bonus, 0);
    }

    #[test]
    fn used_bucket_preferred_over_new_for_price() {
        let snapshot = snapshot_with(
            &[
                (ConditionBucket::Used, 35.0, 4),
                (ConditionBucket::New, 150.0, 2),
            ],
            6,
            6,
        );
        // avgPrice 35 -> 25 points, not the New bucket's 40
        assert_eq!(breakdown(&snapshot).price, 25);
    }

    #[test]
    fn maximal_snapshot_clamps_to_one_hundred() {
        let snapshot = snapshot_with(
            &[
                (ConditionBucket::Used, 500.0, 60),
                (ConditionBucket::ForParts, 80.0, 10),
            ],
            70,
            5,
        );
        let out = breakdown(&snapshot);
        assert_eq!(out.price, 40);
        assert_eq!(out.sell_through, 40);
        assert_eq!(out.volume, 20);
        assert_eq!(out.parts_bonus, 10);
        assert_eq!(out.total, 100);
    }

    #[test]
    fn score_is_deterministic_and_bounded() {
        let cases = [
            MarketSnapshot::zero(),
            snapshot_with(&[(ConditionBucket::Used, 1.0e12, 1)], 1, 0),
            snapshot_with(&[(ConditionBucket::New, 61.0, 3)], 3, 100_000),
            snapshot_with(&[(ConditionBucket::Used, 16.0, 11)], 11, 40),
        ];
        for snapshot in &cases {
            let first = power_score(snapshot);
            let second = power_score(snapshot);
            assert_eq!(first, second);
            assert!(first <= 100);
        }
    }

    #[test]
    fn tier_boundaries_are_strict() {
        // exactly at a threshold falls to the tier below
        assert_eq!(PRICE_TIERS.apply(100.0), 35);
        assert_eq!(PRICE_TIERS.apply(100.01), 40);
        assert_eq!(SELL_THROUGH_TIERS.apply(60.0), 32);
        assert_eq!(VOLUME_TIERS.apply(50.0), 16);
        assert_eq!(VOLUME_TIERS.apply(51.0), 20);
    }

    #[test]
    fn scores_real_aggregation_output() {
        let sold: Vec<SoldListing> = (0..30)
            .map(|i| SoldListing {
                raw_price: format!("{}.00", 60 + i),
                bucket: ConditionBucket::Used,
            })
            .collect();
        let snapshot = aggregate(&sold, 20);
        let out = breakdown(&snapshot);
        // avg ~74.5 -> 35, sell-through 60.0 -> 32, volume 30 -> 16
        assert_eq!(out.price, 35);
        assert_eq!(out.sell_through, 32);
        assert_eq!(out.volume, 16);
        assert_eq!(out.total, 83);
    }
}
