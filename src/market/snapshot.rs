//! Aggregated marketplace statistics for one query string.

use crate::market::condition::ConditionBucket;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    pub average_price: f64,
    pub count: u32,
}

/// One query's worth of market data, constructed fresh per scan and discarded
/// after scoring.
///
/// `total_sold_count` counts every sold record observed, including ones whose
/// price failed to parse, so it may exceed the sum of the bucket counts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub sold_by_condition: BTreeMap<ConditionBucket, BucketStats>,
    pub total_sold_count: u32,
    pub total_active_count: u32,
}

impl MarketSnapshot {
    /// The degrade target: no sales, no listings, no bucket data.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn bucket(&self, bucket: ConditionBucket) -> Option<&BucketStats> {
        self.sold_by_condition.get(&bucket)
    }

    pub fn sell_through_rate(&self) -> f64 {
        sell_through_rate(self.total_sold_count, self.total_active_count)
    }
}

/// A raw sold-item record as the marketplace reported it. The price stays a
/// string until aggregation so unparseable values can be excluded there.
#[derive(Debug, Clone, PartialEq)]
pub struct SoldListing {
    pub raw_price: String,
    pub bucket: ConditionBucket,
}

/// Build a snapshot from raw sold comps plus the active-listing count.
///
/// Records with a non-positive or unparseable price are left out of the
/// bucket stats but still counted in `total_sold_count`.
pub fn aggregate(sold: &[SoldListing], active_count: u32) -> MarketSnapshot {
    let mut sums: BTreeMap<ConditionBucket, (f64, u32)> = BTreeMap::new();
    for listing in sold {
        if let Some(price) = parse_price(&listing.raw_price) {
            let entry = sums.entry(listing.bucket).or_insert((0.0, 0));
            entry.0 += price;
            entry.1 += 1;
        }
    }

    let sold_by_condition = sums
        .into_iter()
        .map(|(bucket, (sum, count))| {
            (
                bucket,
                BucketStats {
                    average_price: sum / f64::from(count),
                    count,
                },
            )
        })
        .collect();

    MarketSnapshot {
        sold_by_condition,
        total_sold_count: sold.len() as u32,
        total_active_count: active_count,
    }
}

/// Parse a marketplace price string (`"45"`, `"45.00"`, `"$1,234.56"`) into a
/// positive amount. Currency symbols and thousands separators are dropped;
/// anything non-positive or non-numeric yields `None`.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-'))
        .collect();
    let value: f64 = cleaned.parse().ok()?;
    if value.is_finite() && value > 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Percentage of total (sold + active) listings that are sold. Defined as 0
/// when both counts are 0. The total is widened to u64 so two u32 counts can
/// never overflow the sum.
pub fn sell_through_rate(sold: u32, active: u32) -> f64 {
    let total = u64::from(sold) + u64::from(active);
    if total == 0 {
        return 0.0;
    }
    f64::from(sold) / total as f64 * 100.0
}
