//! Synthetic marketplace data for builds without eBay credentials.
//!
//! All randomness in the service lives here, seeded from the query string:
//! the same query always produces the same comps, so mock-backed scans stay
//! idempotent and the scoring core stays pure.

use crate::market::condition::ConditionBucket;
use crate::market::snapshot::{self, MarketSnapshot, SoldListing};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::hash::{DefaultHasher, Hash, Hasher};

/// Weighted toward Used, matching real secondhand comp distributions.
const CONDITION_POOL: &[ConditionBucket] = &[
    ConditionBucket::New,
    ConditionBucket::Used,
    ConditionBucket::Used,
    ConditionBucket::Used,
    ConditionBucket::ForParts,
];

pub fn seed_for(query: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    hasher.finish()
}

/// Generate a plausible snapshot for a query: 4-15 sold comps around a
/// query-dependent base price, plus an active-listing count.
pub fn market_snapshot(query: &str) -> MarketSnapshot {
    let mut rng = SmallRng::seed_from_u64(seed_for(query));
    let base_price = 25.0 + rng.random::<f64>() * 100.0;
    let comp_count: usize = rng.random_range(4..16);

    let mut sold = Vec::with_capacity(comp_count + 1);
    for _ in 0..comp_count {
        let variation = (rng.random::<f64>() - 0.5) * 0.4;
        let price = (base_price * (1.0 + variation)).max(5.0);
        let bucket = CONDITION_POOL[rng.random_range(0..CONDITION_POOL.len())];
        sold.push(SoldListing {
            raw_price: format!("{price:.2}"),
            bucket,
        });
    }

    // sometimes the upstream reports a sale whose price can't be parsed
    if rng.random_bool(0.2) {
        sold.push(SoldListing {
            raw_price: "N/A".into(),
            bucket: ConditionBucket::Used,
        });
    }

    let active = rng.random_range(5..25);
    snapshot::aggregate(&sold, active)
}
