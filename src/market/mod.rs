pub mod condition;
pub mod normalizer;
pub mod parts;
pub mod score;
pub mod snapshot;

pub use condition::ConditionBucket;
pub use snapshot::MarketSnapshot;
