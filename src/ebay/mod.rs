pub mod auth;
pub mod browse;
pub mod config;
pub mod mock;

pub use browse::{EbayMarketError, fetch_market_snapshot};
