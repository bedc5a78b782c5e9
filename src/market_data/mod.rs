pub mod price_series;
pub mod snapshot;

// Re-export for convenient access (e.g. `use crate::market_data::PriceSeries`).
pub use price_series::{PriceBar, PriceSeries, RawBar};
pub use snapshot::{MarketSnapshot, SimplePrice};
