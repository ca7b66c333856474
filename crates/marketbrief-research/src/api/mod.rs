//! External data source clients

pub mod polygon;
pub mod serper;

pub use polygon::{DailyBar, PolygonClient, PrevCloseQuote, PriceDataSource};
pub use serper::{NewsDataSource, SerperClient};
