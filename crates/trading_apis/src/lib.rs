pub mod api;
pub mod helpers;
pub mod metaapi_account_api;
pub mod metaapi_market_data_api;

pub use crate::api::{AccountApi, FetchOutcome, MarketDataApi};
pub use crate::metaapi_account_api::{ConnectionSettings, MetaapiAccountApi};
pub use crate::metaapi_market_data_api::{ApiData, MetaapiMarketDataApi, RetrySettings};
