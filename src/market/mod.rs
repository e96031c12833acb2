pub mod traits;
pub mod steam;

pub use steam::SteamMarketClient;
pub use traits::MarketApi;
