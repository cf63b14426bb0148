//! Binance spot endpoints
//!
//! The REST API and the Binance Vision archive mirror are two different hosts;
//! both are overridable through configuration so tests can point them at a
//! local mock server.

/// Configuration for the Binance spot market
#[derive(Debug, Clone)]
pub struct BinanceSpotConfig {
    /// Base URL for the REST API (e.g., <https://api.binance.com>)
    pub api_base_url: &'static str,

    /// Klines endpoint path
    pub klines_endpoint: &'static str,

    /// Maximum `limit` accepted by the klines endpoint
    pub max_klines_limit: usize,

    /// Base URL of the archive mirror (e.g., <https://data.binance.vision>)
    pub archive_base_url: &'static str,

    /// Path prefix of kline archives below the mirror root, before the
    /// `monthly`/`daily` component
    pub archive_klines_prefix: &'static str,
}

/// Binance spot market configuration
pub const SPOT_CONFIG: BinanceSpotConfig = BinanceSpotConfig {
    api_base_url: "https://api.binance.com",
    klines_endpoint: "/api/v3/klines",
    max_klines_limit: 1000,
    archive_base_url: "https://data.binance.vision",
    archive_klines_prefix: "/data/spot",
};
