//! Binance spot klines page source

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::downloader::config::RetryPolicy;
use crate::fetcher::binance_config::SPOT_CONFIG;
use crate::fetcher::binance_http::BinanceHttpClient;
use crate::fetcher::binance_parser::BinanceParser;
use crate::fetcher::{FetcherResult, KlinePageSource};
use crate::{Interval, Kline};

/// Fetches pages from `GET /api/v3/klines`
#[derive(Debug, Clone)]
pub struct BinanceSpotKlines {
    http: BinanceHttpClient,
}

impl BinanceSpotKlines {
    /// Page source against the given API base URL
    pub fn new(client: Client, base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            http: BinanceHttpClient::new(client, base_url, retry),
        }
    }
}

#[async_trait]
impl KlinePageSource for BinanceSpotKlines {
    async fn fetch_page(
        &self,
        symbol: &str,
        interval: Interval,
        end_time: i64,
        limit: usize,
    ) -> FetcherResult<Vec<Kline>> {
        let params = [
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("endTime", end_time.to_string()),
            ("limit", limit.to_string()),
        ];

        let target = format!("{symbol} {interval}");
        let raw: Vec<Value> = self
            .http
            .get(SPOT_CONFIG.klines_endpoint, &params, &target)
            .await?;

        debug!(
            symbol = %symbol,
            interval = %interval,
            end_time = end_time,
            records = raw.len(),
            "Received klines page"
        );

        BinanceParser::parse_klines(raw)
    }
}
