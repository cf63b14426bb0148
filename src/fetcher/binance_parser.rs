//! Binance klines response parser
//!
//! Stateless conversion from the raw JSON array-of-arrays into [`Kline`]s.
//! A kline that is missing fields or carries unparsable numbers fails the
//! whole page; nothing is repaired.

use crate::fetcher::{FetcherError, FetcherResult};
use crate::Kline;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Number of fields in one upstream kline
pub const KLINE_FIELD_COUNT: usize = 12;

/// Stateless parser for Binance API responses
pub struct BinanceParser;

impl BinanceParser {
    /// Parse Binance klines JSON array to Kline structs
    ///
    /// # Format
    /// `[open_time, open, high, low, close, volume, close_time, quote_volume, trades, taker_buy_base, taker_buy_quote, ignore]`
    ///
    /// # Errors
    /// Returns `FetcherError::Parse` if any kline is malformed
    pub fn parse_klines(klines: Vec<Value>) -> FetcherResult<Vec<Kline>> {
        let mut parsed = Vec::with_capacity(klines.len());

        for (index, kline) in klines.into_iter().enumerate() {
            let arr = kline
                .as_array()
                .ok_or_else(|| FetcherError::Parse(format!("kline {index} is not an array")))?;

            if arr.len() != KLINE_FIELD_COUNT {
                return Err(FetcherError::Parse(format!(
                    "Expected {KLINE_FIELD_COUNT} elements in kline {index}, got {}",
                    arr.len()
                )));
            }

            let open_time = arr[0]
                .as_i64()
                .ok_or_else(|| FetcherError::Parse(format!("Invalid open_time in kline {index}")))?;

            let close_time = arr[6].as_i64().ok_or_else(|| {
                FetcherError::Parse(format!("Invalid close_time in kline {index}"))
            })?;

            let trades = arr[8].as_u64().ok_or_else(|| {
                FetcherError::Parse(format!("Invalid trades count in kline {index}"))
            })?;

            parsed.push(Kline {
                open_time,
                open: Self::parse_decimal(&arr[1], "open")?,
                high: Self::parse_decimal(&arr[2], "high")?,
                low: Self::parse_decimal(&arr[3], "low")?,
                close: Self::parse_decimal(&arr[4], "close")?,
                volume: Self::parse_decimal(&arr[5], "volume")?,
                close_time,
                quote_volume: Self::parse_decimal(&arr[7], "quote_volume")?,
                trades,
                taker_buy_base_volume: Self::parse_decimal(&arr[9], "taker_buy_base_volume")?,
                taker_buy_quote_volume: Self::parse_decimal(&arr[10], "taker_buy_quote_volume")?,
            });
        }

        Ok(parsed)
    }

    fn parse_decimal(value: &Value, field_name: &str) -> FetcherResult<Decimal> {
        let s = value
            .as_str()
            .ok_or_else(|| FetcherError::Parse(format!("{field_name} is not a string")))?;

        Decimal::from_str(s)
            .map_err(|e| FetcherError::Parse(format!("Failed to parse {field_name}: {e}")))
    }
}
