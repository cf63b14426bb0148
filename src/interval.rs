//! Kline intervals and their exchange spelling

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Candle width.
///
/// Serialized with the exchange spelling (`1m`, `4h`, `1M`, ...), which is
/// also what appears in query strings and archive names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Interval {
    /// `1m`
    OneMinute,
    /// `3m`
    ThreeMinutes,
    /// `5m`
    FiveMinutes,
    /// `15m`
    FifteenMinutes,
    /// `30m`
    ThirtyMinutes,
    /// `1h`
    OneHour,
    /// `2h`
    TwoHours,
    /// `4h`
    FourHours,
    /// `6h`
    SixHours,
    /// `8h`
    EightHours,
    /// `12h`
    TwelveHours,
    /// `1d`
    OneDay,
    /// `3d`
    ThreeDays,
    /// `1w` (`1W` is accepted on input)
    OneWeek,
    /// `1M`
    OneMonth,
}

/// Spelling and nominal width, indexed by discriminant
const TABLE: [(&str, i64); 15] = [
    ("1m", MINUTE_MS),
    ("3m", 3 * MINUTE_MS),
    ("5m", 5 * MINUTE_MS),
    ("15m", 15 * MINUTE_MS),
    ("30m", 30 * MINUTE_MS),
    ("1h", HOUR_MS),
    ("2h", 2 * HOUR_MS),
    ("4h", 4 * HOUR_MS),
    ("6h", 6 * HOUR_MS),
    ("8h", 8 * HOUR_MS),
    ("12h", 12 * HOUR_MS),
    ("1d", DAY_MS),
    ("3d", 3 * DAY_MS),
    ("1w", 7 * DAY_MS),
    // 30 days; months are not fixed-width
    ("1M", 30 * DAY_MS),
];

impl Interval {
    /// Every interval, shortest first
    pub const ALL: [Interval; 15] = [
        Interval::OneMinute,
        Interval::ThreeMinutes,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::OneHour,
        Interval::TwoHours,
        Interval::FourHours,
        Interval::SixHours,
        Interval::EightHours,
        Interval::TwelveHours,
        Interval::OneDay,
        Interval::ThreeDays,
        Interval::OneWeek,
        Interval::OneMonth,
    ];

    /// Nominal width in milliseconds
    pub fn to_milliseconds(&self) -> i64 {
        TABLE[*self as usize].1
    }

    /// Exchange spelling
    pub fn as_str(&self) -> &'static str {
        TABLE[*self as usize].0
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    /// Case-sensitive: `1m` is a minute, `1M` a month.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "1W" {
            return Ok(Interval::OneWeek);
        }
        Interval::ALL
            .into_iter()
            .find(|interval| interval.as_str() == s)
            .ok_or_else(|| format!("Invalid interval: {s}"))
    }
}

impl TryFrom<String> for Interval {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for &'static str {
    fn from(interval: Interval) -> Self {
        interval.as_str()
    }
}
