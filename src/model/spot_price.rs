use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

/// A single hourly price point as stored in the cache. `hour_start` is the
/// hour-aligned UTC timestamp the price applies from; `market_price` is the
/// raw wholesale price in the source currency per MWh.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpotPrice {
    pub hour_start: DateTime<Utc>,
    pub market_price: f64,
}

/// Truncates a timestamp to the start of its hour. Cache keys and the check
/// path's current-hour lookup both go through this, so equality is exact-match
/// on the hour key.
pub fn truncate_to_hour(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .duration_trunc(Duration::hours(1))
        .unwrap_or(timestamp)
}
