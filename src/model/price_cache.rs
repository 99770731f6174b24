use crate::model::SpotPrice;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// In-memory mapping from an hour-aligned UTC timestamp to the wholesale
/// price active during that hour. Covers a rolling window of today and, once
/// the provider has released them, tomorrow. Replaced wholesale on each
/// successful fetch cycle so corrected provider data never merges with stale
/// entries.
#[derive(Debug, Default)]
pub struct PriceCache {
    prices: HashMap<DateTime<Utc>, f64>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.prices.clear();
    }

    pub fn put(&mut self, hour_start: DateTime<Utc>, market_price: f64) {
        self.prices.insert(hour_start, market_price);
    }

    pub fn get(&self, hour_start: &DateTime<Utc>) -> Option<f64> {
        self.prices.get(hour_start).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }
}

impl Extend<SpotPrice> for PriceCache {
    fn extend<I: IntoIterator<Item = SpotPrice>>(&mut self, spot_prices: I) {
        for spot_price in spot_prices {
            self.put(spot_price.hour_start, spot_price.market_price);
        }
    }
}
