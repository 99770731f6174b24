use crate::config;
use crate::model::{truncate_to_hour, SpotPrice};
use crate::spot_price_client::{SpotPriceClient, SpotPriceError};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const DEFAULT_API_URL: &str = "https://www.nordpoolgroup.com/api/marketdata/page/10";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize, Debug)]
pub struct SpotPriceResponse {
    pub areas: HashMap<String, AreaPrices>,
}

#[derive(Deserialize, Debug)]
pub struct AreaPrices {
    pub values: Vec<HourlyValue>,
}

#[derive(Deserialize, Debug)]
pub struct HourlyValue {
    pub start: DateTime<FixedOffset>,
    pub value: f64,
}

pub struct NordpoolClientConfig {
    api_url: String,
    currency: String,
}

impl NordpoolClientConfig {
    pub fn new(api_url: String, currency: String) -> Self {
        debug!(
            "NordpoolClientConfig::new(api_url: {}, currency: {})",
            api_url, currency
        );
        Self { api_url, currency }
    }

    pub fn from_env() -> Self {
        let api_url = config::optional_var("PRICE_API_URL", DEFAULT_API_URL);
        let currency = config::optional_var("PRICE_CURRENCY", "EUR");

        Self::new(api_url, currency)
    }
}

/// Price Source adapter for the Nordpool day-ahead market-data API.
pub struct NordpoolClient {
    config: NordpoolClientConfig,
}

impl NordpoolClient {
    pub fn new(config: NordpoolClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SpotPriceClient for NordpoolClient {
    async fn get_spot_prices(
        &self,
        area: &str,
        date: NaiveDate,
    ) -> Result<Vec<SpotPrice>, SpotPriceError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let end_date = date.format("%d-%m-%Y").to_string();
        let response = client
            .get(&self.config.api_url)
            .query(&[
                ("currency", self.config.currency.as_str()),
                ("endDate", end_date.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<SpotPriceResponse>()
            .await?;

        spot_prices_from_response(response, area)
    }
}

/// Normalizes the provider response into cache-shaped price points: picks the
/// requested area, converts the provider's offset timestamps to UTC and
/// truncates them to the hour.
pub fn spot_prices_from_response(
    mut response: SpotPriceResponse,
    area: &str,
) -> Result<Vec<SpotPrice>, SpotPriceError> {
    let area_prices = response
        .areas
        .remove(area)
        .ok_or_else(|| SpotPriceError::AreaNotFound(area.to_string()))?;

    if area_prices.values.is_empty() {
        return Err(SpotPriceError::EmptyResult(area.to_string()));
    }

    Ok(area_prices
        .values
        .into_iter()
        .map(|hourly_value| SpotPrice {
            hour_start: truncate_to_hour(hourly_value.start.with_timezone(&Utc)),
            market_price: hourly_value.value,
        })
        .collect())
}
