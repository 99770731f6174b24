use crate::model::SpotPrice;
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpotPriceError {
    #[error("spot price source unavailable")]
    SourceUnavailable(#[from] reqwest::Error),
    #[error("no price data available for area {0}")]
    AreaNotFound(String),
    #[error("price response for area {0} contains no hourly values")]
    EmptyResult(String),
}

/// Seam towards the external price-data provider. Returns the hourly price
/// points of one market day for one price area; the scheduler calls it for
/// the current date and the next one every cycle so tomorrow's prices are
/// cached as soon as the provider releases them.
#[async_trait]
pub trait SpotPriceClient: Send + Sync {
    async fn get_spot_prices(
        &self,
        area: &str,
        date: NaiveDate,
    ) -> Result<Vec<SpotPrice>, SpotPriceError>;
}
