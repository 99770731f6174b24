use crate::config::{self, ConfigError};
use crate::model::{truncate_to_hour, PriceCache};
use crate::publish_client::PublishClient;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

/// Converts a wholesale price per MWh into the published billing unit:
/// minor currency units per kWh including tax. Dividing by 10 covers both
/// MWh to kWh (factor 1000) and major to minor currency units (factor 100).
pub fn to_billing_unit(wholesale_price_per_mwh: f64, tax_rate: f64) -> f64 {
    (wholesale_price_per_mwh / 10.0) * (1.0 + tax_rate)
}

pub struct PriceTrackerConfig {
    pub topic: String,
    pub tax_rate: f64,
}

impl PriceTrackerConfig {
    pub fn new(topic: String, tax_rate: f64) -> Self {
        debug!(
            "PriceTrackerConfig::new(topic: {}, tax_rate: {})",
            topic, tax_rate
        );
        Self { topic, tax_rate }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let topic = config::optional_var("MQTT_TOPIC", "electricity/nordpool/price");
        let tax_rate = config::parse_var("TAX_RATE", 0.255)?;

        Ok(Self::new(topic, tax_rate))
    }
}

/// Tracks which cached hourly price is active at the current wall-clock time
/// and publishes the converted value whenever it changes. The comparison is on
/// the raw wholesale price, not the rounded payload, so two prices that happen
/// to round to the same payload still count as a change and an unchanged price
/// never produces broker traffic.
pub struct PriceTracker {
    config: PriceTrackerConfig,
    publish_client: Box<dyn PublishClient>,
    current_price: Option<f64>,
}

impl PriceTracker {
    pub fn new(config: PriceTrackerConfig, publish_client: Box<dyn PublishClient>) -> Self {
        Self {
            config,
            publish_client,
            current_price: None,
        }
    }

    pub fn current_price(&self) -> Option<f64> {
        self.current_price
    }

    /// One check cycle: look up the price for the hour containing `now` and
    /// publish it if it differs from the last published one. Repeated calls
    /// within the same hour with an unchanged cache are no-ops.
    pub async fn check_current_price(&mut self, price_cache: &PriceCache, now: DateTime<Utc>) {
        if price_cache.is_empty() {
            warn!("No price data available");
            return;
        }

        let now_hour = truncate_to_hour(now);
        let candidate = match price_cache.get(&now_hour) {
            Some(price) => price,
            None => {
                warn!("No price data for current hour {}", now_hour);
                return;
            }
        };

        if self.current_price == Some(candidate) {
            return;
        }

        match self.current_price {
            Some(previous) => info!(
                "Price changed: {:.3} -> {:.3} EUR/MWh",
                previous, candidate
            ),
            None => info!("Tracking initial price {:.3} EUR/MWh", candidate),
        }

        // The tracked price advances before the publish, so a failed publish
        // is absorbed and the value is only sent again on the next change.
        self.current_price = Some(candidate);

        let converted = to_billing_unit(candidate, self.config.tax_rate);
        let payload = format!("{:.2}", converted);

        match self
            .publish_client
            .publish(&self.config.topic, payload)
            .await
        {
            Ok(()) => info!(
                "Published price {:.3} cents/kWh (with tax) to {}",
                converted, self.config.topic
            ),
            Err(e) => error!("Failed to publish price: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SpotPrice;
    use crate::publish_client::PublishError;
    use assert2::{check, let_assert};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingPublishClient {
        published: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl RecordingPublishClient {
        fn published(&self) -> Vec<(String, String)> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PublishClient for RecordingPublishClient {
        async fn publish(&self, topic: &str, payload: String) -> Result<(), PublishError> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload));
            Ok(())
        }
    }

    struct FailingPublishClient;

    #[async_trait]
    impl PublishClient for FailingPublishClient {
        async fn publish(&self, _topic: &str, _payload: String) -> Result<(), PublishError> {
            Err(PublishError::SinkUnavailable("connection reset".into()))
        }
    }

    fn hour(h: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 14, h, 0, 0).unwrap()
    }

    fn tracker_with_sink(sink: RecordingPublishClient) -> PriceTracker {
        PriceTracker::new(
            PriceTrackerConfig::new("electricity/nordpool/price".to_string(), 0.255),
            Box::new(sink),
        )
    }

    fn cache_with(prices: &[(u32, f64)]) -> PriceCache {
        let mut cache = PriceCache::new();
        cache.extend(prices.iter().map(|&(h, price)| SpotPrice {
            hour_start: hour(h),
            market_price: price,
        }));
        cache
    }

    #[test]
    fn to_billing_unit_divides_by_ten_and_adds_tax() {
        check!((to_billing_unit(60.0, 0.255) - 7.53).abs() < 1e-9);
        check!((to_billing_unit(45.2, 0.255) - 5.6726).abs() < 1e-9);
        check!(to_billing_unit(0.0, 0.255) == 0.0);
        check!(to_billing_unit(100.0, 0.0) == 10.0);
    }

    #[tokio::test]
    async fn first_check_publishes_converted_rounded_price() {
        let sink = RecordingPublishClient::default();
        let mut tracker = tracker_with_sink(sink.clone());
        let cache = cache_with(&[(9, 60.0)]);

        let now = Utc.with_ymd_and_hms(2023, 6, 14, 9, 3, 0).unwrap();
        tracker.check_current_price(&cache, now).await;

        let published = sink.published();
        let_assert!([(topic, payload)] = published.as_slice());
        check!(topic == "electricity/nordpool/price");
        check!(payload == "7.53");
        check!(tracker.current_price() == Some(60.0));
    }

    #[tokio::test]
    async fn repeated_checks_within_same_hour_publish_once() {
        let sink = RecordingPublishClient::default();
        let mut tracker = tracker_with_sink(sink.clone());
        let cache = cache_with(&[(9, 60.0)]);

        tracker.check_current_price(&cache, hour(9)).await;
        let now = Utc.with_ymd_and_hms(2023, 6, 14, 9, 15, 0).unwrap();
        tracker.check_current_price(&cache, now).await;
        let now = Utc.with_ymd_and_hms(2023, 6, 14, 9, 30, 0).unwrap();
        tracker.check_current_price(&cache, now).await;

        check!(sink.published().len() == 1);
    }

    #[tokio::test]
    async fn unchanged_price_across_hours_is_not_republished() {
        let sink = RecordingPublishClient::default();
        let mut tracker = tracker_with_sink(sink.clone());
        let cache = cache_with(&[(8, 10.0), (9, 10.0), (10, 12.5)]);

        tracker.check_current_price(&cache, hour(8)).await;
        tracker.check_current_price(&cache, hour(9)).await;
        tracker.check_current_price(&cache, hour(10)).await;

        // Initial publish and the 12.5 change; the repeated 10.0 is a no-op.
        let published = sink.published();
        let_assert!([(_, first), (_, second)] = published.as_slice());
        check!(first == "1.25");
        check!(second == "1.57");
        check!(tracker.current_price() == Some(12.5));
    }

    #[tokio::test]
    async fn data_gap_publishes_nothing_and_keeps_state() {
        let sink = RecordingPublishClient::default();
        let mut tracker = tracker_with_sink(sink.clone());
        let cache = cache_with(&[(8, 45.2)]);

        tracker.check_current_price(&cache, hour(8)).await;
        tracker.check_current_price(&cache, hour(9)).await;

        check!(sink.published().len() == 1);
        check!(tracker.current_price() == Some(45.2));
    }

    #[tokio::test]
    async fn empty_cache_publishes_nothing() {
        let sink = RecordingPublishClient::default();
        let mut tracker = tracker_with_sink(sink.clone());
        let cache = PriceCache::new();

        tracker.check_current_price(&cache, hour(9)).await;

        check!(sink.published().is_empty());
        check!(tracker.current_price() == None);
    }

    #[tokio::test]
    async fn change_detection_compares_raw_price_not_rounded_payload() {
        let sink = RecordingPublishClient::default();
        let mut tracker = tracker_with_sink(sink.clone());
        // Both convert to 1.26 after rounding, but the raw prices differ.
        let cache = cache_with(&[(8, 10.001), (9, 10.002)]);

        tracker.check_current_price(&cache, hour(8)).await;
        tracker.check_current_price(&cache, hour(9)).await;

        let published = sink.published();
        let_assert!([(_, first), (_, second)] = published.as_slice());
        check!(first == "1.26");
        check!(second == "1.26");
    }

    #[tokio::test]
    async fn publish_failure_is_absorbed_and_state_still_advances() {
        let mut tracker = PriceTracker::new(
            PriceTrackerConfig::new("electricity/nordpool/price".to_string(), 0.255),
            Box::new(FailingPublishClient),
        );
        let cache = cache_with(&[(9, 60.0)]);

        tracker.check_current_price(&cache, hour(9)).await;

        check!(tracker.current_price() == Some(60.0));
    }
}
