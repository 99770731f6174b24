use jarvis_spot_price_tracker::mqtt_client::{MqttClient, MqttClientConfig};
use jarvis_spot_price_tracker::nordpool_client::{NordpoolClient, NordpoolClientConfig};
use jarvis_spot_price_tracker::price_tracker::{PriceTracker, PriceTrackerConfig};
use jarvis_spot_price_tracker::tracker_service::{TrackerService, TrackerServiceConfig};
use std::error::Error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Missing broker configuration is the only startup-fatal condition.
    let mqtt_client = MqttClient::connect(MqttClientConfig::from_env()?);

    let nordpool_client = NordpoolClient::new(NordpoolClientConfig::from_env());

    let price_tracker = PriceTracker::new(PriceTrackerConfig::from_env()?, Box::new(mqtt_client));

    let mut tracker_service = TrackerService::new(
        TrackerServiceConfig::from_env()?,
        Box::new(nordpool_client),
        price_tracker,
    );

    tracker_service.run().await
}
