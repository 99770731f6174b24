pub mod config;
pub mod model;
pub mod mqtt_client;
pub mod nordpool_client;
pub mod price_tracker;
pub mod publish_client;
pub mod spot_price_client;
pub mod tracker_service;
