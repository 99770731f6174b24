use crate::config::{self, ConfigError};
use crate::publish_client::{PublishClient, PublishError};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Broker connection state as observed from the event loop. Polled via
/// `MqttClient::connection_state` instead of registered callbacks, so
/// transitions can be asserted on deterministically.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Error(String),
}

pub struct MqttClientConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub qos: QoS,
    pub retain: bool,
}

impl MqttClientConfig {
    pub fn new(
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        client_id: String,
        qos: QoS,
        retain: bool,
    ) -> Self {
        debug!(
            "MqttClientConfig::new(host: {}, port: {}, client_id: {})",
            host, port, client_id
        );
        Self {
            host,
            port,
            username,
            password,
            client_id,
            qos,
            retain,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        // A tracker without a broker has nowhere to publish, so this is the
        // one startup-fatal configuration value.
        let host = config::required_var("MQTT_BROKER")?;
        let port = config::parse_var("MQTT_PORT", 1883)?;
        let username = std::env::var("MQTT_USERNAME").ok();
        let password = std::env::var("MQTT_PASSWORD").ok();
        let client_id = config::optional_var("MQTT_CLIENT_ID", "jarvis-spot-price-tracker");
        let qos = parse_qos(config::parse_var("MQTT_QOS", 1)?)?;
        let retain = config::parse_var("MQTT_RETAIN", true)?;

        Ok(Self::new(
            host, port, username, password, client_id, qos, retain,
        ))
    }
}

pub fn parse_qos(level: u8) -> Result<QoS, ConfigError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(ConfigError::InvalidValue {
            variable: "MQTT_QOS",
            message: format!("{} is not a valid QoS level", other),
        }),
    }
}

/// Publish Gateway backed by a single long-lived MQTT connection. The rumqttc
/// event loop reconnects on its own; this client only drives it and mirrors
/// what it sees into the connection-state channel.
pub struct MqttClient {
    client: AsyncClient,
    qos: QoS,
    retain: bool,
    state: watch::Receiver<ConnectionState>,
}

impl MqttClient {
    pub fn connect(config: MqttClientConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username.clone(), password.clone());
        }

        let (client, mut event_loop) = AsyncClient::new(options, 10);
        let (state_sender, state) = watch::channel(ConnectionState::Disconnected);

        tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected to MQTT broker");
                        state_sender.send_replace(ConnectionState::Connected);
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        warn!("Disconnected from MQTT broker");
                        state_sender.send_replace(ConnectionState::Disconnected);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("MQTT connection error: {}", e);
                        state_sender.send_replace(ConnectionState::Error(e.to_string()));
                        tokio::time::sleep(RECONNECT_BACKOFF).await;
                    }
                }
            }
        });

        Self {
            client,
            qos: config.qos,
            retain: config.retain,
            state,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }
}

#[async_trait]
impl PublishClient for MqttClient {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), PublishError> {
        self.client
            .publish(topic, self.qos, self.retain, payload)
            .await
            .map_err(|e| PublishError::SinkUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    #[test]
    fn parse_qos_maps_levels() {
        let_assert!(Ok(QoS::AtMostOnce) = parse_qos(0));
        let_assert!(Ok(QoS::AtLeastOnce) = parse_qos(1));
        let_assert!(Ok(QoS::ExactlyOnce) = parse_qos(2));
    }

    #[test]
    fn parse_qos_rejects_invalid_level() {
        let_assert!(Err(ConfigError::InvalidValue { variable, .. }) = parse_qos(3));
        check!(variable == "MQTT_QOS");
    }

    #[tokio::test]
    async fn connect_starts_disconnected() {
        let config = MqttClientConfig::new(
            "localhost".to_string(),
            1883,
            None,
            None,
            "test-client".to_string(),
            QoS::AtLeastOnce,
            true,
        );

        let client = MqttClient::connect(config);

        check!(client.connection_state() == ConnectionState::Disconnected);
    }
}
