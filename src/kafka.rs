//! Kafka egress (spec.md §4.6, §6, component C9): publishes `(key,
//! payload)` records to a configured topic. Fire-and-forget from the
//! connection handler's point of view (spec.md §5) — the returned future
//! is awaited here, but the handler issues the publish before writing the
//! ACK rather than joining it first.
//!
//! Producer construction is grounded in the teacher's
//! `create_producer`/`set_ssl_config` (`examples/diz-unimr-adt-to-fhir/src/main.rs`).

use crate::config::{Kafka, Ssl};
use rdkafka::config::RDKafkaLogLevel;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KafkaError {
    #[error("failed to create kafka producer: {0}")]
    Create(#[from] rdkafka::error::KafkaError),
    #[error("failed to publish record: {0}")]
    Publish(rdkafka::error::KafkaError),
}

/// Thin wrapper around [`FutureProducer`] exposing just the
/// `(topic, key, payload)` publish this gateway needs.
#[derive(Clone)]
pub struct Publisher {
    producer: FutureProducer,
}

impl Publisher {
    pub fn new(config: &Kafka) -> Result<Self, KafkaError> {
        Ok(Publisher {
            producer: create_producer(config)?,
        })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        self.producer
            .send(record, Timeout::Never)
            .await
            .map_err(|(e, _)| KafkaError::Publish(e))?;

        Ok(())
    }
}

fn create_producer(config: &Kafka) -> Result<FutureProducer, KafkaError> {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.bootstrapservers)
        .set("security.protocol", &config.security_protocol)
        .set("compression.type", "gzip")
        .set("message.max.bytes", "6242880")
        .set_log_level(RDKafkaLogLevel::Debug);

    Ok(set_ssl_config(client_config, &config.ssl).create()?)
}

fn set_ssl_config(mut client_config: ClientConfig, ssl: &Option<Ssl>) -> ClientConfig {
    if let Some(ssl) = ssl {
        if let Some(value) = &ssl.ca_location {
            client_config.set("ssl.ca.location", value);
        }
        if let Some(value) = &ssl.key_location {
            client_config.set("ssl.key.location", value);
        }
        if let Some(value) = &ssl.certificate_location {
            client_config.set("ssl.certificate.location", value);
        }
        if let Some(value) = &ssl.key_password {
            client_config.set("ssl.key.password", value);
        }
    }
    client_config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn publisher_can_be_constructed_from_default_config() {
        let config = AppConfig::default();
        assert!(Publisher::new(&config.kafka).is_ok());
    }
}
