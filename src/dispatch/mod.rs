//! Operation dispatcher (spec.md §4.6, component C6): routes a parsed
//! [`InboundMessage`] by trigger event. Only `A28` is projected into FHIR;
//! every other event is logged and dropped.

pub mod message_type;

use crate::config::AppConfig;
use crate::dispatch::message_type::MessageType;
use crate::fhir;
use crate::hl7::types::InboundMessage;
use crate::kafka::{KafkaError, Publisher};
use log::{info, warn};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to build FHIR bundle: {0}")]
    Mapping(#[from] fhir::MappingError),
    #[error("failed to serialize bundle: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to publish to kafka: {0}")]
    Publish(#[from] KafkaError),
}

/// Routes a successfully parsed frame (spec.md §4.6): `(a)` a second-pass
/// projection into FHIR for `A28`, `(b)` log-and-drop for everything else.
/// `raw` is the decoded frame text the [`InboundMessage`] was parsed from.
pub async fn dispatch(
    config: &AppConfig,
    publisher: &Publisher,
    raw: &str,
    inbound: &InboundMessage,
) -> Result<(), DispatchError> {
    let Ok(message_type) = MessageType::from_str(&inbound.trigger_event) else {
        // The parser itself already rejects truly unknown trigger events
        // before an InboundMessage exists; this branch only guards against
        // a future trigger_event value this dispatcher hasn't caught up to.
        warn!(
            "dropping message {}: unrecognized trigger event {}",
            inbound.bundle_id, inbound.trigger_event
        );
        return Ok(());
    };

    if message_type != MessageType::AddPersonInformation {
        info!(
            "dropping event {message_type} for bundle {}: only A28 is projected into FHIR",
            inbound.bundle_id
        );
        return Ok(());
    }

    // Second-pass parse into a typed ADT_A05 for field access (spec.md
    // §4.2, §4.6 step (a)). The FHIR mappers themselves still read the raw
    // segment text directly (see DESIGN.md), but this re-parse is the
    // dispatcher's own structural sanity check and audit-log record of
    // what it is about to project.
    match crate::hl7::parser::second_pass(raw) {
        Ok(second_pass) => info!(
            "second-pass parse for bundle {}: event {}",
            inbound.bundle_id, second_pass.message_event
        ),
        Err(e) => warn!(
            "second-pass parse failed for bundle {}: {e}",
            inbound.bundle_id
        ),
    }

    let bundle = fhir::build_bundle(config, raw)?;
    let payload = serde_json::to_string(&bundle)?;

    let topic = &config.hl7v2_message.inbound_fhir_transactions.topic;
    publisher.publish(topic, &inbound.bundle_id, &payload).await?;

    info!("published FHIR bundle for control id {}", inbound.bundle_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_a28_events_are_not_errors() {
        // message_type parsing alone is exercised in message_type's own tests;
        // dispatch's branching is exercised end-to-end via the connection
        // handler's integration tests.
        assert!(MessageType::from_str("A01").is_ok());
    }
}
