//! Per-connection MLLP state machine (spec.md §4.1, component C7): frames
//! bytes off the socket, synthesizes and writes ACKs, and publishes both
//! the raw inbound payload and any parse exception, before handing
//! successfully parsed frames to the operation dispatcher.
//!
//! The read/extract/reply loop is grounded in the `handle_connection` /
//! `extract_mllp_message` shape from the pack's MLLP codec example (split
//! stream, buffered read loop, scan for a complete frame), generalized to
//! the byte-accurate framing and watermarked backlog in
//! [`crate::mllp::framing`].

use crate::config::AppConfig;
use crate::dispatch;
use crate::hl7::{self, InboundMessage, InternalErrorData};
use crate::kafka::Publisher;
use crate::mllp::framing::{self, PushOutcome, RecvBuffer};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const READ_CHUNK_SIZE: usize = 8192;

/// Logical connection state (spec.md §4.1). The read loop below is
/// sequential, so these are points in time rather than states a separate
/// task observes, but they drive the same transitions and log the same
/// moments the state machine names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Reading,
    ReadingSuspended,
    WritingAck,
    Closing,
}

/// Drives one client connection end to end. Runs until the peer closes the
/// socket, sends a frame not opening with the MLLP start block, overruns
/// the receive backlog, or an ACK write fails.
pub async fn handle(
    mut stream: TcpStream,
    peer: SocketAddr,
    config: Arc<AppConfig>,
    publisher: Arc<Publisher>,
) {
    let mut buffer = RecvBuffer::new();
    let mut state = State::Reading;
    let mut read_buf = vec![0u8; READ_CHUNK_SIZE];

    'outer: loop {
        let n = match stream.read(&mut read_buf).await {
            Ok(0) => {
                debug!("{peer}: connection closed by peer");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("{peer}: read error: {e}");
                break;
            }
        };

        let chunk = read_buf[..n].to_vec();
        if !buffer.first_chunk_has_start_block(&chunk) {
            warn!("{peer}: frame did not open with the MLLP start block, closing connection");
            break;
        }

        match buffer.push(chunk) {
            PushOutcome::Overrun => {
                warn!("{peer}: receive backlog exceeded the hard limit, closing connection");
                break;
            }
            PushOutcome::Suspend => {
                state = State::ReadingSuspended;
                info!("{peer}: backlog crossed the high watermark, pausing reads");
            }
            PushOutcome::Accepted => {}
        }

        while let Some(frame) = buffer.try_extract_frame() {
            state = State::WritingAck;
            match process_frame(&mut stream, peer, &config, &publisher, &frame.text).await {
                Ok(()) => {
                    if buffer.ack_written(frame.byte_len) {
                        info!("{peer}: backlog fell below the low watermark, resuming reads");
                    }
                }
                Err(()) => {
                    state = State::Closing;
                    break 'outer;
                }
            }
            state = if buffer.suspended {
                State::ReadingSuspended
            } else {
                State::Reading
            };
        }
    }
}

/// Handles one fully framed message (spec.md §4.1 "ACK protocol"). Returns
/// `Err(())` only when writing back to the socket itself fails, which is
/// the one failure mode that closes the connection from inside this
/// function (spec.md's `CLOSING` transition on "error ACK write
/// completion").
async fn process_frame(
    stream: &mut TcpStream,
    peer: SocketAddr,
    config: &AppConfig,
    publisher: &Publisher,
    decoded: &str,
) -> Result<(), ()> {
    match hl7::parse_frame(decoded) {
        Err(err) => handle_parse_error(stream, peer, config, publisher, err).await,
        Ok(inbound) if inbound.is_ack() => {
            // Case (a): the inbound frame is itself an ACK for a prior
            // outbound message. Log and move on; no publish, no reply.
            info!(
                "{peer}: received incoming ACK for {} ({}), not replying",
                inbound.bundle_id,
                inbound.action_code.as_deref().unwrap_or("no code")
            );
            Ok(())
        }
        Ok(inbound) => handle_inbound_message(stream, peer, config, publisher, decoded, inbound).await,
    }
}

/// Case (b) of spec.md §4.1's ACK protocol: publish the raw payload,
/// write the ACK back, then dispatch for FHIR projection.
async fn handle_inbound_message(
    stream: &mut TcpStream,
    peer: SocketAddr,
    config: &AppConfig,
    publisher: &Publisher,
    decoded: &str,
    inbound: InboundMessage,
) -> Result<(), ()> {
    let request_topic = &config.hl7v2_message.request_in.topic;
    if let Err(e) = publisher
        .publish(request_topic, &inbound.bundle_id, decoded)
        .await
    {
        error!("{peer}: failed to publish raw payload for {}: {e}", inbound.bundle_id);
    }

    write_framed(stream, peer, &inbound.ack_msg).await?;

    if let Err(e) = dispatch::dispatch(config, publisher, decoded, &inbound).await {
        error!("{peer}: dispatch failed for {}: {e}", inbound.bundle_id);
    }

    Ok(())
}

/// Failure semantics of spec.md §4.1: publish the exception to the
/// configured exceptions-sink topic, then write the CE ACK back. The
/// connection stays open unless the write itself fails.
async fn handle_parse_error(
    stream: &mut TcpStream,
    peer: SocketAddr,
    config: &AppConfig,
    publisher: &Publisher,
    err: InternalErrorData,
) -> Result<(), ()> {
    warn!(
        "{peer}: parse error {:?} (exception {}): {}",
        err.error, err.exception_id, err.original_msg
    );

    let exceptions_topic = &config.hl7v2_message.inbound_fhir_transactions.exceptions.topic;
    let record = serde_json::json!({
        "exceptionId": err.exception_id.to_string(),
        "error": format!("{:?}", err.error),
        "originalMsg": err.original_msg,
    });
    if let Err(e) = publisher
        .publish(exceptions_topic, &err.exception_id.to_string(), &record.to_string())
        .await
    {
        error!("{peer}: failed to publish parse exception {}: {e}", err.exception_id);
    }

    write_framed(stream, peer, &err.exception_ack_msg).await
}

async fn write_framed(stream: &mut TcpStream, peer: SocketAddr, payload: &str) -> Result<(), ()> {
    let framed = framing::frame(payload);
    if let Err(e) = stream.write_all(&framed).await {
        warn!("{peer}: ACK write failed, closing connection: {e}");
        return Err(());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_transitions_from_suspend_are_distinct_from_reading() {
        assert_ne!(State::Reading, State::ReadingSuspended);
    }
}
