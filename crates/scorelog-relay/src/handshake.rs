use scorelog_transport::{ChannelEndpoint, StartupBarrier, TransportError};
use tracing::{debug, info};

use crate::control::{ControlCommand, ControlReply, MAX_CONTROL_MESSAGE};
use crate::error::{RelayError, Result};

/// A registration that was sent but not yet acknowledged.
///
/// Keeps the local copy of the transferred endpoint open; it is closed once
/// the supervisor accepts the registration.
#[derive(Debug)]
pub struct PendingRegistration {
    command: ControlCommand,
    transferred: ChannelEndpoint,
}

impl PendingRegistration {
    /// The command that was sent.
    pub fn command(&self) -> &ControlCommand {
        &self.command
    }

    /// Resolve the registration with the supervisor's reply.
    ///
    /// The local copy of the transferred endpoint is closed in both cases;
    /// a refused registration is returned as an error.
    pub fn complete(self, reply: &ControlReply) -> Result<()> {
        drop(self.transferred);
        if reply.is_success() {
            debug!(command = ?self.command, "registration acknowledged");
            Ok(())
        } else {
            Err(RelayError::RegistrationRefused(reply.status()))
        }
    }
}

/// Hand `peer` to the supervisor as the telemetry channel.
///
/// The barrier is held only for the duration of the send, so sibling workers
/// register one at a time. The acknowledgment arrives later on `control` and
/// is read with [`read_reply`].
pub fn register(
    control: &ChannelEndpoint,
    peer: ChannelEndpoint,
    barrier: &StartupBarrier,
) -> Result<PendingRegistration> {
    let command = {
        let _guard = barrier.lock()?;
        let command = ControlCommand::telemetry_channel();
        let payload = serde_json::to_vec(&command)?;
        if payload.len() > MAX_CONTROL_MESSAGE {
            return Err(TransportError::MessageTooLarge {
                size: payload.len(),
                max: MAX_CONTROL_MESSAGE,
            }
            .into());
        }
        control.send_with_endpoint(&payload, &peer)?;
        command
    };

    info!(mode = %peer.mode(), "registered telemetry channel with supervisor");
    Ok(PendingRegistration {
        command,
        transferred: peer,
    })
}

/// Read one reply from the control channel.
///
/// An ordered control channel that reads zero bytes after the supervisor
/// hung up yields [`RelayError::Disconnected`]. Anything that is not a valid
/// reply, an empty message included, comes back as a JSON or protocol error.
pub fn read_reply(control: &ChannelEndpoint) -> Result<ControlReply> {
    let mut buf = [0u8; MAX_CONTROL_MESSAGE];
    let received = control.recv(&mut buf).map_err(TransportError::Io)?;

    if control
        .at_end_of_stream(received)
        .map_err(TransportError::Io)?
    {
        return Err(RelayError::Disconnected(
            "control channel closed".to_string(),
        ));
    }
    if received.len == 0 {
        return Err(RelayError::ProtocolViolation(
            "empty control message".to_string(),
        ));
    }
    if received.truncated {
        return Err(RelayError::ProtocolViolation(format!(
            "control message exceeds {MAX_CONTROL_MESSAGE} bytes"
        )));
    }

    Ok(serde_json::from_slice(&buf[..received.len])?)
}

/// Supervisor side: receive one registration command and its endpoint.
pub fn accept_registration(control: &ChannelEndpoint) -> Result<(ControlCommand, ChannelEndpoint)> {
    let mut buf = [0u8; MAX_CONTROL_MESSAGE];
    let (received, endpoint) = control.recv_with_endpoint(&mut buf)?;

    if control
        .at_end_of_stream(received)
        .map_err(TransportError::Io)?
    {
        return Err(RelayError::Disconnected(
            "control channel closed".to_string(),
        ));
    }
    if received.truncated {
        return Err(RelayError::ProtocolViolation(format!(
            "control message exceeds {MAX_CONTROL_MESSAGE} bytes"
        )));
    }

    let command: ControlCommand = serde_json::from_slice(&buf[..received.len])?;
    let endpoint = endpoint.ok_or_else(|| {
        RelayError::ProtocolViolation("registration carried no descriptor".to_string())
    })?;
    debug!(?command, mode = %endpoint.mode(), "accepted registration");
    Ok((command, endpoint))
}

/// Supervisor side: send the reply for a registration.
pub fn acknowledge(control: &ChannelEndpoint, reply: &ControlReply) -> Result<()> {
    let payload = serde_json::to_vec(reply)?;
    let sent = control.send(&payload).map_err(TransportError::Io)?;
    if sent != payload.len() {
        return Err(RelayError::ProtocolViolation(format!(
            "short control send: {sent} of {} bytes",
            payload.len()
        )));
    }
    Ok(())
}
