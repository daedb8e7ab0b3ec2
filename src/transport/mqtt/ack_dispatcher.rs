//! Correlation of inbound acknowledgments to client sessions
//!
//! The decoding layer hands complete PINGRESP, SUBACK and UNSUBACK packets to
//! the dispatcher together with the socket they arrived on. The socket is the
//! only link back to the session; there is no request/response pairing beyond
//! it.

use super::registry::ClientRegistry;
use super::session::Session;
use crate::error::{MqttError, MqttResult};
use crate::transport::SocketHandle;
use rumqttc::v5::mqttbytes::v5::{Packet, SubAck, SubscribeReasonCode, UnsubAck};
use rumqttc::v5::mqttbytes::QoS;
use tracing::{debug, error};

/// Per-filter outcome carried by a SUBACK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubackReason {
    Granted(QoS),
    Rejected,
}

/// Decoded SUBACK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suback {
    pub msg_id: u16,
    pub reasons: Vec<SubackReason>,
}

impl Suback {
    /// Number of filters the broker granted
    pub fn granted(&self) -> usize {
        self.reasons
            .iter()
            .filter(|reason| matches!(reason, SubackReason::Granted(_)))
            .count()
    }
}

impl From<SubAck> for Suback {
    fn from(suback: SubAck) -> Self {
        Self {
            msg_id: suback.pkid,
            reasons: suback
                .return_codes
                .iter()
                .map(|code| match code {
                    SubscribeReasonCode::Success(qos) => SubackReason::Granted(*qos),
                    _ => SubackReason::Rejected,
                })
                .collect(),
        }
    }
}

/// Decoded UNSUBACK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsuback {
    pub msg_id: u16,
}

impl From<UnsubAck> for Unsuback {
    fn from(unsuback: UnsubAck) -> Self {
        Self {
            msg_id: unsuback.pkid,
        }
    }
}

/// Outcome of dispatching one packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// The packet was matched to its session and processed
    Complete,
    /// Not an acknowledgment this dispatcher handles
    Ignored,
}

/// Routes acknowledgments to sessions through an injected registry
pub struct AckDispatcher<'r, R: ClientRegistry> {
    registry: &'r mut R,
}

impl<'r, R: ClientRegistry> AckDispatcher<'r, R> {
    pub fn new(registry: &'r mut R) -> Self {
        Self { registry }
    }

    /// PINGRESP: the keep-alive round trip finished
    pub fn handle_ping_response(&mut self, socket: SocketHandle) -> MqttResult<DispatchStatus> {
        let session = self.session_for(socket, "PINGRESP")?;
        debug!(%socket, client_id = session.client_id(), "PINGRESP received");
        session.ping_outstanding = false;
        Ok(DispatchStatus::Complete)
    }

    /// SUBACK: logged for observability, then released.
    ///
    /// No outstanding-request table is consulted.
    pub fn handle_suback(&mut self, suback: Suback, socket: SocketHandle) -> MqttResult<DispatchStatus> {
        let session = self.session_for(socket, "SUBACK")?;
        debug!(
            %socket,
            client_id = session.client_id(),
            msg_id = suback.msg_id,
            granted = suback.granted(),
            reasons = ?suback.reasons,
            "SUBACK received"
        );
        Ok(DispatchStatus::Complete)
    }

    /// UNSUBACK: logged, then released
    pub fn handle_unsuback(
        &mut self,
        unsuback: Unsuback,
        socket: SocketHandle,
    ) -> MqttResult<DispatchStatus> {
        let session = self.session_for(socket, "UNSUBACK")?;
        debug!(
            %socket,
            client_id = session.client_id(),
            msg_id = unsuback.msg_id,
            "UNSUBACK received"
        );
        Ok(DispatchStatus::Complete)
    }

    /// Route a decoded packet to its handler.
    ///
    /// Packets other than PINGRESP, SUBACK and UNSUBACK belong to other layers
    /// and are reported as [`DispatchStatus::Ignored`].
    pub fn dispatch(&mut self, packet: Packet, socket: SocketHandle) -> MqttResult<DispatchStatus> {
        match packet {
            Packet::PingResp { .. } => self.handle_ping_response(socket),
            Packet::SubAck(suback) => self.handle_suback(suback.into(), socket),
            Packet::UnsubAck(unsuback) => self.handle_unsuback(unsuback.into(), socket),
            other => {
                debug!(%socket, "Not an acknowledgment, ignoring: {:?}", other);
                Ok(DispatchStatus::Ignored)
            }
        }
    }

    /// Resolve the owning session. A miss means the registry and the transport
    /// disagree about which sockets are live.
    fn session_for(
        &mut self,
        socket: SocketHandle,
        packet: &'static str,
    ) -> MqttResult<&mut Session<R::Tls>> {
        self.registry.find_by_socket(socket).ok_or_else(|| {
            error!(%socket, packet, "No session registered for socket");
            MqttError::SessionNotFound(socket)
        })
    }
}
