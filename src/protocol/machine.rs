//! Tunnel connection state machine.
//!
//! The machine is sans-io and time-fed: it owns no sockets and reads no
//! clocks. Callers feed it inbound datagrams ([`TunnelMachine::handle_datagram`]),
//! application submissions ([`TunnelMachine::submit`]) and the passage of
//! time ([`TunnelMachine::handle_timeout`]); it answers through two drain
//! queues - [`TunnelMachine::poll_transmit`] for datagrams to put on the
//! wire and [`TunnelMachine::poll_event`] for notifications to the
//! application layer. [`TunnelMachine::next_timeout`] exposes the earliest
//! deadline the driver must wake up for.
//!
//! This keeps every transition deterministic: tests construct synthetic
//! [`Instant`]s and never sleep.
//!
//! ## States
//!
//! ```text
//! Disconnected ──connect()──> Connecting ──CONNECT_RESPONSE(0)──> Connected
//!       ^                        │  │                                 │
//!       │        status≠0 / 3×timeout  │                    ack/heartbeat lost,
//!       │<───────────────────────┘  │                 gateway or app disconnect
//!       │                           v                                 v
//!       └──────────────── Disconnecting <─────────────────────────────┘
//! ```
//!
//! One tunneling request may be in flight at a time; further submissions
//! queue behind it and are sent in order. A retransmission reuses the
//! original sequence number. Inbound telegrams are deduplicated by
//! re-acknowledging the immediately preceding sequence number without
//! dispatching it again.

use embassy_time::{Duration, Instant};
use heapless::{Deque, Vec};

use crate::addressing::IndividualAddress;
use crate::error::{KnxError, Result, WriteError};
use crate::net::IpEndpoint;
use crate::protocol::constants::{
    ServiceType, KNXNETIP_DEFAULT_PORT, MAX_CEMI_SIZE, MAX_FRAME_SIZE,
};
use crate::protocol::frame::{Hpai, KnxnetIpFrame};
use crate::protocol::services::{
    ConnectRequest, ConnectResponse, ConnectionHeader, ConnectionStateRequest,
    ConnectionStateResponse, DisconnectRequest, DisconnectResponse, RoutingIndication,
    TunnelingAck, TunnelingRequest,
};

/// Timeout for one CONNECT_REQUEST attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// CONNECT attempts before giving up.
pub const MAX_CONNECT_ATTEMPTS: u8 = 3;

/// Timeout waiting for a TUNNELING_ACK.
pub const ACK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Retransmissions of an unacknowledged TUNNELING_REQUEST.
pub const MAX_ACK_RETRANSMITS: u8 = 1;

/// Interval between CONNECTIONSTATE_REQUEST heartbeats.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Timeout waiting for a CONNECTIONSTATE_RESPONSE.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

/// Consecutive heartbeat failures that drop the tunnel.
pub const MAX_HEARTBEAT_FAILURES: u8 = 3;

/// Timeout waiting for a DISCONNECT_RESPONSE.
pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// First reconnect backoff step.
pub const RECONNECT_BACKOFF_MIN: Duration = Duration::from_secs(1);

/// Reconnect backoff cap.
pub const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Depth of the outbound application queue.
pub const TX_QUEUE_DEPTH: usize = 16;

const TRANSMIT_DEPTH: usize = 8;
const EVENT_DEPTH: usize = 16;

/// A cEMI frame held by value.
pub type CemiBuffer = Vec<u8, MAX_CEMI_SIZE>;

/// Host protocol mode of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostMode {
    /// Unicast UDP tunnel through a gateway (handshake, ACKs, heartbeat).
    Tunnel,
    /// Multicast routing (no connection, bare ROUTING_INDICATION frames).
    Routing,
}

/// Machine configuration.
#[derive(Debug, Clone, Copy)]
pub struct MachineConfig {
    /// Gateway control/data endpoint (tunnel mode) or the multicast group
    /// (routing mode).
    pub gateway: IpEndpoint,
    /// Local individual address advertised as telegram source. The
    /// gateway-assigned address takes precedence once connected.
    pub physical_address: IndividualAddress,
    /// Host protocol mode.
    pub mode: HostMode,
    /// Reconnect automatically after an unexpected disconnect.
    pub auto_reconnect: bool,
    /// Minimum spacing between outbound telegrams.
    pub minimum_send_interval: Duration,
    /// Queued writes older than this are dropped as expired.
    pub max_queue_age: Duration,
}

impl MachineConfig {
    /// Tunnel-mode defaults for the given gateway.
    pub fn tunnel(gateway: IpEndpoint) -> Self {
        Self {
            gateway,
            physical_address: IndividualAddress::UNSPECIFIED,
            mode: HostMode::Tunnel,
            auto_reconnect: true,
            minimum_send_interval: Duration::from_millis(0),
            max_queue_age: Duration::from_secs(30),
        }
    }

    /// Routing-mode defaults (multicast 224.0.23.12:3671).
    pub fn routing() -> Self {
        Self {
            gateway: IpEndpoint::new(crate::net::Ipv4Addr::KNX_MULTICAST, KNXNETIP_DEFAULT_PORT),
            physical_address: IndividualAddress::UNSPECIFIED,
            mode: HostMode::Routing,
            auto_reconnect: false,
            minimum_send_interval: Duration::from_millis(0),
            max_queue_age: Duration::from_secs(30),
        }
    }
}

/// Why a tunnel ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisconnectReason {
    /// The application asked for the disconnect.
    Requested,
    /// The gateway rejected CONNECT_REQUEST with this status.
    ConnectFailed(u8),
    /// No CONNECT_RESPONSE within the retry budget.
    ConnectTimeout,
    /// Tunneling ACK or heartbeat lost past the retry budget.
    TunnelStalled,
    /// The gateway sent DISCONNECT_REQUEST.
    GatewayRequest,
}

/// Public view of the connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Notification drained via [`TunnelMachine::poll_event`].
#[derive(Debug, Clone, PartialEq)]
pub enum TunnelEvent {
    /// A CONNECT_REQUEST went out (attempt is 1-based).
    Connecting {
        attempt: u8,
    },
    /// The tunnel is up.
    Connected {
        channel_id: u8,
        assigned_address: IndividualAddress,
    },
    /// The tunnel is down.
    Disconnected {
        reason: DisconnectReason,
    },
    /// An inbound cEMI frame was accepted and acknowledged.
    CemiReceived(CemiBuffer),
    /// A queued write was released without being sent.
    WriteDropped(WriteError),
    /// A well-formed but unexpected frame or status was observed.
    ProtocolError(KnxError),
}

/// A datagram to put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Transmit {
    /// Destination endpoint.
    pub target: IpEndpoint,
    /// Complete KNXnet/IP frame.
    pub data: Vec<u8, MAX_FRAME_SIZE>,
}

struct Pending {
    seq: u8,
    cemi: CemiBuffer,
    deadline: Instant,
    retransmits: u8,
}

struct Queued {
    cemi: CemiBuffer,
    queued_at: Instant,
}

struct Channel {
    channel_id: u8,
    assigned_address: IndividualAddress,
    /// Sequence number the next fresh TUNNELING_REQUEST will carry.
    send_seq: u8,
    /// Sequence number the next inbound TUNNELING_REQUEST must carry.
    recv_seq: u8,
    pending: Option<Pending>,
    heartbeat_due: Instant,
    heartbeat_deadline: Option<Instant>,
    heartbeat_failures: u8,
    earliest_send: Instant,
}

enum State {
    Disconnected,
    Connecting { deadline: Instant, attempt: u8 },
    Connected(Channel),
    Disconnecting { deadline: Instant, reason: DisconnectReason },
}

/// The connection state machine. See the module docs for the contract.
pub struct TunnelMachine {
    config: MachineConfig,
    state: State,
    queue: Deque<Queued, TX_QUEUE_DEPTH>,
    transmits: Deque<Transmit, TRANSMIT_DEPTH>,
    events: Deque<TunnelEvent, EVENT_DEPTH>,
    reconnect_at: Option<Instant>,
    backoff: Duration,
}

impl TunnelMachine {
    /// Create a machine in the Disconnected state.
    pub fn new(config: MachineConfig) -> Self {
        Self {
            config,
            state: State::Disconnected,
            queue: Deque::new(),
            transmits: Deque::new(),
            events: Deque::new(),
            reconnect_at: None,
            backoff: RECONNECT_BACKOFF_MIN,
        }
    }

    /// The machine configuration.
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        match self.state {
            State::Disconnected => ConnectionState::Disconnected,
            State::Connecting { .. } => ConnectionState::Connecting,
            State::Connected(_) => ConnectionState::Connected,
            State::Disconnecting { .. } => ConnectionState::Disconnecting,
        }
    }

    /// Channel id assigned by the gateway, when connected.
    pub fn channel_id(&self) -> Option<u8> {
        match &self.state {
            State::Connected(ch) => Some(ch.channel_id),
            _ => None,
        }
    }

    /// Individual address assigned by the gateway, when connected.
    pub fn assigned_address(&self) -> Option<IndividualAddress> {
        match &self.state {
            State::Connected(ch) => Some(ch.assigned_address),
            _ => None,
        }
    }

    /// Next datagram to send, if any.
    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        self.transmits.pop_front()
    }

    /// Next notification for the application layer, if any.
    pub fn poll_event(&mut self) -> Option<TunnelEvent> {
        self.events.pop_front()
    }

    /// Earliest instant at which [`TunnelMachine::handle_timeout`] must be
    /// called. `None` when nothing is armed.
    pub fn next_timeout(&self) -> Option<Instant> {
        let mut earliest: Option<Instant> = self.reconnect_at;

        let mut fold = |deadline: Instant| {
            earliest = Some(match earliest {
                Some(current) if current <= deadline => current,
                _ => deadline,
            });
        };

        match &self.state {
            State::Disconnected => {}
            State::Connecting { deadline, .. } => fold(*deadline),
            State::Disconnecting { deadline, .. } => fold(*deadline),
            State::Connected(ch) => {
                if let Some(pending) = &ch.pending {
                    fold(pending.deadline);
                }
                match ch.heartbeat_deadline {
                    Some(deadline) => fold(deadline),
                    None => fold(ch.heartbeat_due),
                }
                if ch.pending.is_none() && !self.queue.is_empty() {
                    fold(ch.earliest_send);
                }
            }
        }

        if let Some(oldest) = self.queue.front() {
            fold(oldest.queued_at + self.config.max_queue_age);
        }

        earliest
    }

    // =========================================================================
    // Application inputs
    // =========================================================================

    /// Open the tunnel (or join the multicast group in routing mode).
    ///
    /// # Errors
    ///
    /// `AlreadyConnected` unless the machine is Disconnected.
    pub fn connect(&mut self, now: Instant) -> Result<()> {
        if !matches!(self.state, State::Disconnected) {
            return Err(KnxError::already_connected());
        }
        self.reconnect_at = None;

        match self.config.mode {
            HostMode::Routing => {
                // No handshake on the multicast group.
                self.state = State::Connected(self.new_channel(
                    0,
                    self.config.physical_address,
                    now,
                ));
                self.push_event(TunnelEvent::Connected {
                    channel_id: 0,
                    assigned_address: self.config.physical_address,
                });
                Ok(())
            }
            HostMode::Tunnel => self.start_connect_attempt(1, now),
        }
    }

    /// Close the tunnel. Queued writes are released as cancelled.
    pub fn disconnect(&mut self, now: Instant) -> Result<()> {
        self.reconnect_at = None;
        self.drop_queue(WriteError::Cancelled);

        match core::mem::replace(&mut self.state, State::Disconnected) {
            State::Disconnected => Err(KnxError::not_connected()),
            State::Connecting { .. } => {
                self.push_event(TunnelEvent::Disconnected {
                    reason: DisconnectReason::Requested,
                });
                Ok(())
            }
            State::Connected(ch) => {
                if self.config.mode == HostMode::Routing {
                    self.push_event(TunnelEvent::Disconnected {
                        reason: DisconnectReason::Requested,
                    });
                    return Ok(());
                }
                self.send_disconnect_request(ch.channel_id);
                self.state = State::Disconnecting {
                    deadline: now + DISCONNECT_TIMEOUT,
                    reason: DisconnectReason::Requested,
                };
                Ok(())
            }
            state @ State::Disconnecting { .. } => {
                self.state = state;
                Ok(())
            }
        }
    }

    /// Submit a cEMI frame for transmission.
    ///
    /// In tunnel mode the frame takes its place in the FIFO queue behind
    /// the single-in-flight window; in routing mode it goes straight out
    /// as a ROUTING_INDICATION.
    ///
    /// # Errors
    ///
    /// `NotConnected` outside the Connected state, `QueueFull` when the
    /// FIFO is exhausted.
    pub fn submit(&mut self, cemi: &[u8], now: Instant) -> Result<()> {
        if !matches!(self.state, State::Connected(_)) {
            return Err(KnxError::not_connected());
        }

        if self.config.mode == HostMode::Routing {
            let target = self.config.gateway;
            return self.push_frame(target, |buf| RoutingIndication::new(cemi).build(buf));
        }

        let mut buffer = CemiBuffer::new();
        buffer
            .extend_from_slice(cemi)
            .map_err(|()| KnxError::buffer_too_small())?;
        self.queue
            .push_back(Queued {
                cemi: buffer,
                queued_at: now,
            })
            .map_err(|_| KnxError::write_queue_full())?;

        self.flush_queue(now);
        Ok(())
    }

    // =========================================================================
    // Wire input
    // =========================================================================

    /// Process one inbound datagram.
    ///
    /// Malformed datagrams are dropped with a warning and a recoverable
    /// error; the connection state never changes because of them.
    pub fn handle_datagram(&mut self, data: &[u8], now: Instant) -> Result<()> {
        let frame = match KnxnetIpFrame::parse(data) {
            Ok(frame) => frame,
            Err(err) => {
                crate::knx_log!(warn, "dropping malformed datagram ({} bytes)", data.len());
                return Err(err);
            }
        };

        let service = frame.service_type();
        let body = frame.body();

        match service {
            ServiceType::ConnectResponse => self.on_connect_response(body, now),
            ServiceType::TunnelingAck => self.on_tunneling_ack(body, now),
            ServiceType::TunnelingRequest => self.on_tunneling_request(body, now),
            ServiceType::ConnectionstateResponse => self.on_heartbeat_response(body, now),
            ServiceType::DisconnectRequest => self.on_disconnect_request(body, now),
            ServiceType::DisconnectResponse => self.on_disconnect_response(body, now),
            ServiceType::RoutingIndication => self.on_routing_indication(body),
            ServiceType::ConnectRequest | ServiceType::ConnectionstateRequest => {
                // server-side services; a client never accepts these
                self.push_event(TunnelEvent::ProtocolError(KnxError::unexpected_service(
                    service.to_u16(),
                )));
                Ok(())
            }
        }
    }

    // =========================================================================
    // Time input
    // =========================================================================

    /// Process every deadline that has passed as of `now`.
    pub fn handle_timeout(&mut self, now: Instant) {
        self.expire_queue(now);

        enum Due {
            Nothing,
            Reconnect,
            ConnectRetry(u8),
            ConnectedWork,
            DisconnectExpired(DisconnectReason),
        }

        let due = match &self.state {
            State::Disconnected => match self.reconnect_at {
                Some(at) if now >= at => Due::Reconnect,
                _ => Due::Nothing,
            },
            State::Connecting { deadline, attempt } if now >= *deadline => {
                Due::ConnectRetry(*attempt + 1)
            }
            State::Connecting { .. } => Due::Nothing,
            State::Connected(_) => Due::ConnectedWork,
            State::Disconnecting { deadline, reason } if now >= *deadline => {
                Due::DisconnectExpired(*reason)
            }
            State::Disconnecting { .. } => Due::Nothing,
        };

        match due {
            Due::Nothing => {}
            Due::Reconnect => {
                self.reconnect_at = None;
                let _ = self.start_connect_attempt(1, now);
            }
            Due::ConnectRetry(attempt) => {
                if attempt > MAX_CONNECT_ATTEMPTS {
                    self.state = State::Disconnected;
                    self.push_event(TunnelEvent::Disconnected {
                        reason: DisconnectReason::ConnectTimeout,
                    });
                    self.schedule_reconnect(now);
                } else {
                    let _ = self.start_connect_attempt(attempt, now);
                }
            }
            Due::ConnectedWork => {
                self.service_pending(now);
                self.service_heartbeat(now);
                self.flush_queue(now);
            }
            Due::DisconnectExpired(reason) => {
                self.finish_disconnect(reason, now);
            }
        }
    }

    // =========================================================================
    // Inbound service handlers
    // =========================================================================

    fn on_connect_response(&mut self, body: &[u8], now: Instant) -> Result<()> {
        if !matches!(self.state, State::Connecting { .. }) {
            self.push_event(TunnelEvent::ProtocolError(KnxError::unexpected_service(
                ServiceType::ConnectResponse.to_u16(),
            )));
            return Ok(());
        }

        let response = ConnectResponse::parse(body)?;

        if !response.is_ok() {
            crate::knx_log!(warn, "gateway refused tunnel, status {}", response.status);
            self.state = State::Disconnected;
            self.push_event(TunnelEvent::Disconnected {
                reason: DisconnectReason::ConnectFailed(response.status),
            });
            self.schedule_reconnect(now);
            return Ok(());
        }

        let assigned = if response.crd.assigned_address == IndividualAddress::UNSPECIFIED {
            self.config.physical_address
        } else {
            response.crd.assigned_address
        };

        crate::knx_log!(
            info,
            "tunnel established on channel {}",
            response.channel_id
        );
        self.backoff = RECONNECT_BACKOFF_MIN;
        self.state = State::Connected(self.new_channel(response.channel_id, assigned, now));
        self.push_event(TunnelEvent::Connected {
            channel_id: response.channel_id,
            assigned_address: assigned,
        });
        self.flush_queue(now);
        Ok(())
    }

    fn on_tunneling_ack(&mut self, body: &[u8], now: Instant) -> Result<()> {
        let ack = TunnelingAck::parse(body)?;

        let State::Connected(ch) = &mut self.state else {
            return Ok(());
        };
        if ack.connection_header.channel_id != ch.channel_id {
            return Ok(());
        }
        match &ch.pending {
            Some(pending) if pending.seq == ack.connection_header.sequence_counter => {}
            // no request in flight, or a stale acknowledgement
            _ => return Ok(()),
        }

        let acked = ch.pending.take().map(|p| p.seq).unwrap_or(ch.send_seq);
        ch.send_seq = acked.wrapping_add(1);

        if !ack.is_ok() {
            self.push_event(TunnelEvent::ProtocolError(KnxError::Protocol(
                crate::error::ProtocolError::BadStatus(ack.status),
            )));
        }
        self.flush_queue(now);
        Ok(())
    }

    fn on_tunneling_request(&mut self, body: &[u8], _now: Instant) -> Result<()> {
        let request = TunnelingRequest::parse(body)?;
        let seq = request.connection_header.sequence_counter;

        let State::Connected(ch) = &mut self.state else {
            return Ok(());
        };
        if self.config.mode == HostMode::Routing {
            return Ok(());
        }
        if request.connection_header.channel_id != ch.channel_id {
            return Ok(());
        }

        let channel_id = ch.channel_id;
        let expected = ch.recv_seq;

        if seq == expected {
            ch.recv_seq = ch.recv_seq.wrapping_add(1);

            let mut cemi = CemiBuffer::new();
            if cemi.extend_from_slice(request.cemi).is_err() {
                crate::knx_log!(warn, "inbound cEMI larger than {} bytes", MAX_CEMI_SIZE);
                return Err(KnxError::buffer_too_small());
            }

            self.send_tunneling_ack(channel_id, seq);
            self.push_event(TunnelEvent::CemiReceived(cemi));
        } else if seq == expected.wrapping_sub(1) {
            // retransmission of the last telegram: re-acknowledge,
            // do not dispatch again
            self.send_tunneling_ack(channel_id, seq);
        } else {
            crate::knx_log!(warn, "inbound sequence {} (expected {}), dropped", seq, expected);
        }

        Ok(())
    }

    fn on_heartbeat_response(&mut self, body: &[u8], now: Instant) -> Result<()> {
        let response = ConnectionStateResponse::parse(body)?;

        let State::Connected(ch) = &mut self.state else {
            return Ok(());
        };
        if response.channel_id != ch.channel_id {
            return Ok(());
        }

        if response.is_ok() {
            ch.heartbeat_deadline = None;
            ch.heartbeat_failures = 0;
            ch.heartbeat_due = now + HEARTBEAT_INTERVAL;
        } else {
            crate::knx_log!(warn, "heartbeat status {}", response.status);
            ch.heartbeat_deadline = None;
            ch.heartbeat_failures += 1;
            if ch.heartbeat_failures >= MAX_HEARTBEAT_FAILURES {
                self.stall(now);
            } else {
                // retry without waiting for the next interval
                ch.heartbeat_due = now;
            }
        }
        Ok(())
    }

    fn on_disconnect_request(&mut self, body: &[u8], now: Instant) -> Result<()> {
        let request = DisconnectRequest::parse(body)?;

        // When a local disconnect is already underway the stored reason
        // wins; a crossed gateway request must not trigger a reconnect.
        let (channel_id, reason) = match &self.state {
            State::Connected(ch) => (ch.channel_id, DisconnectReason::GatewayRequest),
            State::Disconnecting { reason, .. } => (request.channel_id, *reason),
            _ => return Ok(()),
        };
        if request.channel_id != channel_id {
            return Ok(());
        }

        self.push_frame_to_gateway(|buf| DisconnectResponse::new(channel_id, 0).build(buf));
        self.finish_disconnect(reason, now);
        Ok(())
    }

    fn on_disconnect_response(&mut self, body: &[u8], now: Instant) -> Result<()> {
        let _ = DisconnectResponse::parse(body)?;

        if let State::Disconnecting { reason, .. } = self.state {
            self.finish_disconnect(reason, now);
        }
        Ok(())
    }

    fn on_routing_indication(&mut self, body: &[u8]) -> Result<()> {
        if self.config.mode != HostMode::Routing {
            return Ok(());
        }
        if !matches!(self.state, State::Connected(_)) {
            return Ok(());
        }

        let indication = RoutingIndication::parse(body)?;
        let mut cemi = CemiBuffer::new();
        cemi.extend_from_slice(indication.cemi)
            .map_err(|()| KnxError::buffer_too_small())?;
        self.push_event(TunnelEvent::CemiReceived(cemi));
        Ok(())
    }

    // =========================================================================
    // Timer servicing
    // =========================================================================

    fn service_pending(&mut self, now: Instant) {
        let State::Connected(ch) = &mut self.state else {
            return;
        };
        let Some(pending) = &mut ch.pending else {
            return;
        };
        if now < pending.deadline {
            return;
        }

        if pending.retransmits < MAX_ACK_RETRANSMITS {
            pending.retransmits += 1;
            pending.deadline = now + ACK_TIMEOUT;
            let channel_id = ch.channel_id;
            let seq = pending.seq;
            let cemi = pending.cemi.clone();
            crate::knx_log!(warn, "ack timeout, retransmitting sequence {}", seq);
            self.send_tunneling_request(channel_id, seq, &cemi);
        } else {
            crate::knx_log!(warn, "ack lost after retransmit, dropping tunnel");
            self.stall(now);
        }
    }

    fn service_heartbeat(&mut self, now: Instant) {
        let State::Connected(ch) = &mut self.state else {
            return;
        };

        if let Some(deadline) = ch.heartbeat_deadline {
            if now >= deadline {
                ch.heartbeat_deadline = None;
                ch.heartbeat_failures += 1;
                if ch.heartbeat_failures >= MAX_HEARTBEAT_FAILURES {
                    crate::knx_log!(warn, "heartbeat lost {} times, dropping tunnel", MAX_HEARTBEAT_FAILURES);
                    self.stall(now);
                    return;
                }
                // next strike goes out immediately
                ch.heartbeat_due = now;
            }
        }

        let State::Connected(ch) = &mut self.state else {
            return;
        };
        if ch.heartbeat_deadline.is_none() && now >= ch.heartbeat_due {
            let channel_id = ch.channel_id;
            ch.heartbeat_deadline = Some(now + HEARTBEAT_TIMEOUT);
            self.push_frame_to_gateway(|buf| {
                ConnectionStateRequest::new(channel_id, Hpai::nat()).build(buf)
            });
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn new_channel(
        &self,
        channel_id: u8,
        assigned_address: IndividualAddress,
        now: Instant,
    ) -> Channel {
        Channel {
            channel_id,
            assigned_address,
            send_seq: 0,
            recv_seq: 0,
            pending: None,
            heartbeat_due: now + HEARTBEAT_INTERVAL,
            heartbeat_deadline: None,
            heartbeat_failures: 0,
            earliest_send: now,
        }
    }

    fn start_connect_attempt(&mut self, attempt: u8, now: Instant) -> Result<()> {
        self.state = State::Connecting {
            deadline: now + CONNECT_TIMEOUT,
            attempt,
        };
        self.push_event(TunnelEvent::Connecting { attempt });
        self.push_frame_to_gateway(|buf| ConnectRequest::new(Hpai::nat(), Hpai::nat()).build(buf));
        Ok(())
    }

    /// Move the next queued frame into the in-flight window if it is free.
    fn flush_queue(&mut self, now: Instant) {
        self.expire_queue(now);

        let State::Connected(ch) = &mut self.state else {
            return;
        };
        if ch.pending.is_some() || now < ch.earliest_send {
            return;
        }
        let Some(next) = self.queue.pop_front() else {
            return;
        };

        let channel_id = ch.channel_id;
        let seq = ch.send_seq;
        ch.pending = Some(Pending {
            seq,
            cemi: next.cemi.clone(),
            deadline: now + ACK_TIMEOUT,
            retransmits: 0,
        });
        ch.earliest_send = now + self.config.minimum_send_interval;

        self.send_tunneling_request(channel_id, seq, &next.cemi);
    }

    /// Drop queued writes older than the configured queue age.
    fn expire_queue(&mut self, now: Instant) {
        while let Some(oldest) = self.queue.front() {
            if now < oldest.queued_at + self.config.max_queue_age {
                break;
            }
            self.queue.pop_front();
            self.push_event(TunnelEvent::WriteDropped(WriteError::Expired));
        }
    }

    fn drop_queue(&mut self, reason: WriteError) {
        while self.queue.pop_front().is_some() {
            self.push_event(TunnelEvent::WriteDropped(reason));
        }
    }

    /// Ack or heartbeat lost past the retry budget: tear the tunnel down
    /// and let the reconnect policy decide what happens next.
    fn stall(&mut self, now: Instant) {
        if let State::Connected(ch) = &self.state {
            let channel_id = ch.channel_id;
            self.send_disconnect_request(channel_id);
        }
        self.state = State::Disconnecting {
            deadline: now + DISCONNECT_TIMEOUT,
            reason: DisconnectReason::TunnelStalled,
        };
    }

    fn finish_disconnect(&mut self, reason: DisconnectReason, now: Instant) {
        self.state = State::Disconnected;
        self.push_event(TunnelEvent::Disconnected { reason });

        match reason {
            DisconnectReason::Requested => {
                self.drop_queue(WriteError::Cancelled);
            }
            DisconnectReason::TunnelStalled
            | DisconnectReason::GatewayRequest
            | DisconnectReason::ConnectFailed(_)
            | DisconnectReason::ConnectTimeout => {
                self.schedule_reconnect(now);
            }
        }
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        if !self.config.auto_reconnect {
            return;
        }
        self.reconnect_at = Some(now + self.backoff);
        let doubled = self.backoff * 2;
        self.backoff = if doubled > RECONNECT_BACKOFF_MAX {
            RECONNECT_BACKOFF_MAX
        } else {
            doubled
        };
    }

    fn send_tunneling_request(&mut self, channel_id: u8, seq: u8, cemi: &CemiBuffer) {
        let header = ConnectionHeader::new(channel_id, seq);
        self.push_frame_to_gateway(|buf| TunnelingRequest::new(header, cemi).build(buf));
    }

    fn send_tunneling_ack(&mut self, channel_id: u8, seq: u8) {
        let header = ConnectionHeader::new(channel_id, seq);
        self.push_frame_to_gateway(|buf| TunnelingAck::new(header, 0).build(buf));
    }

    fn send_disconnect_request(&mut self, channel_id: u8) {
        self.push_frame_to_gateway(|buf| {
            DisconnectRequest::new(channel_id, Hpai::nat()).build(buf)
        });
    }

    fn push_frame_to_gateway(
        &mut self,
        build: impl FnOnce(&mut [u8]) -> Result<usize>,
    ) {
        let target = self.config.gateway;
        if let Err(err) = self.push_frame(target, build) {
            crate::knx_log!(error, "frame build failed: {}", err);
        }
    }

    fn push_frame(
        &mut self,
        target: IpEndpoint,
        build: impl FnOnce(&mut [u8]) -> Result<usize>,
    ) -> Result<()> {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = build(&mut buf)?;

        let mut data = Vec::new();
        data.extend_from_slice(&buf[..len])
            .map_err(|()| KnxError::buffer_too_small())?;

        if self.transmits.push_back(Transmit { target, data }).is_err() {
            crate::knx_log!(warn, "transmit queue full, dropping frame");
            return Err(KnxError::send_failed());
        }
        Ok(())
    }

    fn push_event(&mut self, event: TunnelEvent) {
        if self.events.push_back(event).is_err() {
            crate::knx_log!(warn, "event queue full, notification lost");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Ipv4Addr;

    fn gateway() -> IpEndpoint {
        IpEndpoint::new(Ipv4Addr::new(10, 0, 0, 1), KNXNETIP_DEFAULT_PORT)
    }

    fn machine() -> TunnelMachine {
        TunnelMachine::new(MachineConfig::tunnel(gateway()))
    }

    fn t(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn connect_response_frame(channel: u8, status: u8) -> [u8; 20] {
        [
            0x06, 0x10, 0x02, 0x06, 0x00, 0x14, // header
            channel, status, // channel, status
            0x08, 0x01, 10, 0, 0, 1, 0x0E, 0x57, // data HPAI
            0x04, 0x04, 0x11, 0xC8, // CRD, assigned 1.1.200
        ]
    }

    fn drain_transmits(m: &mut TunnelMachine) -> usize {
        let mut count = 0;
        while m.poll_transmit().is_some() {
            count += 1;
        }
        count
    }

    fn service_of(tx: &Transmit) -> u16 {
        u16::from_be_bytes([tx.data[2], tx.data[3]])
    }

    #[test]
    fn connect_emits_request_and_enters_connecting() {
        let mut m = machine();
        m.connect(t(0)).unwrap();
        assert_eq!(m.state(), ConnectionState::Connecting);

        let tx = m.poll_transmit().unwrap();
        assert_eq!(service_of(&tx), 0x0205);
        assert_eq!(tx.target, gateway());

        assert!(matches!(
            m.poll_event(),
            Some(TunnelEvent::Connecting { attempt: 1 })
        ));
        assert_eq!(m.next_timeout(), Some(t(0) + CONNECT_TIMEOUT));
    }

    #[test]
    fn connect_while_active_is_rejected() {
        let mut m = machine();
        m.connect(t(0)).unwrap();
        assert_eq!(m.connect(t(1)).unwrap_err(), KnxError::already_connected());
    }

    #[test]
    fn connect_response_establishes_channel() {
        let mut m = machine();
        m.connect(t(0)).unwrap();
        drain_transmits(&mut m);
        let _ = m.poll_event();

        m.handle_datagram(&connect_response_frame(7, 0), t(50)).unwrap();
        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(m.channel_id(), Some(7));
        assert_eq!(
            m.assigned_address(),
            Some(IndividualAddress::from(0x11C8))
        );

        match m.poll_event() {
            Some(TunnelEvent::Connected {
                channel_id,
                assigned_address,
            }) => {
                assert_eq!(channel_id, 7);
                assert_eq!(assigned_address.to_string(), "1.1.200");
            }
            other => panic!("unexpected event {:?}", other),
        }

        // heartbeat armed
        assert_eq!(m.next_timeout(), Some(t(50) + HEARTBEAT_INTERVAL));
    }

    #[test]
    fn connect_rejection_surfaces_status() {
        let mut m = machine();
        m.connect(t(0)).unwrap();
        drain_transmits(&mut m);
        let _ = m.poll_event();

        let frame = [0x06, 0x10, 0x02, 0x06, 0x00, 0x08, 0x00, 0x24];
        m.handle_datagram(&frame, t(10)).unwrap();

        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(matches!(
            m.poll_event(),
            Some(TunnelEvent::Disconnected {
                reason: DisconnectReason::ConnectFailed(0x24)
            })
        ));
    }

    #[test]
    fn connect_times_out_after_three_attempts() {
        let mut m = machine();
        m.connect(t(0)).unwrap();

        m.handle_timeout(t(0) + CONNECT_TIMEOUT);
        assert_eq!(m.state(), ConnectionState::Connecting);
        m.handle_timeout(t(0) + CONNECT_TIMEOUT * 2);
        assert_eq!(m.state(), ConnectionState::Connecting);
        m.handle_timeout(t(0) + CONNECT_TIMEOUT * 3);
        assert_eq!(m.state(), ConnectionState::Disconnected);

        // one CONNECT_REQUEST per attempt
        assert_eq!(drain_transmits(&mut m), 3);

        let mut saw_timeout = false;
        while let Some(event) = m.poll_event() {
            if matches!(
                event,
                TunnelEvent::Disconnected {
                    reason: DisconnectReason::ConnectTimeout
                }
            ) {
                saw_timeout = true;
            }
        }
        assert!(saw_timeout);
    }

    #[test]
    fn submit_requires_connection() {
        let mut m = machine();
        assert_eq!(
            m.submit(&[0x11, 0x00], t(0)).unwrap_err(),
            KnxError::not_connected()
        );
    }

    #[test]
    fn routing_mode_connects_without_handshake() {
        let mut m = TunnelMachine::new(MachineConfig::routing());
        m.connect(t(0)).unwrap();
        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(drain_transmits(&mut m), 0);

        let cemi = [0x29, 0x00, 0xBC, 0xE0, 0x00, 0x00, 0x0A, 0x03, 0x01, 0x00, 0x81];
        m.submit(&cemi, t(1)).unwrap();
        let tx = m.poll_transmit().unwrap();
        assert_eq!(service_of(&tx), 0x0530);
        assert_eq!(tx.target.addr, Ipv4Addr::KNX_MULTICAST);
    }
}
