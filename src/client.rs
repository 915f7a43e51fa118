//! High-level tunnel client with typed datapoint bindings.
//!
//! [`KnxClient`] wires the sans-io [`TunnelMachine`] to an injected
//! [`AsyncTransport`] and drives both from a single-owner event loop:
//! the application calls [`KnxClient::poll`] repeatedly (or from a
//! dedicated task) and receives bus activity through its [`EventHandler`].
//!
//! Datapoints pair a group address with a DPT. They are the single point
//! of DPT knowledge for inbound traffic: indications matching a bound
//! address are decoded with the configured type, cached, and change
//! notifications fire when the decoded value differs from the previous
//! one. Outbound writes are confirmed by the gateway's `L_Data.con`
//! before the cached value is committed.
//!
//! ```rust,ignore
//! let config = ClientConfig::builder()
//!     .gateway([192, 168, 1, 10], 3671)
//!     .physical_address("1.1.250".parse()?)
//!     .build();
//!
//! let mut client = KnxClient::new(config, transport, handler)?;
//! client.add_datapoint(Datapoint::new("1/2/3", "9.001", true)?)?;
//! client.connect().await?;
//!
//! loop {
//!     client.poll().await?;
//! }
//! ```

use embassy_time::{with_timeout, Duration, Instant};
use heapless::FnvIndexMap;

use crate::addressing::{GroupAddress, IndividualAddress};
use crate::dpt::{Dpt, KnxValue};
use crate::error::{KnxError, Result};
use crate::net::{AsyncTransport, IpEndpoint, Ipv4Addr};
use crate::protocol::cemi::{
    encode_group_read, encode_group_response, encode_group_write, Apci, CemiFrame, GroupPayload,
};
use crate::protocol::constants::{CemiMessageCode, KNXNETIP_DEFAULT_PORT, MAX_CEMI_SIZE};
use crate::protocol::machine::{
    ConnectionState, DisconnectReason, HostMode, MachineConfig, TunnelEvent, TunnelMachine,
};

/// Maximum number of datapoint bindings per connection.
pub const MAX_DATAPOINTS: usize = 32;

/// Maximum writes awaiting gateway confirmation.
const MAX_PENDING_CONFIRMS: usize = 8;

const RX_BUFFER_SIZE: usize = 512;

/// Connection configuration. Build one via [`ClientConfig::builder`].
#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    /// Gateway endpoint (tunnel mode) or multicast group (routing mode).
    pub gateway: IpEndpoint,
    /// Local individual address advertised in outbound telegrams.
    pub physical_address: IndividualAddress,
    /// Tunnel over unicast UDP or multicast routing.
    pub mode: HostMode,
    /// Reconnect automatically after an unexpected disconnect.
    pub auto_reconnect: bool,
    /// Minimum spacing between outbound telegrams.
    pub minimum_send_interval: Duration,
    /// Queued writes older than this are dropped as expired.
    pub max_queue_age: Duration,
}

impl ClientConfig {
    /// Start building a configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    fn machine_config(&self) -> MachineConfig {
        MachineConfig {
            gateway: self.gateway,
            physical_address: self.physical_address,
            mode: self.mode,
            auto_reconnect: self.auto_reconnect,
            minimum_send_interval: self.minimum_send_interval,
            max_queue_age: self.max_queue_age,
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    fn new() -> Self {
        Self {
            config: ClientConfig {
                gateway: IpEndpoint::new(Ipv4Addr::UNSPECIFIED, KNXNETIP_DEFAULT_PORT),
                physical_address: IndividualAddress::UNSPECIFIED,
                mode: HostMode::Tunnel,
                auto_reconnect: true,
                minimum_send_interval: Duration::from_millis(0),
                max_queue_age: Duration::from_secs(30),
            },
        }
    }

    /// Gateway IPv4 address and UDP port (required in tunnel mode).
    pub fn gateway(mut self, addr: impl Into<Ipv4Addr>, port: u16) -> Self {
        self.config.gateway = IpEndpoint::new(addr.into(), port);
        self
    }

    /// Local individual address advertised in outbound telegrams. The
    /// gateway usually overrides it with the tunnel's assigned address.
    pub fn physical_address(mut self, address: IndividualAddress) -> Self {
        self.config.physical_address = address;
        self
    }

    /// Switch to multicast routing on 224.0.23.12:3671.
    pub fn routing(mut self) -> Self {
        self.config.mode = HostMode::Routing;
        self.config.gateway =
            IpEndpoint::new(Ipv4Addr::KNX_MULTICAST, KNXNETIP_DEFAULT_PORT);
        self
    }

    /// Enable or disable automatic reconnect (default: enabled).
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    /// Rate-limit outbound telegrams.
    pub fn minimum_send_interval(mut self, interval: Duration) -> Self {
        self.config.minimum_send_interval = interval;
        self
    }

    /// Age limit for queued writes (default: 30 s).
    pub fn max_queue_age(mut self, age: Duration) -> Self {
        self.config.max_queue_age = age;
        self
    }

    /// Finish building.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// A group address bound to a datapoint type.
#[derive(Debug, Clone)]
pub struct Datapoint {
    address: GroupAddress,
    dpt: Dpt,
    autoread: bool,
    value: Option<KnxValue>,
}

impl Datapoint {
    /// Bind a group address to a DPT, both in textual form.
    ///
    /// # Errors
    ///
    /// Invalid group addresses and unknown DPT identifiers are
    /// configuration errors, raised here and never at runtime.
    ///
    /// # Examples
    ///
    /// ```
    /// use knx_tunnel::client::Datapoint;
    ///
    /// let dp = Datapoint::new("1/2/3", "9.001", true).unwrap();
    /// assert!(dp.value().is_none());
    /// ```
    pub fn new(address: &str, dpt: &str, autoread: bool) -> Result<Self> {
        Ok(Self {
            address: address.parse()?,
            dpt: dpt.parse()?,
            autoread,
            value: None,
        })
    }

    /// Bind already-parsed components.
    pub fn with_parts(address: GroupAddress, dpt: Dpt, autoread: bool) -> Self {
        Self {
            address,
            dpt,
            autoread,
            value: None,
        }
    }

    /// The bound group address.
    pub fn address(&self) -> GroupAddress {
        self.address
    }

    /// The bound datapoint type.
    pub fn dpt(&self) -> Dpt {
        self.dpt
    }

    /// Whether a GroupValue_Read goes out on connect.
    pub fn autoread(&self) -> bool {
        self.autoread
    }

    /// Last known value: the most recent decoded indication or confirmed
    /// write. `None` until either happens.
    pub fn value(&self) -> Option<&KnxValue> {
        self.value.as_ref()
    }
}

/// The application operation observed in a group telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GroupOperation {
    /// GroupValue_Read
    Read,
    /// GroupValue_Response
    Response,
    /// GroupValue_Write
    Write,
}

/// An inbound group telegram, decoded as far as the bindings allow.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupEvent {
    /// The operation.
    pub operation: GroupOperation,
    /// Source device.
    pub source: IndividualAddress,
    /// Destination group address.
    pub destination: GroupAddress,
    /// Raw APDU payload (6-bit values occupy one byte).
    pub raw: heapless::Vec<u8, 16>,
    /// Typed value, when the destination is bound to a DPT.
    pub value: Option<KnxValue>,
}

/// Callback surface of a connection.
///
/// All methods default to no-ops; implement the ones the application
/// cares about. Callbacks run on the polling task, after the machine has
/// finished the transition that produced them.
pub trait EventHandler {
    /// A connection attempt started (1-based attempt counter).
    fn connecting(&mut self, attempt: u8) {
        let _ = attempt;
    }

    /// The tunnel is up.
    fn connected(&mut self, channel_id: u8, assigned_address: IndividualAddress) {
        let _ = (channel_id, assigned_address);
    }

    /// The tunnel is down.
    fn disconnected(&mut self, reason: DisconnectReason) {
        let _ = reason;
    }

    /// A group telegram arrived (every inbound message, bound or not).
    fn group_event(&mut self, event: &GroupEvent) {
        let _ = event;
    }

    /// A bound datapoint's decoded value differs from its previous one.
    fn value_changed(&mut self, address: GroupAddress, value: &KnxValue) {
        let _ = (address, value);
    }

    /// An error was surfaced (rejected writes, protocol violations,
    /// dropped queue entries).
    fn error(&mut self, error: &KnxError) {
        let _ = error;
    }
}

/// No-op handler for applications that only poll values.
impl EventHandler for () {}

/// Tunnel client: machine + transport + bindings.
pub struct KnxClient<T: AsyncTransport, H: EventHandler> {
    machine: TunnelMachine,
    transport: T,
    handler: H,
    datapoints: FnvIndexMap<u16, Datapoint, MAX_DATAPOINTS>,
    pending_confirms: FnvIndexMap<u16, KnxValue, MAX_PENDING_CONFIRMS>,
    rx_buffer: [u8; RX_BUFFER_SIZE],
}

impl<T: AsyncTransport, H: EventHandler> KnxClient<T, H> {
    /// Create a client. Binds the transport to an ephemeral local port.
    pub fn new(config: ClientConfig, mut transport: T, handler: H) -> Result<Self> {
        transport.bind(0)?;
        Ok(Self {
            machine: TunnelMachine::new(config.machine_config()),
            transport,
            handler,
            datapoints: FnvIndexMap::new(),
            pending_confirms: FnvIndexMap::new(),
            rx_buffer: [0u8; RX_BUFFER_SIZE],
        })
    }

    /// Register a datapoint binding.
    ///
    /// # Errors
    ///
    /// Returns `QueueFull` when [`MAX_DATAPOINTS`] bindings exist.
    pub fn add_datapoint(&mut self, datapoint: Datapoint) -> Result<()> {
        self.datapoints
            .insert(datapoint.address.raw(), datapoint)
            .map_err(|_| KnxError::write_queue_full())?;
        Ok(())
    }

    /// Look up a binding's last known value.
    pub fn value_of(&self, address: GroupAddress) -> Option<&KnxValue> {
        self.datapoints
            .get(&address.raw())
            .and_then(|dp| dp.value.as_ref())
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// Borrow the handler (e.g. to read accumulated test state).
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Start the connection. Completion is reported through
    /// [`EventHandler::connected`] once the gateway answers.
    pub async fn connect(&mut self) -> Result<()> {
        self.machine.connect(Instant::now())?;
        self.flush().await?;
        self.dispatch_events();
        Ok(())
    }

    /// Close the connection. Queued writes are cancelled.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.pending_confirms.clear();
        self.machine.disconnect(Instant::now())?;
        self.flush().await?;
        self.dispatch_events();
        Ok(())
    }

    /// Write a typed value to a bound group address.
    ///
    /// The telegram is encoded with the binding's DPT and queued behind
    /// the single-in-flight window. The cached value is only committed
    /// when the gateway confirms the telegram; a negative confirmation
    /// surfaces as [`EventHandler::error`] with `WriteRejected` and
    /// leaves the value unchanged.
    ///
    /// # Errors
    ///
    /// `UnknownType` when the address has no binding; DPT range/length
    /// errors reject the write locally without emission.
    pub async fn write(&mut self, address: GroupAddress, value: KnxValue) -> Result<()> {
        let dpt = self
            .datapoints
            .get(&address.raw())
            .map(|dp| dp.dpt)
            .ok_or_else(KnxError::unknown_dpt)?;

        let mut payload_buf = [0u8; 16];
        let len = dpt.encode_value(&value, &mut payload_buf)?;
        let payload = if dpt.is_small() {
            GroupPayload::Small(payload_buf[0])
        } else {
            GroupPayload::Bytes(&payload_buf[..len])
        };

        let source = self.source_address();
        let mut cemi = [0u8; MAX_CEMI_SIZE];
        let cemi_len = encode_group_write(source, address, payload, &mut cemi)?;

        self.machine.submit(&cemi[..cemi_len], Instant::now())?;
        // remember the value until L_Data.con arrives
        let _ = self.pending_confirms.insert(address.raw(), value);

        self.flush().await?;
        self.dispatch_events();
        Ok(())
    }

    /// Issue a GroupValue_Read. The answer arrives as a group event and
    /// updates the binding like any other indication.
    pub async fn read(&mut self, address: GroupAddress) -> Result<()> {
        let source = self.source_address();
        let mut cemi = [0u8; MAX_CEMI_SIZE];
        let len = encode_group_read(source, address, &mut cemi)?;
        self.machine.submit(&cemi[..len], Instant::now())?;
        self.flush().await?;
        self.dispatch_events();
        Ok(())
    }

    /// Answer a GroupValue_Read observed on the bus.
    pub async fn respond(&mut self, address: GroupAddress, value: KnxValue) -> Result<()> {
        let dpt = self
            .datapoints
            .get(&address.raw())
            .map(|dp| dp.dpt)
            .ok_or_else(KnxError::unknown_dpt)?;

        let mut payload_buf = [0u8; 16];
        let len = dpt.encode_value(&value, &mut payload_buf)?;
        let payload = if dpt.is_small() {
            GroupPayload::Small(payload_buf[0])
        } else {
            GroupPayload::Bytes(&payload_buf[..len])
        };

        let source = self.source_address();
        let mut cemi = [0u8; MAX_CEMI_SIZE];
        let cemi_len = encode_group_response(source, address, payload, &mut cemi)?;
        self.machine.submit(&cemi[..cemi_len], Instant::now())?;
        self.flush().await?;
        self.dispatch_events();
        Ok(())
    }

    /// Run one step of the event loop: wait for the next datagram or the
    /// machine's earliest deadline, feed the machine, send what it
    /// produced and dispatch notifications.
    pub async fn poll(&mut self) -> Result<()> {
        self.flush().await?;

        let now = Instant::now();
        match self.machine.next_timeout() {
            Some(deadline) if deadline <= now => {
                self.machine.handle_timeout(now);
            }
            Some(deadline) => {
                let window = deadline - now;
                match with_timeout(window, self.transport.recv_from(&mut self.rx_buffer)).await
                {
                    Ok(Ok((len, _from))) => {
                        // codec errors drop the datagram, nothing else
                        let _ = self
                            .machine
                            .handle_datagram(&self.rx_buffer[..len], Instant::now());
                    }
                    Ok(Err(err)) => return Err(err),
                    Err(_) => self.machine.handle_timeout(Instant::now()),
                }
            }
            None => {
                let (len, _from) = self.transport.recv_from(&mut self.rx_buffer).await?;
                let _ = self
                    .machine
                    .handle_datagram(&self.rx_buffer[..len], Instant::now());
            }
        }

        self.dispatch_events();
        self.flush().await?;
        Ok(())
    }

    fn source_address(&self) -> IndividualAddress {
        self.machine
            .assigned_address()
            .unwrap_or(self.machine.config().physical_address)
    }

    async fn flush(&mut self) -> Result<()> {
        while let Some(transmit) = self.machine.poll_transmit() {
            self.transport.send_to(&transmit.data, transmit.target).await?;
        }
        Ok(())
    }

    fn dispatch_events(&mut self) {
        while let Some(event) = self.machine.poll_event() {
            match event {
                TunnelEvent::Connecting { attempt } => self.handler.connecting(attempt),
                TunnelEvent::Connected {
                    channel_id,
                    assigned_address,
                } => {
                    self.handler.connected(channel_id, assigned_address);
                    self.issue_autoreads();
                }
                TunnelEvent::Disconnected { reason } => {
                    self.pending_confirms.clear();
                    // bindings survive a reconnect, their cached values
                    // do not
                    for dp in self.datapoints.values_mut() {
                        dp.value = None;
                    }
                    if let Some(err) = disconnect_error(reason) {
                        self.handler.error(&err);
                    }
                    self.handler.disconnected(reason);
                }
                TunnelEvent::CemiReceived(cemi) => self.process_cemi(&cemi),
                TunnelEvent::WriteDropped(reason) => {
                    self.handler.error(&KnxError::Write(reason));
                }
                TunnelEvent::ProtocolError(err) => self.handler.error(&err),
            }
        }
    }

    /// Queue a GroupValue_Read for every autoread binding.
    fn issue_autoreads(&mut self) {
        let source = self.source_address();
        let now = Instant::now();

        let mut reads: heapless::Vec<GroupAddress, MAX_DATAPOINTS> = heapless::Vec::new();
        for dp in self.datapoints.values() {
            if dp.autoread {
                let _ = reads.push(dp.address);
            }
        }

        for address in reads {
            let mut cemi = [0u8; MAX_CEMI_SIZE];
            match encode_group_read(source, address, &mut cemi) {
                Ok(len) => {
                    if self.machine.submit(&cemi[..len], now).is_err() {
                        crate::knx_log!(warn, "autoread for {} dropped, queue full", address);
                    }
                }
                Err(err) => self.handler.error(&err),
            }
        }
    }

    fn process_cemi(&mut self, cemi: &[u8]) {
        let frame = match CemiFrame::parse(cemi) {
            Ok(frame) => frame,
            Err(err) => {
                crate::knx_log!(warn, "undecodable cEMI frame, dropped");
                self.handler.error(&err);
                return;
            }
        };

        let ldata = match frame.ldata() {
            Ok(ldata) => ldata,
            Err(err) => {
                self.handler.error(&err);
                return;
            }
        };

        let Some(destination) = ldata.destination_group() else {
            return;
        };

        match frame.message_code {
            CemiMessageCode::LDataInd => {
                self.process_indication(
                    ldata.apci,
                    ldata.source,
                    destination,
                    ldata.payload(),
                );
            }
            CemiMessageCode::LDataCon => {
                self.process_confirmation(destination, ldata.ctrl1.has_error());
            }
            CemiMessageCode::LDataReq => {
                // requests only travel towards the gateway
            }
        }
    }

    fn process_indication(
        &mut self,
        apci: Apci,
        source: IndividualAddress,
        destination: GroupAddress,
        payload: GroupPayload<'_>,
    ) {
        let operation = match apci {
            Apci::GroupValueRead => GroupOperation::Read,
            Apci::GroupValueResponse => GroupOperation::Response,
            Apci::GroupValueWrite => GroupOperation::Write,
            Apci::Unknown(_) => return,
        };

        let mut raw: heapless::Vec<u8, 16> = heapless::Vec::new();
        match payload {
            GroupPayload::Small(v) => {
                let _ = raw.push(v);
            }
            GroupPayload::Bytes(bytes) => {
                let _ = raw.extend_from_slice(bytes);
            }
        }

        let mut decoded = None;
        let mut changed = None;
        if operation != GroupOperation::Read {
            if let Some(dp) = self.datapoints.get_mut(&destination.raw()) {
                match dp.dpt.decode_value(&raw) {
                    Ok(value) => {
                        if dp.value.as_ref() != Some(&value) {
                            changed = Some(value.clone());
                        }
                        dp.value = Some(value.clone());
                        decoded = Some(value);
                    }
                    Err(err) => {
                        crate::knx_log!(
                            warn,
                            "indication for {} does not decode as {}-byte value",
                            destination,
                            dp.dpt.byte_length()
                        );
                        self.handler.error(&err);
                    }
                }
            }
        }

        let event = GroupEvent {
            operation,
            source,
            destination,
            raw,
            value: decoded,
        };
        self.handler.group_event(&event);

        if let Some(value) = changed {
            self.handler.value_changed(destination, &value);
        }
    }

    /// `L_Data.con`: commit or reject the matching pending write.
    fn process_confirmation(&mut self, destination: GroupAddress, error: bool) {
        let Some(value) = self.pending_confirms.remove(&destination.raw()) else {
            return;
        };

        if error {
            crate::knx_log!(warn, "gateway rejected write to {}", destination);
            self.handler.error(&KnxError::write_rejected());
            return;
        }

        if let Some(dp) = self.datapoints.get_mut(&destination.raw()) {
            let changed = dp.value.as_ref() != Some(&value);
            dp.value = Some(value.clone());
            if changed {
                self.handler.value_changed(destination, &value);
            }
        }
    }
}

/// The error a failed tunnel surfaces alongside its disconnect reason.
fn disconnect_error(reason: DisconnectReason) -> Option<KnxError> {
    match reason {
        DisconnectReason::Requested | DisconnectReason::GatewayRequest => None,
        DisconnectReason::ConnectFailed(status) => Some(KnxError::connect_failed(status)),
        DisconnectReason::ConnectTimeout => Some(KnxError::connect_timeout()),
        DisconnectReason::TunnelStalled => Some(KnxError::tunnel_stalled()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::MockTransport;

    #[derive(Default)]
    struct Recorder {
        connected: Option<(u8, IndividualAddress)>,
        disconnects: std::vec::Vec<DisconnectReason>,
        events: std::vec::Vec<GroupEvent>,
        changes: std::vec::Vec<(GroupAddress, KnxValue)>,
        errors: std::vec::Vec<KnxError>,
    }

    impl EventHandler for Recorder {
        fn connected(&mut self, channel_id: u8, assigned_address: IndividualAddress) {
            self.connected = Some((channel_id, assigned_address));
        }
        fn disconnected(&mut self, reason: DisconnectReason) {
            self.disconnects.push(reason);
        }
        fn group_event(&mut self, event: &GroupEvent) {
            self.events.push(event.clone());
        }
        fn value_changed(&mut self, address: GroupAddress, value: &KnxValue) {
            self.changes.push((address, value.clone()));
        }
        fn error(&mut self, error: &KnxError) {
            self.errors.push(*error);
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::builder().gateway([10, 0, 0, 1], 3671).build()
    }

    fn connect_response(channel: u8) -> [u8; 20] {
        [
            0x06, 0x10, 0x02, 0x06, 0x00, 0x14, channel, 0x00, 0x08, 0x01, 10, 0, 0, 1, 0x0E,
            0x57, 0x04, 0x04, 0x11, 0xC8,
        ]
    }

    #[tokio::test]
    async fn handshake_reports_connected() {
        let mut mock = MockTransport::new();
        mock.push_rx(&connect_response(7));

        let mut client = KnxClient::new(config(), mock, Recorder::default()).unwrap();
        client.connect().await.unwrap();
        client.poll().await.unwrap();

        let (channel, address) = client.handler().connected.unwrap();
        assert_eq!(channel, 7);
        assert_eq!(address.to_string(), "1.1.200");
        assert_eq!(client.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn write_requires_binding() {
        let mock = MockTransport::new();
        let mut client = KnxClient::new(config(), mock, Recorder::default()).unwrap();

        let err = client
            .write(GroupAddress::from(0x0A03), KnxValue::Bool(true))
            .await
            .unwrap_err();
        assert_eq!(err, KnxError::unknown_dpt());
    }

    #[tokio::test]
    async fn invalid_value_rejected_before_emission() {
        let mut mock = MockTransport::new();
        mock.push_rx(&connect_response(7));

        let mut client = KnxClient::new(config(), mock, Recorder::default()).unwrap();
        client
            .add_datapoint(Datapoint::new("1/2/3", "5.001", false).unwrap())
            .unwrap();
        client.connect().await.unwrap();
        client.poll().await.unwrap();

        let sent_before = client.transport_sent();
        let err = client
            .write(GroupAddress::from(0x0A03), KnxValue::F32(150.0))
            .await
            .unwrap_err();
        assert_eq!(err, KnxError::dpt_value_out_of_range());
        assert_eq!(client.transport_sent(), sent_before);
    }

    impl<H: EventHandler> KnxClient<MockTransport, H> {
        fn transport_sent(&self) -> usize {
            self.transport.sent().len()
        }
    }

    #[tokio::test]
    async fn datapoint_constructor_validates() {
        assert!(Datapoint::new("1/2/3", "9.001", false).is_ok());
        assert!(Datapoint::new("32/2/3", "9.001", false).is_err());
        assert!(Datapoint::new("1/2/3", "4.001", false).is_err());
    }
}
