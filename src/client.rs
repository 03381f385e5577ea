use crate::config::ClientOptions;
use crate::info::{
    siemens_timestamp, BlockInfo, Catalog, CommunicationInfo, PlcStatus, ProtectionInfo, UnitInfo,
};
use crate::protocol::error::{error_class_desc, error_code_desc, Error, Result};
use crate::protocol::frame::{
    default_tsap_pair, parse_address, Area, BlockType, CotpType, DataItem, Datum,
    DestinationFileSystem, Header, ListBlockInfo, ListBlockTypeInfo, Parameter, Pdu,
    ReadSzlAckDatum, RequestItem, StandardItem, VariableType,
};
use crate::protocol::planner;
use crate::protocol::frame::ReturnCode;
use crate::protocol::session::{ConnectionStatus, Dispatcher, Status, WaiterKey};
use crate::value::{string_prefix_len, wstring_prefix_len, RawValue, Value};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use bytes::{Bytes, BytesMut};
use chrono::NaiveDateTime;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

// Request budgets against the negotiated PDU length
const READ_TARGET_MARGIN: u16 = 14;
const READ_ITEM_EXTRA: usize = 5;
const READ_ITEM_THRESHOLD: usize = 12;
const WRITE_TARGET_MARGIN: u16 = 12;
const WRITE_ITEM_EXTRA: usize = 17;
const DOWNLOAD_CHUNK_MARGIN: usize = 32;

const MAX_PASSWORD_LEN: usize = 8;

/// Lifecycle callback invoked after a successful connect or reconnect.
pub type ConnectedHook = Arc<dyn Fn(Arc<Client>) + Send + Sync>;
/// Lifecycle callback invoked when the connection goes down.
pub type DisconnectedHook = Arc<dyn Fn(Arc<Client>, Arc<Error>) + Send + Sync>;

/// Lifecycle callbacks; both run on spawned tasks so they cannot stall the
/// dispatcher.
#[derive(Default, Clone)]
pub struct Hooks {
    pub on_connected: Option<ConnectedHook>,
    pub on_disconnected: Option<DisconnectedHook>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_connected", &self.on_connected.is_some())
            .field("on_disconnected", &self.on_disconnected.is_some())
            .finish()
    }
}

/// S7 client over one ISO-on-TCP connection.
///
/// Created disconnected; `connect` performs the TCP dial, the COTP
/// connection request and the SetupCom negotiation. All operations are safe
/// to call concurrently: requests are multiplexed over the connection by PDU
/// reference.
pub struct Client {
    opts: ClientOptions,
    status: Arc<ConnectionStatus>,
    session: arc_swap::ArcSwapOption<Dispatcher>,
    /// Negotiated PDU length; starts at the proposed value
    pdu_length: Arc<AtomicU16>,
    pdu_index: AtomicU32,
    hooks: Hooks,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.opts.endpoint())
            .field("plc", &self.opts.plc)
            .field("status", &self.status.status())
            .field("pdu_length", &self.pdu_length())
            .finish()
    }
}

impl Client {
    pub fn new(opts: ClientOptions) -> Arc<Client> {
        Self::with_hooks(opts, Hooks::default())
    }

    pub fn with_hooks(opts: ClientOptions, hooks: Hooks) -> Arc<Client> {
        let pdu_length = Arc::new(AtomicU16::new(opts.pdu_length));
        Arc::new(Client {
            opts,
            status: ConnectionStatus::new(),
            session: arc_swap::ArcSwapOption::from(None),
            pdu_length,
            pdu_index: AtomicU32::new(0),
            hooks,
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.opts
    }

    /// PDU length bound after negotiation.
    pub fn pdu_length(&self) -> u16 {
        self.pdu_length.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> Status {
        self.status.status()
    }

    pub fn is_connection_open(&self) -> bool {
        self.status.status() == Status::Connected
    }

    /// Whether the client is connected or will become connected on its own.
    pub fn is_connected(&self) -> bool {
        let (status, will_reconnect) = self.status.status_retry();
        match status {
            Status::Connected => true,
            Status::Connecting => self.opts.connect_retry,
            Status::Reconnecting => self.opts.auto_reconnect,
            Status::Disconnecting => self.opts.auto_reconnect && will_reconnect,
            Status::Disconnected => false,
        }
    }

    /// Next PDU reference; restarts from 1 after 65535.
    fn generate_pdu_reference(&self) -> u16 {
        let mut index = self.pdu_index.fetch_add(1, Ordering::SeqCst) + 1;
        if index >= 65536 {
            self.pdu_index.store(0, Ordering::SeqCst);
            index = self.pdu_index.fetch_add(1, Ordering::SeqCst) + 1;
        }
        index as u16
    }

    // ---- lifecycle ----

    /// Establish the connection: TCP dial (with optional retries), ISO
    /// connect, SetupCom negotiation.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        let completer = self.status.connecting()?;
        match self.establish(true).await {
            Ok(()) => {
                let _ = completer.complete(true);
                tracing::info!(endpoint = %self.opts.endpoint(), "S7 client is active");
                self.spawn_connected_hook();
                Ok(())
            }
            Err(e) => {
                let _ = completer.complete(false);
                self.session_teardown();
                if self.hooks.on_disconnected.is_some() {
                    self.spawn_disconnected_hook(Arc::new(Error::TcpConnect(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        e.to_string(),
                    ))));
                }
                Err(e)
            }
        }
    }

    /// Close the connection. In-flight requests fail with
    /// `ConnectionInactive`.
    pub async fn disconnect(&self) {
        let completer = match self.status.disconnecting().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("client disconnecting failed with error: {e}");
                return;
            }
        };
        if let Some(session) = self.session.load_full() {
            // best-effort ISO disconnect before dropping the socket
            let (local, remote) = default_tsap_pair(self.opts.plc, self.opts.rack, self.opts.slot);
            let request = Pdu::disconnect_request(local, remote);
            let _ = timeout(
                Duration::from_millis(500),
                session.request(WaiterKey::IsoDisconnect, request, Duration::from_millis(400)),
            )
            .await;
            session.cancel();
        }
        self.session.store(None);
        completer.complete();
        tracing::info!(endpoint = %self.opts.endpoint(), "S7 client disconnected");
    }

    fn session_teardown(&self) {
        if let Some(session) = self.session.load_full() {
            session.cancel();
        }
        self.session.store(None);
    }

    fn establish<'a>(
        self: &'a Arc<Self>,
        initial: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let (max_attempts, interval, cap) = if initial {
                let attempts = if self.opts.connect_retry {
                    self.opts.max_retries
                } else {
                    1
                };
                (attempts, self.opts.retry_interval, self.opts.max_retry_backoff)
            } else {
                (
                    self.opts.max_reconnect_times,
                    self.opts.reconnect_interval,
                    self.opts.max_reconnect_backoff,
                )
            };

            let stream = self.dial(max_attempts, interval, cap).await?;
            let (lost_tx, mut lost_rx) = mpsc::channel(1);
            let dispatcher = Dispatcher::spawn(
                stream,
                self.opts.endpoint(),
                Arc::clone(&self.pdu_length),
                lost_tx,
            );
            self.session.store(Some(Arc::new(dispatcher)));
            let client = Arc::clone(self);
            tokio::spawn(async move {
                if let Some(err) = lost_rx.recv().await {
                    client.handle_connection_lost(err).await;
                }
            });

            match self.handshake().await {
                Ok(()) => Ok(()),
                Err(e) => {
                    self.session_teardown();
                    Err(e)
                }
            }
        })
    }

    /// Dial with the configured timeout on every attempt, doubling the delay
    /// between attempts up to the backoff cap. `max_attempts == -1` retries
    /// forever.
    async fn dial(&self, max_attempts: i32, interval: Duration, cap: Duration) -> Result<TcpStream> {
        let endpoint = self.opts.endpoint();
        let mut backoff = ExponentialBackoff {
            initial_interval: interval,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: cap,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        let mut last_error;
        let mut attempt: i32 = 1;
        loop {
            match timeout(self.opts.timeout, TcpStream::connect(&endpoint)).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => last_error = Error::TcpConnect(e),
                Err(_) => {
                    last_error = Error::TcpConnect(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "connect timeout",
                    ))
                }
            }
            if max_attempts != -1 && attempt >= max_attempts {
                return if max_attempts <= 1 {
                    Err(last_error)
                } else {
                    Err(Error::TcpConnectWithAttempts {
                        endpoint,
                        attempts: max_attempts,
                    })
                };
            }
            let delay = backoff.next_backoff().unwrap_or(cap);
            tracing::debug!(
                endpoint = %endpoint,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "retrying connect"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// COTP connection request followed by SetupCom negotiation.
    async fn handshake(&self) -> Result<()> {
        let (local, remote) = default_tsap_pair(self.opts.plc, self.opts.rack, self.opts.slot);
        tracing::info!(endpoint = %self.opts.endpoint(), "S7 client start iso connect");
        self.send(Pdu::connect_request(local, remote)).await?;

        let setup = Pdu::setup_request(self.opts.pdu_length, self.generate_pdu_reference());
        let ack = self.send(setup).await?;
        if ack.cotp.as_ref().map(|c| c.pdu_type()) != Some(CotpType::Data) {
            return Err(Error::ResponseInvalid);
        }
        if !matches!(ack.header, Some(Header::Ack(_))) {
            return Err(Error::ResponseInvalid);
        }
        let Some(Parameter::SetupCom(setup_ack)) = ack.parameter else {
            return Err(Error::ResponseInvalid);
        };
        if setup_ack.pdu_length == 0 {
            return Err(Error::ResponseInvalid);
        }
        self.pdu_length
            .store(setup_ack.pdu_length, Ordering::Relaxed);
        tracing::debug!(pdu_length = setup_ack.pdu_length, "negotiated pdu length");
        Ok(())
    }

    async fn handle_connection_lost(self: &Arc<Self>, err: Error) {
        tracing::warn!(
            endpoint = %self.opts.endpoint(),
            error = %err,
            "S7 client is disconnected with error"
        );
        self.session.store(None);
        let will_reconnect = self.opts.auto_reconnect
            && matches!(self.status.status(), Status::Reconnecting | Status::Connected);
        self.spawn_disconnected_hook(Arc::new(err));

        let handler = match self.status.connection_lost(will_reconnect).await {
            Ok(h) => h,
            Err(_) => return,
        };
        if let Ok(Some(completer)) = handler.proceed(true) {
            let client = Arc::clone(self);
            tokio::spawn(async move {
                tracing::debug!("client start reconnect");
                match client.establish(false).await {
                    Ok(()) => {
                        let _ = completer.complete(true);
                        tracing::info!(endpoint = %client.opts.endpoint(), "S7 client is active");
                        client.spawn_connected_hook();
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "reconnect failed");
                        let _ = completer.complete(false);
                        client.session_teardown();
                    }
                }
            });
        }
    }

    fn spawn_connected_hook(self: &Arc<Self>) {
        if let Some(hook) = self.hooks.on_connected.clone() {
            let client = Arc::clone(self);
            tokio::spawn(async move { hook(client) });
        }
    }

    fn spawn_disconnected_hook(self: &Arc<Self>, err: Arc<Error>) {
        if let Some(hook) = self.hooks.on_disconnected.clone() {
            let client = Arc::clone(self);
            tokio::spawn(async move { hook(client, err) });
        }
    }

    // ---- transport ----

    /// Send one PDU and await its acknowledgement. Only connect requests and
    /// SetupCom jobs may pass while the session is still being established.
    async fn send(&self, pdu: Pdu) -> Result<Pdu> {
        let endpoint = self.opts.endpoint();
        let Some(session) = self.session.load_full() else {
            return Err(Error::ConnectionNil(endpoint));
        };

        let cotp_type = pdu.cotp.as_ref().map(|c| c.pdu_type());
        let is_handshake = cotp_type == Some(CotpType::ConnectRequest)
            || matches!(pdu.parameter, Some(Parameter::SetupCom(_)));
        let status = self.status.status();
        let allowed = match status {
            Status::Connected => true,
            Status::Connecting | Status::Reconnecting => is_handshake,
            Status::Disconnecting => cotp_type == Some(CotpType::DisconnectRequest),
            Status::Disconnected => false,
        };
        if !allowed {
            return Err(Error::ConnectionInactive(endpoint));
        }

        let key = match cotp_type {
            Some(CotpType::ConnectRequest) => WaiterKey::IsoConnect,
            Some(CotpType::DisconnectRequest) => WaiterKey::IsoDisconnect,
            _ => WaiterKey::Reference(pdu.pdu_reference().ok_or(Error::RequestItemInvalid)?),
        };
        let ack = session.request(key, pdu.clone(), self.opts.timeout).await?;
        check_req_ack(&pdu, &ack)?;
        Ok(ack)
    }

    // ---- tag reads ----

    /// Read a single tag and return its raw bytes.
    pub async fn read_raw(&self, address: &str) -> Result<RawValue> {
        let mut values = self.read_batch_raw(&[address]).await?;
        values.pop().ok_or(Error::ResponseEmpty)
    }

    /// Read a single tag and decode it into a typed value.
    pub async fn read_parsed(&self, address: &str) -> Result<Value> {
        self.read_raw(address).await?.parse()
    }

    /// Read a batch of tags; results are returned in submission order.
    pub async fn read_batch_raw(&self, addresses: &[&str]) -> Result<Vec<RawValue>> {
        if addresses.is_empty() {
            return Err(Error::AddressEmpty);
        }
        let mut items = Vec::with_capacity(addresses.len());
        let mut original_types = Vec::with_capacity(addresses.len());
        for address in addresses {
            let item = parse_address(address)?;
            original_types.push(item.variable_type);
            items.push(self.prepare_read_item(item).await?);
        }
        let buffers = self.read_items(items).await?;
        Ok(buffers
            .into_iter()
            .zip(original_types)
            .map(|(data, variable_type)| RawValue {
                data,
                variable_type,
                plc: self.opts.plc,
            })
            .collect())
    }

    /// Read a batch of tags and decode every result.
    pub async fn read_batch_parsed(&self, addresses: &[&str]) -> Result<Vec<Value>> {
        self.read_batch_raw(addresses)
            .await?
            .iter()
            .map(RawValue::parse)
            .collect()
    }

    /// Normalize a parsed address for the wire: strings read their length
    /// prefix first to size the full read, and the date/time family reads as
    /// plain bytes.
    async fn prepare_read_item(&self, mut item: StandardItem) -> Result<StandardItem> {
        match item.variable_type {
            VariableType::String => {
                let prefix = string_prefix_len(self.opts.plc);
                item.variable_type = VariableType::Byte;
                item.count = prefix as u16;
                let mut buffers = self.read_items(vec![item]).await?;
                let data = buffers.pop().ok_or(Error::ResponseInvalid)?;
                if data.len() < prefix {
                    return Err(Error::ResponseInvalid);
                }
                item.count = prefix as u16 + data[prefix - 1] as u16;
            }
            VariableType::WString => {
                let prefix = wstring_prefix_len(self.opts.plc);
                item.variable_type = VariableType::Byte;
                item.count = prefix as u16;
                let mut buffers = self.read_items(vec![item]).await?;
                let data = buffers.pop().ok_or(Error::ResponseInvalid)?;
                if data.len() < prefix {
                    return Err(Error::ResponseInvalid);
                }
                let units = u16::from_be_bytes([data[prefix - 2], data[prefix - 1]]);
                item.count = prefix as u16 + units * 2;
            }
            VariableType::Time
            | VariableType::Date
            | VariableType::TimeOfDay
            | VariableType::DateTime
            | VariableType::S5Time
            | VariableType::DateTimeLong => {
                item.count *= item.variable_type.size();
                item.variable_type = VariableType::Byte;
            }
            _ => {}
        }
        Ok(item)
    }

    /// Issue the planned read groups sequentially, reassembling each item's
    /// bytes at its split offsets.
    async fn read_items(&self, requests: Vec<StandardItem>) -> Result<Vec<Bytes>> {
        if requests.is_empty() {
            return Err(Error::RequestDataEmpty);
        }
        let raw_counts: Vec<u16> = requests.iter().map(|r| r.count).collect();
        let mut buffers: Vec<Vec<u8>> = requests
            .iter()
            .map(|r| vec![0u8; r.variable_type.size().max(1) as usize * r.count as usize])
            .collect();

        let target = self
            .pdu_length()
            .saturating_sub(READ_TARGET_MARGIN)
            .max(2 * READ_ITEM_THRESHOLD as u16) as usize;
        let groups = planner::plan_read(&raw_counts, target, READ_ITEM_EXTRA, READ_ITEM_THRESHOLD);
        for group in groups {
            let mut items = Vec::with_capacity(group.items.len());
            for com in &group.items {
                let mut item = requests[com.index];
                item.count = com.ripe_size as u16;
                item.byte_address += com.split_offset as u32;
                items.push(RequestItem::Standard(item));
            }
            let request = Pdu::read_request(items, self.generate_pdu_reference());
            let ack = self.send(request).await?;
            let Some(Datum::ReadWrite(datum)) = ack.datum else {
                return Err(Error::ResponseInvalid);
            };
            for (com, response) in group.items.iter().zip(datum.items.iter()) {
                let data = response.data();
                let buffer = &mut buffers[com.index];
                let end = (com.split_offset + data.len()).min(buffer.len());
                if end > com.split_offset {
                    buffer[com.split_offset..end]
                        .copy_from_slice(&data[..end - com.split_offset]);
                }
            }
        }
        Ok(buffers.into_iter().map(Bytes::from).collect())
    }

    // ---- tag writes ----

    /// Write raw bytes to a single tag. The bytes must match the tag's wire
    /// encoding (see [`Value::to_bytes`]).
    pub async fn write_raw(&self, address: &str, data: Bytes) -> Result<()> {
        self.write_raw_batch(&[address], vec![data]).await
    }

    /// Write a batch of tags.
    pub async fn write_raw_batch(&self, addresses: &[&str], data: Vec<Bytes>) -> Result<()> {
        if addresses.is_empty() {
            return Err(Error::AddressEmpty);
        }
        if addresses.len() != data.len() {
            return Err(Error::RequestDataDifferent);
        }
        let mut items = Vec::with_capacity(addresses.len());
        let mut data_items = Vec::with_capacity(addresses.len());
        for (address, bytes) in addresses.iter().zip(data) {
            let mut item = parse_address(address)?;
            match item.variable_type {
                VariableType::String | VariableType::WString => {
                    item.count *= bytes.len() as u16;
                    item.variable_type = VariableType::Byte;
                }
                VariableType::Bit => {}
                other => {
                    item.count *= other.size();
                    item.variable_type = VariableType::Byte;
                }
            }
            data_items.push(DataItem::request(
                bytes,
                item.variable_type.data_variable_type(),
            ));
            items.push(item);
        }
        self.write_items(items, data_items).await
    }

    /// Issue the planned write groups sequentially, slicing each item's data
    /// parallel to its request fragment.
    async fn write_items(&self, requests: Vec<StandardItem>, data_items: Vec<DataItem>) -> Result<()> {
        if requests.is_empty() || data_items.is_empty() {
            return Err(Error::RequestDataEmpty);
        }
        if requests.len() != data_items.len() {
            return Err(Error::RequestDataDifferent);
        }
        let raw_counts: Vec<u16> = requests.iter().map(|r| r.count).collect();
        let target = self
            .pdu_length()
            .saturating_sub(WRITE_TARGET_MARGIN)
            .max(2 * WRITE_ITEM_EXTRA as u16) as usize;
        let groups = planner::plan_write(&raw_counts, target, WRITE_ITEM_EXTRA);
        for group in groups {
            let mut items = Vec::with_capacity(group.items.len());
            let mut payloads = Vec::with_capacity(group.items.len());
            for com in &group.items {
                let mut item = requests[com.index];
                item.count = com.ripe_size as u16;
                item.byte_address += com.split_offset as u32;
                items.push(RequestItem::Standard(item));

                let source = &data_items[com.index];
                let start = com.split_offset.min(source.data.len());
                let end = (com.split_offset + com.ripe_size).min(source.data.len());
                payloads.push(crate::protocol::frame::ResponseItem::Data(DataItem::request(
                    source.data.slice(start..end),
                    source.variable_type,
                )));
            }
            let request = Pdu::write_request(items, payloads, self.generate_pdu_reference());
            self.send(request).await?;
        }
        Ok(())
    }

    // ---- data block helpers ----

    /// Read `size` bytes from a data block.
    pub async fn db_read(&self, db_number: u16, byte_address: u32, size: u16) -> Result<Bytes> {
        self.base_read(Area::DataBlocks, db_number, byte_address, 0, size)
            .await
    }

    /// Write bytes into a data block.
    pub async fn db_write(&self, db_number: u16, byte_address: u32, data: Bytes) -> Result<()> {
        self.base_write(Area::DataBlocks, db_number, byte_address, 0, data)
            .await
    }

    /// Fetch the complete MC7 image of a data block; the length comes from
    /// the block info query.
    pub async fn db_get(&self, db_number: u16) -> Result<Bytes> {
        let info = self.block_info(BlockType::Db, db_number as u32).await?;
        self.db_read(db_number, 0, info.mc7_code_length).await
    }

    /// Overwrite a whole data block with `fill_byte`.
    pub async fn db_fill(&self, db_number: u16, fill_byte: u8) -> Result<()> {
        let info = self.block_info(BlockType::Db, db_number as u32).await?;
        let data = Bytes::from(vec![fill_byte; info.mc7_code_length as usize]);
        self.db_write(db_number, 0, data).await
    }

    async fn base_read(
        &self,
        area: Area,
        db_number: u16,
        byte_address: u32,
        bit_address: u8,
        size: u16,
    ) -> Result<Bytes> {
        let item = StandardItem::new(
            area,
            db_number,
            VariableType::Byte,
            byte_address,
            bit_address,
            size,
        );
        let mut buffers = self.read_items(vec![item]).await?;
        buffers.pop().ok_or(Error::ResponseEmpty)
    }

    async fn base_write(
        &self,
        area: Area,
        db_number: u16,
        byte_address: u32,
        bit_address: u8,
        data: Bytes,
    ) -> Result<()> {
        let item = StandardItem::new(
            area,
            db_number,
            VariableType::Byte,
            byte_address,
            bit_address,
            data.len() as u16,
        );
        let data_item = DataItem::request(data, VariableType::Byte.data_variable_type());
        self.write_items(vec![item], vec![data_item]).await
    }

    // ---- run state control ----

    pub async fn hot_restart(&self) -> Result<()> {
        self.send(Pdu::hot_restart(self.generate_pdu_reference()))
            .await
            .map(drop)
    }

    pub async fn cold_restart(&self) -> Result<()> {
        self.send(Pdu::cold_restart(self.generate_pdu_reference()))
            .await
            .map(drop)
    }

    pub async fn stop_plc(&self) -> Result<()> {
        self.send(Pdu::stop_plc(self.generate_pdu_reference()))
            .await
            .map(drop)
    }

    pub async fn copy_ram_to_rom(&self) -> Result<()> {
        self.send(Pdu::copy_ram_to_rom(self.generate_pdu_reference()))
            .await
            .map(drop)
    }

    pub async fn compress(&self) -> Result<()> {
        self.send(Pdu::compress(self.generate_pdu_reference()))
            .await
            .map(drop)
    }

    // ---- block transfer ----

    /// Link a previously downloaded block into the PLC file system.
    pub async fn insert_file(&self, block_type: BlockType, block_number: u32) -> Result<()> {
        self.send(Pdu::insert(
            block_type,
            DestinationFileSystem::P,
            block_number,
            self.generate_pdu_reference(),
        ))
        .await
        .map(drop)
    }

    /// Upload a block image: start, loop while more data follows, end.
    pub async fn upload_file(&self, block_type: BlockType, block_number: u32) -> Result<Bytes> {
        let ack = self
            .send(Pdu::start_upload(
                block_type,
                DestinationFileSystem::A,
                block_number,
                self.generate_pdu_reference(),
            ))
            .await?;
        let Some(Parameter::StartUploadAck(start)) = ack.parameter else {
            return Err(Error::ResponseInvalid);
        };

        let mut image = BytesMut::with_capacity(start.block_length as usize);
        let mut more_data_following = true;
        while more_data_following {
            let ack = self
                .send(Pdu::upload(start.id, self.generate_pdu_reference()))
                .await?;
            let Some(Parameter::UploadAck(upload_ack)) = ack.parameter else {
                return Err(Error::ResponseInvalid);
            };
            if upload_ack.error_status {
                return Err(Error::UploadFailed);
            }
            let Some(Datum::UpDownload(datum)) = ack.datum else {
                return Err(Error::ResponseInvalid);
            };
            image.extend_from_slice(&datum.data);
            more_data_following = upload_ack.more_data_following;
        }

        self.send(Pdu::end_upload(start.id, self.generate_pdu_reference()))
            .await?;
        Ok(image.freeze())
    }

    /// Download a block image, chunked below the negotiated PDU length.
    pub async fn download_file(
        &self,
        data: Bytes,
        block_type: BlockType,
        block_number: u32,
        mc7_code_length: u32,
    ) -> Result<()> {
        let total = data.len();
        self.send(Pdu::start_download(
            block_type,
            DestinationFileSystem::P,
            block_number,
            total as u32,
            mc7_code_length,
            self.generate_pdu_reference(),
        ))
        .await?;

        let chunk = self.pdu_length() as usize - DOWNLOAD_CHUNK_MARGIN;
        let mut sent = 0usize;
        while sent < total {
            let length = (total - sent).min(chunk);
            let more_data_following = total - sent > chunk;
            self.send(Pdu::download(
                block_type,
                DestinationFileSystem::P,
                block_number,
                more_data_following,
                data.slice(sent..sent + length),
                self.generate_pdu_reference(),
            ))
            .await?;
            sent += length;
        }

        self.send(Pdu::end_download(
            block_type,
            DestinationFileSystem::P,
            block_number,
            self.generate_pdu_reference(),
        ))
        .await
        .map(drop)
    }

    // ---- diagnostics ----

    /// Read one SZL record and return the raw acknowledgement.
    pub async fn read_szl(&self, szl_id: u16, szl_index: u16) -> Result<ReadSzlAckDatum> {
        let ack = self
            .send(Pdu::read_szl(szl_id, szl_index, self.generate_pdu_reference()))
            .await?;
        match ack.datum {
            Some(Datum::ReadSzlAck(datum)) => Ok(datum),
            _ => Err(Error::ResponseInvalid),
        }
    }

    /// List the SZL ids the module offers (SZL 0x0000).
    pub async fn szl_ids(&self) -> Result<Vec<u16>> {
        let datum = self.read_szl(0x0000, 0x0000).await?;
        if datum.part_length != 2 {
            return Err(Error::ResponseInvalid);
        }
        Ok(datum
            .parts
            .iter()
            .map(|p| u16::from_be_bytes([p[0], p[1]]))
            .collect())
    }

    /// Order code and version from SZL 0x0011.
    pub async fn catalog(&self) -> Result<Catalog> {
        let datum = self.read_szl(0x0011, 0x0000).await?;
        if datum.part_count < 3 || datum.part_length != 28 {
            return Err(Error::ResponseInvalid);
        }
        let end = datum.part_length as usize - 6;
        Ok(Catalog {
            order_code: trimmed(&datum.parts[0][2..end]),
            version: format!(
                "V{}.{}.{}",
                datum.parts[2][25], datum.parts[2][26], datum.parts[2][27]
            ),
        })
    }

    /// Run state from SZL 0x0024.
    pub async fn plc_status(&self) -> Result<PlcStatus> {
        let datum = self.read_szl(0x0024, 0x0000).await?;
        let part = datum.parts.first().ok_or(Error::ResponseInvalid)?;
        if part.len() < 4 {
            return Err(Error::ResponseInvalid);
        }
        Ok(PlcStatus::from(part[3]))
    }

    /// Module identification from SZL 0x001C.
    pub async fn unit_info(&self) -> Result<UnitInfo> {
        let datum = self.read_szl(0x001C, 0x0000).await?;
        if datum.part_count < 6 || datum.part_length != 34 {
            return Err(Error::ResponseInvalid);
        }
        Ok(UnitInfo {
            as_name: trimmed(&datum.parts[0][2..26]),
            module_name: trimmed(&datum.parts[1][2..26]),
            copyright: trimmed(&datum.parts[3][2..28]),
            serial_number: trimmed(&datum.parts[4][2..26]),
            module_type_name: trimmed(&datum.parts[5][2..26]),
        })
    }

    /// Communication capabilities from SZL 0x0131.
    pub async fn communication_info(&self) -> Result<CommunicationInfo> {
        let datum = self.read_szl(0x0131, 0x0000).await?;
        if datum.part_length != 34 {
            return Err(Error::ResponseInvalid);
        }
        let part = datum.parts.first().ok_or(Error::ResponseInvalid)?;
        Ok(CommunicationInfo {
            max_pdu_length: u16::from_be_bytes([part[2], part[3]]),
            max_connections: u16::from_be_bytes([part[4], part[5]]),
            max_mpi_rate: u16::from_be_bytes([part[6], part[7]]),
            max_bus_rate: u16::from_be_bytes([part[10], part[11]]),
        })
    }

    /// Protection configuration from SZL 0x0232 index 4.
    pub async fn protection_info(&self) -> Result<ProtectionInfo> {
        let datum = self.read_szl(0x0232, 0x0004).await?;
        let part = datum.parts.first().ok_or(Error::ResponseInvalid)?;
        if part.len() < 12 {
            return Err(Error::ResponseInvalid);
        }
        Ok(ProtectionInfo {
            level: u16::from_be_bytes([part[2], part[3]]),
            parameter_level: u16::from_be_bytes([part[4], part[5]]).into(),
            cpu_level: u16::from_be_bytes([part[6], part[7]]).into(),
            selector_setting: u16::from_be_bytes([part[8], part[9]]).into(),
            startup_switch: u16::from_be_bytes([part[10], part[11]]).into(),
        })
    }

    /// Per-type block counts.
    pub async fn block_list(&self) -> Result<Vec<ListBlockInfo>> {
        let ack = self
            .send(Pdu::block_list(self.generate_pdu_reference()))
            .await?;
        match ack.datum {
            Some(Datum::BlockListAck(datum)) => Ok(datum.blocks),
            _ => Err(Error::ResponseInvalid),
        }
    }

    /// Block numbers of one type.
    pub async fn block_list_type(&self, block_type: BlockType) -> Result<Vec<ListBlockTypeInfo>> {
        let ack = self
            .send(Pdu::block_list_type(block_type, self.generate_pdu_reference()))
            .await?;
        match ack.datum {
            Some(Datum::BlockListTypeAck(datum)) => Ok(datum.types),
            _ => Err(Error::ResponseInvalid),
        }
    }

    /// Header information of a managed block.
    pub async fn block_info(&self, block_type: BlockType, block_number: u32) -> Result<BlockInfo> {
        let ack = self
            .send(Pdu::block_info(
                block_type,
                DestinationFileSystem::A,
                block_number,
                self.generate_pdu_reference(),
            ))
            .await?;
        let Some(Datum::BlockInfoAck(datum)) = ack.datum else {
            return Err(Error::ResponseInvalid);
        };
        let code_date = ((u32::from_be_bytes([
            datum.code_timestamp[0],
            datum.code_timestamp[1],
            datum.code_timestamp[2],
            datum.code_timestamp[3],
        ]) as i64)
            << 16)
            + u16::from_be_bytes([datum.code_timestamp[4], datum.code_timestamp[5]]) as i64;
        let interface_date = ((u32::from_be_bytes([
            datum.interface_timestamp[0],
            datum.interface_timestamp[1],
            datum.interface_timestamp[2],
            datum.interface_timestamp[3],
        ]) as i64)
            << 16)
            + u16::from_be_bytes([datum.interface_timestamp[4], datum.interface_timestamp[5]])
                as i64;
        Ok(BlockInfo {
            block_type: datum.block_type,
            block_number: datum.block_number,
            language: datum.language,
            flags: datum.flags,
            mc7_code_length: datum.mc7_code_length,
            length_load_memory: datum.length_load_memory,
            local_data_length: datum.local_data_length,
            ssb_length: datum.ssb_length,
            checksum: datum.checksum,
            version: datum.version,
            code_date: siemens_timestamp(code_date),
            interface_date: siemens_timestamp(interface_date),
            author: trimmed(&datum.author),
            family: trimmed(&datum.family),
            header: trimmed(&datum.header),
        })
    }

    // ---- clock and security ----

    /// Read the CPU clock.
    pub async fn clock_read(&self) -> Result<NaiveDateTime> {
        let ack = self
            .send(Pdu::clock_read(self.generate_pdu_reference()))
            .await?;
        let Some(Datum::Clock(datum)) = ack.datum else {
            return Err(Error::ResponseInvalid);
        };
        datum.to_datetime().ok_or(Error::ResponseInvalid)
    }

    /// Set the CPU clock.
    pub async fn clock_set(&self, time: NaiveDateTime) -> Result<()> {
        self.send(Pdu::clock_set(time, self.generate_pdu_reference()))
            .await
            .map(drop)
    }

    /// Set the session password; at most 8 ASCII characters.
    pub async fn set_password(&self, password: &str) -> Result<()> {
        if password.len() > MAX_PASSWORD_LEN {
            return Err(Error::PasswordLengthInvalid {
                max: MAX_PASSWORD_LEN,
            });
        }
        self.send(Pdu::set_password(password, self.generate_pdu_reference()))
            .await
            .map(drop)
    }

    /// Clear the session password.
    pub async fn clear_password(&self) -> Result<()> {
        self.send(Pdu::clear_password(self.generate_pdu_reference()))
            .await
            .map(drop)
    }
}

fn trimmed(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Acknowledgement consistency checks applied to every request/response
/// pair: header and userdata error codes, PDU reference equality, and the
/// per-item return codes of read/write answers.
fn check_req_ack(request: &Pdu, ack: &Pdu) -> Result<()> {
    let Some(ack_header) = ack.header.as_ref() else {
        return Ok(());
    };

    if let Header::Ack(header) = ack_header {
        if header.error_class != 0x00 {
            return Err(Error::ResponseExceptional {
                class: error_class_desc(header.error_class),
                reason: error_code_desc(header.combined_error_code()),
            });
        }
    }

    if let Some(request_header) = request.header.as_ref() {
        if ack_header.pdu_reference() != request_header.pdu_reference() {
            return Err(Error::PduReferenceMismatch);
        }
    }

    if let Some(Parameter::UserdataAck(parameter)) = ack.parameter.as_ref() {
        if parameter.error_class != 0x00 {
            return Err(Error::ResponseExceptional {
                class: error_class_desc(parameter.error_class),
                reason: error_code_desc(parameter.combined_error_code()),
            });
        }
    }

    let Some(Datum::ReadWrite(datum)) = ack.datum.as_ref() else {
        return Ok(());
    };
    if let Some(Parameter::ReadWrite(request_parameter)) = request.parameter.as_ref() {
        if datum.items.len() != request_parameter.item_count as usize {
            return Err(Error::ResponseLengthMismatch);
        }
        for item in &datum.items {
            if item.return_code() != ReturnCode::Success {
                return Err(Error::ResponseExceptional {
                    class: "unknown",
                    reason: item.return_code().describe(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlcKind;
    use crate::protocol::frame::{
        AckHeader, CotpData, MessageType, ReadWriteDatum, ReadWriteParameter, ResponseItem,
        ReturnItem, SetupComParameter, Tpkt, WireEncode,
    };
    use crate::protocol::frame::{Cotp, DataVariableType};
    use std::sync::atomic::AtomicUsize;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn pdu_reference_wraps_exactly_once(client: &Client) -> (usize, bool) {
        let mut wraps = 0;
        let mut previous = None;
        let mut adjacent_equal = false;
        for _ in 0..65536 {
            let reference = client.generate_pdu_reference();
            if let Some(prev) = previous {
                if reference == prev {
                    adjacent_equal = true;
                }
                if reference < prev {
                    wraps += 1;
                }
            }
            previous = Some(reference);
        }
        (wraps, adjacent_equal)
    }

    #[test]
    fn pdu_reference_generation_wraps() {
        let client = Client::new(ClientOptions::default());
        let (wraps, adjacent_equal) = pdu_reference_wraps_exactly_once(&client);
        assert_eq!(wraps, 1);
        assert!(!adjacent_equal);
    }

    #[test]
    fn check_req_ack_flags_exceptional_headers() {
        let request = Pdu::clock_read(7);
        let mut ack = Pdu {
            tpkt: Some(Tpkt::new()),
            cotp: Some(Cotp::Data(CotpData::new())),
            header: Some(Header::Ack(AckHeader {
                protocol_id: 0x32,
                message_type: MessageType::AckData,
                reserved: 0,
                pdu_reference: 7,
                parameter_length: 0,
                data_length: 0,
                error_class: 0x85,
                error_code: 0x00,
            })),
            parameter: None,
            datum: None,
        };
        ack.self_check();
        match check_req_ack(&request, &ack) {
            Err(Error::ResponseExceptional { class, reason }) => {
                assert_eq!(class, "error on supplies");
                assert_eq!(reason, "S7 protocol error: wrong frames");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn check_req_ack_flags_reference_mismatch_and_item_errors() {
        let item = StandardItem::new(Area::DataBlocks, 1, VariableType::Byte, 0, 0, 1);
        let request = Pdu::read_request(vec![RequestItem::Standard(item)], 3);

        let make_ack = |reference: u16, items: Vec<ResponseItem>| {
            let mut ack = Pdu {
                tpkt: Some(Tpkt::new()),
                cotp: Some(Cotp::Data(CotpData::new())),
                header: Some(Header::Ack(AckHeader {
                    protocol_id: 0x32,
                    message_type: MessageType::AckData,
                    reserved: 0,
                    pdu_reference: reference,
                    parameter_length: 0,
                    data_length: 0,
                    error_class: 0,
                    error_code: 0,
                })),
                parameter: Some(Parameter::ReadWrite(ReadWriteParameter::ack(
                    crate::protocol::frame::FunctionCode::Read,
                    1,
                ))),
                datum: Some(Datum::ReadWrite(ReadWriteDatum::new(items))),
            };
            ack.self_check();
            ack
        };

        let ok_items = vec![ResponseItem::Data(DataItem::response(
            Bytes::from_static(&[0x01]),
            DataVariableType::ByteWordDword,
        ))];
        assert!(check_req_ack(&request, &make_ack(3, ok_items.clone())).is_ok());
        assert!(matches!(
            check_req_ack(&request, &make_ack(4, ok_items)),
            Err(Error::PduReferenceMismatch)
        ));
        assert!(matches!(
            check_req_ack(&request, &make_ack(3, vec![])),
            Err(Error::ResponseLengthMismatch)
        ));
        let failed = vec![ResponseItem::Return(ReturnItem {
            return_code: ReturnCode::AddressOutOfRange,
        })];
        assert!(matches!(
            check_req_ack(&request, &make_ack(3, failed)),
            Err(Error::ResponseExceptional { .. })
        ));
    }

    // ---- mock peer machinery ----

    struct MockPlc {
        listener: TcpListener,
        pdu_length: u16,
    }

    impl MockPlc {
        async fn bind(pdu_length: u16) -> (Self, String) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            (
                MockPlc {
                    listener,
                    pdu_length,
                },
                addr.to_string(),
            )
        }

        /// Accept one connection and serve the handshake plus `serve` frames.
        fn run<F>(self, serve: F) -> tokio::task::JoinHandle<Vec<Pdu>>
        where
            F: Fn(&Pdu) -> Option<Pdu> + Send + 'static,
        {
            tokio::spawn(async move {
                let (mut stream, _) = self.listener.accept().await.unwrap();
                let mut seen = Vec::new();
                loop {
                    let mut head = [0u8; 4];
                    if stream.read_exact(&mut head).await.is_err() {
                        break;
                    }
                    let total = u16::from_be_bytes([head[2], head[3]]) as usize;
                    let mut rest = vec![0u8; total - 4];
                    if stream.read_exact(&mut rest).await.is_err() {
                        break;
                    }
                    let mut frame = head.to_vec();
                    frame.extend_from_slice(&rest);
                    let request = Pdu::parse(&frame).unwrap();

                    let response = match request.cotp.as_ref().map(|c| c.pdu_type()) {
                        Some(CotpType::ConnectRequest) => Some(connect_confirm()),
                        Some(CotpType::DisconnectRequest) => Some(disconnect_confirm()),
                        _ => {
                            if matches!(request.parameter, Some(Parameter::SetupCom(_))) {
                                Some(setup_ack(&request, self.pdu_length))
                            } else {
                                serve(&request)
                            }
                        }
                    };
                    seen.push(request);
                    match response {
                        Some(pdu) => {
                            if stream.write_all(&pdu.to_bytes()).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                seen
            })
        }
    }

    fn connect_confirm() -> Pdu {
        // the canonical handshake sample frame
        let bytes = [
            0x03, 0x00, 0x00, 0x16, 0x11, 0xD0, 0x00, 0x01, 0x00, 0x01, 0x00, 0xC0, 0x01, 0x0A,
            0xC1, 0x02, 0x01, 0x00, 0xC2, 0x02, 0x01, 0x02,
        ];
        Pdu::parse(&bytes).unwrap()
    }

    fn disconnect_confirm() -> Pdu {
        let mut pdu = Pdu::disconnect_request(0x0100, 0x0102);
        if let Some(Cotp::Connection(connection)) = pdu.cotp.as_mut() {
            connection.pdu_type = CotpType::DisconnectConfirm;
        }
        pdu.self_check();
        pdu
    }

    fn ack_data(request: &Pdu, parameter: Option<Parameter>, datum: Option<Datum>) -> Pdu {
        let mut pdu = Pdu {
            tpkt: Some(Tpkt::new()),
            cotp: Some(Cotp::Data(CotpData::new())),
            header: Some(Header::Ack(AckHeader {
                protocol_id: 0x32,
                message_type: MessageType::AckData,
                reserved: 0,
                pdu_reference: request.pdu_reference().unwrap_or(0),
                parameter_length: 0,
                data_length: 0,
                error_class: 0,
                error_code: 0,
            })),
            parameter,
            datum,
        };
        pdu.self_check();
        pdu
    }

    fn setup_ack(request: &Pdu, pdu_length: u16) -> Pdu {
        ack_data(
            request,
            Some(Parameter::SetupCom(SetupComParameter::new(pdu_length))),
            None,
        )
    }

    fn read_ack(request: &Pdu, payloads: Vec<Bytes>) -> Pdu {
        let items = payloads
            .into_iter()
            .map(|data| {
                ResponseItem::Data(DataItem::response(data, DataVariableType::ByteWordDword))
            })
            .collect();
        let count = match request.parameter.as_ref() {
            Some(Parameter::ReadWrite(p)) => p.item_count,
            _ => 0,
        };
        ack_data(
            request,
            Some(Parameter::ReadWrite(ReadWriteParameter::ack(
                crate::protocol::frame::FunctionCode::Read,
                count,
            ))),
            Some(Datum::ReadWrite(ReadWriteDatum::new(items))),
        )
    }

    fn write_ack(request: &Pdu) -> Pdu {
        let count = match request.parameter.as_ref() {
            Some(Parameter::ReadWrite(p)) => p.item_count,
            _ => 0,
        };
        let items = (0..count)
            .map(|_| {
                ResponseItem::Return(ReturnItem {
                    return_code: ReturnCode::Success,
                })
            })
            .collect();
        ack_data(
            request,
            Some(Parameter::ReadWrite(ReadWriteParameter::ack(
                crate::protocol::frame::FunctionCode::Write,
                count,
            ))),
            Some(Datum::ReadWrite(ReadWriteDatum::new(items))),
        )
    }

    fn test_options(addr: &str) -> ClientOptions {
        let (host, port) = addr.rsplit_once(':').unwrap();
        ClientOptions {
            host: host.to_string(),
            port: port.parse().unwrap(),
            pdu_length: 480,
            timeout: Duration::from_secs(2),
            ..ClientOptions::new(PlcKind::S1500, host)
        }
    }

    #[tokio::test]
    async fn connect_negotiates_pdu_length() {
        let (plc, addr) = MockPlc::bind(240).await;
        let peer = plc.run(|_| None);

        let client = Client::new(test_options(&addr));
        client.connect().await.unwrap();
        assert_eq!(client.pdu_length(), 240);
        assert_eq!(client.status(), Status::Connected);
        client.disconnect().await;
        assert_eq!(client.status(), Status::Disconnected);
        let seen = peer.await.unwrap();
        // connect request + setup, then the best-effort disconnect request
        assert!(seen.len() >= 2);
    }

    #[tokio::test]
    async fn read_bit_sends_the_expected_item_and_decodes() {
        let (plc, addr) = MockPlc::bind(480).await;
        let peer = plc.run(|request| match request.parameter.as_ref() {
            Some(Parameter::ReadWrite(p)) => {
                let item = match p.items.first() {
                    Some(RequestItem::Standard(item)) => item,
                    other => panic!("unexpected item {other:?}"),
                };
                assert_eq!(item.area, Area::DataBlocks);
                assert_eq!(item.db_number, 1);
                assert_eq!(item.variable_type, VariableType::Bit);
                assert_eq!(item.count, 1);
                assert_eq!(item.byte_address, 0);
                assert_eq!(item.bit_address, 0);
                Some(read_ack(request, vec![Bytes::from_static(&[0x01])]))
            }
            _ => None,
        });

        let client = Client::new(test_options(&addr));
        client.connect().await.unwrap();
        let raw = client.read_raw("DB1.X0.0").await.unwrap();
        assert_eq!(raw.data.as_ref(), &[0x01]);
        assert_eq!(raw.parse().unwrap(), Value::Bit(true));
        client.disconnect().await;
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn write_int_converts_to_byte_access() {
        let (plc, addr) = MockPlc::bind(480).await;
        let peer = plc.run(|request| match request.parameter.as_ref() {
            Some(Parameter::ReadWrite(p)) => {
                let item = match p.items.first() {
                    Some(RequestItem::Standard(item)) => item,
                    other => panic!("unexpected item {other:?}"),
                };
                // Int converts to two bytes at DB1.4 -> packed address 0x000020
                assert_eq!(item.variable_type, VariableType::Byte);
                assert_eq!(item.count, 2);
                assert_eq!(item.byte_address, 4);
                // the packed 24-bit address field is (4 << 3) | 0 = 0x000020
                let wire = request.to_bytes();
                assert!(wire.windows(3).any(|w| w == [0x00, 0x00, 0x20]));
                Some(write_ack(request))
            }
            _ => None,
        });

        let client = Client::new(test_options(&addr));
        client.connect().await.unwrap();
        let data = Value::Int(-88).to_bytes(PlcKind::S1500, client.pdu_length());
        assert_eq!(data.as_ref(), &[0xFF, 0xA8]);
        client.write_raw("DB1.I4", data).await.unwrap();
        client.disconnect().await;
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn batch_read_splits_and_reassembles() {
        let (plc, addr) = MockPlc::bind(240).await;
        let requests_seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests_seen);
        let peer = plc.run(move |request| match request.parameter.as_ref() {
            Some(Parameter::ReadWrite(p)) => {
                counter.fetch_add(1, Ordering::SeqCst);
                let payloads = p
                    .items
                    .iter()
                    .map(|item| match item {
                        RequestItem::Standard(item) => {
                            // payload bytes derived from the item's offset
                            Bytes::from(vec![
                                (item.byte_address & 0xFF) as u8;
                                item.count as usize
                            ])
                        }
                        other => panic!("unexpected item {other:?}"),
                    })
                    .collect();
                Some(read_ack(request, payloads))
            }
            _ => None,
        });

        let client = Client::new(test_options(&addr));
        client.connect().await.unwrap();
        assert_eq!(client.pdu_length(), 240);

        // 50 addresses of 30 bytes each; total 1500 bytes against a 226-byte
        // budget forces at least 7 request PDUs
        let addresses: Vec<String> = (0..50).map(|i| format!("DB1.B{}", i * 30)).collect();
        let refs: Vec<&str> = addresses.iter().map(String::as_str).collect();
        let mut items = Vec::new();
        for address in &refs {
            let mut item = parse_address(address).unwrap();
            item.count = 30;
            items.push(item);
        }
        let buffers = client.read_items(items).await.unwrap();
        assert_eq!(buffers.len(), 50);
        for (i, buffer) in buffers.iter().enumerate() {
            assert_eq!(buffer.len(), 30);
            // every fragment started at the item's own base offset
            assert_eq!(buffer[0], ((i * 30) & 0xFF) as u8);
        }
        assert!(requests_seen.load(Ordering::SeqCst) >= 7);
        client.disconnect().await;
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn clock_read_decodes_bcd_answer() {
        let (plc, addr) = MockPlc::bind(480).await;
        let peer = plc.run(|request| {
            let t = chrono::NaiveDate::from_ymd_opt(2024, 6, 15)
                .unwrap()
                .and_hms_milli_opt(12, 34, 56, 789)
                .unwrap();
            let mut response = Pdu::clock_set(t, request.pdu_reference().unwrap());
            // shape it as a read-clock response
            response.parameter = Some(Parameter::UserdataAck(
                crate::protocol::frame::UserdataAckParameter {
                    parameter_length: 8,
                    method: crate::protocol::frame::Method::Response,
                    function_group: crate::protocol::frame::FunctionGroup::ResponseTimeFunction,
                    sub_function: 0x01,
                    sequence: 0,
                    tpdu_number: 0,
                    last_data_unit: 0,
                    error_class: 0,
                    error_code: 0,
                },
            ));
            response.self_check();
            Some(response)
        });

        let client = Client::new(test_options(&addr));
        client.connect().await.unwrap();
        let clock = client.clock_read().await.unwrap();
        assert_eq!(
            clock,
            chrono::NaiveDate::from_ymd_opt(2024, 6, 15)
                .unwrap()
                .and_hms_milli_opt(12, 34, 56, 789)
                .unwrap()
        );
        client.disconnect().await;
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn set_password_validates_length_and_sends_obfuscated_datum() {
        let (plc, addr) = MockPlc::bind(480).await;
        let peer = plc.run(|request| {
            let Some(Datum::SetPassword(datum)) = request.datum.as_ref() else {
                panic!("expected password datum");
            };
            let expected0 = b'a' ^ 0x55;
            assert_eq!(datum.password[0], expected0);
            assert_eq!(datum.password[1], b'b' ^ 0x55);
            assert_eq!(datum.password[2], b'c' ^ 0x55 ^ expected0);
            // userdata responses keep the 0x07 message type
            let mut response = Pdu::clear_password(request.pdu_reference().unwrap());
            response.parameter = Some(Parameter::UserdataAck(
                crate::protocol::frame::UserdataAckParameter {
                    parameter_length: 8,
                    method: crate::protocol::frame::Method::Response,
                    function_group: crate::protocol::frame::FunctionGroup::ResponseSecurity,
                    sub_function: 0x01,
                    sequence: 0,
                    tpdu_number: 0,
                    last_data_unit: 0,
                    error_class: 0,
                    error_code: 0,
                },
            ));
            response.datum = Some(Datum::Userdata(crate::protocol::frame::UserdataDatum::new()));
            response.self_check();
            Some(response)
        });

        let client = Client::new(test_options(&addr));
        client.connect().await.unwrap();
        assert!(matches!(
            client.set_password("too-long-password").await,
            Err(Error::PasswordLengthInvalid { max: 8 })
        ));
        client.set_password("abc").await.unwrap();
        client.disconnect().await;
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn requests_fail_fast_when_disconnected() {
        let client = Client::new(ClientOptions::default());
        assert!(matches!(
            client.read_raw("DB1.X0.0").await,
            Err(Error::ConnectionNil(_))
        ));
    }
}
