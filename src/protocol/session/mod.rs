mod state;

pub use state::{ConnectCompleter, ConnectionStatus, DisconnectCompleter, LostHandler, Status};

use super::{
    codec::Codec,
    error::{Error, Result},
    frame::{CotpType, Pdu},
};
use futures_util::{SinkExt, StreamExt};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU16, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    net::TcpStream,
    select,
    sync::{mpsc, oneshot},
    time::{sleep, Instant},
};
use tokio_util::{codec::Framed, sync::CancellationToken};

/// TPKT plus COTP data header bytes in front of the S7 payload.
pub const ISO_HEADER_SIZE: u16 = 7;
/// Smallest TPKT length the dispatcher accepts.
pub const MIN_PDU_SIZE: u16 = 1;

/// Identifies the waiter a response completes: standard requests by PDU
/// reference, the ISO connect/disconnect exchanges by their single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterKey {
    Reference(u16),
    IsoConnect,
    IsoDisconnect,
}

struct Transmit {
    key: WaiterKey,
    pdu: Pdu,
    timeout: Duration,
    response_tx: oneshot::Sender<Result<Pdu>>,
}

/// Owns one TCP connection: serializes writes, matches inbound frames to
/// pending waiters by PDU reference, and enforces per-request timeouts.
///
/// The dispatcher is a handle to a spawned connection task; dropping it does
/// not terminate the task, `cancel` does.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    request_tx: mpsc::Sender<Transmit>,
    cancel: CancellationToken,
    endpoint: Arc<str>,
}

impl std::fmt::Debug for Transmit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transmit").field("key", &self.key).finish()
    }
}

impl Dispatcher {
    /// Spawn the connection task on `stream`. Inbound frames larger than
    /// `max_pdu_length + ISO_HEADER_SIZE` (once `max_pdu_length` is non-zero)
    /// complete their waiter with `ResponseInvalid`. `lost_tx` fires once
    /// when the transport dies.
    pub fn spawn(
        stream: TcpStream,
        endpoint: String,
        max_pdu_length: Arc<AtomicU16>,
        lost_tx: mpsc::Sender<Error>,
    ) -> Dispatcher {
        let (request_tx, request_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            run_connection(stream, request_rx, max_pdu_length, lost_tx, task_cancel).await;
        });
        Dispatcher {
            request_tx,
            cancel,
            endpoint: endpoint.into(),
        }
    }

    /// Send a PDU and await the matching response.
    pub async fn request(&self, key: WaiterKey, pdu: Pdu, timeout: Duration) -> Result<Pdu> {
        let (response_tx, response_rx) = oneshot::channel();
        let transmit = Transmit {
            key,
            pdu,
            timeout,
            response_tx,
        };
        self.request_tx
            .send(transmit)
            .await
            .map_err(|_| Error::ConnectionInactive(self.endpoint.to_string()))?;
        match response_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::ConnectionInactive(self.endpoint.to_string())),
        }
    }

    /// Stop the connection task; all pending waiters fail with
    /// `ConnectionInactive`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

struct Waiters {
    pending: HashMap<u16, oneshot::Sender<Result<Pdu>>>,
    iso_connect: Option<oneshot::Sender<Result<Pdu>>>,
    iso_disconnect: Option<oneshot::Sender<Result<Pdu>>>,
    timeouts: BTreeMap<Instant, Vec<WaiterKey>>,
}

impl Waiters {
    fn new() -> Self {
        Waiters {
            pending: HashMap::with_capacity(16),
            iso_connect: None,
            iso_disconnect: None,
            timeouts: BTreeMap::new(),
        }
    }

    fn take(&mut self, key: WaiterKey) -> Option<oneshot::Sender<Result<Pdu>>> {
        match key {
            WaiterKey::Reference(r) => self.pending.remove(&r),
            WaiterKey::IsoConnect => self.iso_connect.take(),
            WaiterKey::IsoDisconnect => self.iso_disconnect.take(),
        }
    }

    fn fail_all(&mut self, endpoint: &str) {
        for (_, tx) in self.pending.drain() {
            let _ = tx.send(Err(Error::ConnectionInactive(endpoint.to_string())));
        }
        if let Some(tx) = self.iso_connect.take() {
            let _ = tx.send(Err(Error::ConnectionInactive(endpoint.to_string())));
        }
        if let Some(tx) = self.iso_disconnect.take() {
            let _ = tx.send(Err(Error::ConnectionInactive(endpoint.to_string())));
        }
        self.timeouts.clear();
    }
}

async fn run_connection(
    stream: TcpStream,
    mut request_rx: mpsc::Receiver<Transmit>,
    max_pdu_length: Arc<AtomicU16>,
    lost_tx: mpsc::Sender<Error>,
    cancel: CancellationToken,
) {
    let endpoint = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let _ = stream.set_nodelay(true);
    let mut framed = Framed::new(stream, Codec);
    let mut waiters = Waiters::new();
    // reusable sleep tracking the nearest timeout deadline
    let far_future = Duration::from_secs(3600);
    let mut deadline = Box::pin(sleep(far_future));

    loop {
        match waiters.timeouts.keys().next().copied() {
            Some(next) => deadline.as_mut().reset(next),
            None => deadline.as_mut().reset(Instant::now() + far_future),
        }
        select! {
            _ = cancel.cancelled() => {
                tracing::debug!(endpoint = %endpoint, "dispatcher cancelled");
                break;
            }
            transmit = request_rx.recv() => {
                match transmit {
                    Some(transmit) => {
                        handle_transmit(transmit, &mut framed, &mut waiters, &endpoint).await;
                    }
                    None => break,
                }
            }
            frame = framed.next() => {
                match frame {
                    Some(Ok(pdu)) => {
                        route_response(pdu, &mut waiters, &max_pdu_length, &endpoint);
                    }
                    Some(Err(e)) => {
                        tracing::warn!(endpoint = %endpoint, error = %e, "transport read failed");
                        let _ = lost_tx.try_send(Error::Io(e));
                        break;
                    }
                    None => {
                        tracing::info!(endpoint = %endpoint, "peer closed the connection");
                        let _ = lost_tx.try_send(Error::ResponseEmpty);
                        break;
                    }
                }
            }
            _ = &mut deadline => {
                expire_timeouts(&mut waiters);
            }
        }
    }

    waiters.fail_all(&endpoint);
}

async fn handle_transmit(
    transmit: Transmit,
    framed: &mut Framed<TcpStream, Codec>,
    waiters: &mut Waiters,
    endpoint: &str,
) {
    let Transmit {
        key,
        pdu,
        timeout,
        response_tx,
    } = transmit;

    let occupied = match key {
        WaiterKey::Reference(r) => waiters.pending.contains_key(&r),
        WaiterKey::IsoConnect => waiters.iso_connect.is_some(),
        WaiterKey::IsoDisconnect => waiters.iso_disconnect.is_some(),
    };
    if occupied {
        let reference = match key {
            WaiterKey::Reference(r) => r,
            _ => 0,
        };
        let _ = response_tx.send(Err(Error::RequestProcessing(reference)));
        return;
    }

    match key {
        WaiterKey::Reference(r) => {
            waiters.pending.insert(r, response_tx);
        }
        WaiterKey::IsoConnect => waiters.iso_connect = Some(response_tx),
        WaiterKey::IsoDisconnect => waiters.iso_disconnect = Some(response_tx),
    }
    waiters
        .timeouts
        .entry(Instant::now() + timeout)
        .or_default()
        .push(key);

    tracing::debug!(endpoint = %endpoint, key = ?key, "sending request");
    if let Err(e) = framed.send(pdu).await {
        tracing::warn!(endpoint = %endpoint, error = %e, "transport write failed");
        if let Some(tx) = waiters.take(key) {
            let _ = tx.send(Err(Error::Io(e)));
        }
    }
}

fn route_response(
    pdu: Pdu,
    waiters: &mut Waiters,
    max_pdu_length: &AtomicU16,
    endpoint: &str,
) {
    let key = match pdu.cotp.as_ref().map(|c| c.pdu_type()) {
        Some(CotpType::ConnectConfirm) => WaiterKey::IsoConnect,
        Some(CotpType::Reject) => {
            if let Some(tx) = waiters.take(WaiterKey::IsoConnect) {
                let _ = tx.send(Err(Error::RequestRejected));
            } else {
                tracing::info!(endpoint = %endpoint, "discarding stale reject");
            }
            return;
        }
        Some(CotpType::DisconnectConfirm) => WaiterKey::IsoDisconnect,
        Some(CotpType::Data) => match pdu.pdu_reference() {
            Some(reference) => WaiterKey::Reference(reference),
            None => {
                tracing::info!(endpoint = %endpoint, "discarding data frame without header");
                return;
            }
        },
        _ => {
            tracing::info!(endpoint = %endpoint, "discarding unexpected COTP frame");
            return;
        }
    };

    let Some(tx) = waiters.take(key) else {
        tracing::info!(endpoint = %endpoint, key = ?key, "discarding stale response");
        return;
    };

    let result = validate_frame(&pdu, max_pdu_length).map(|()| pdu);
    let _ = tx.send(result);
}

/// Length sanity on delivery: the TPKT length must stay between the minimum
/// and the negotiated PDU length plus ISO framing.
fn validate_frame(pdu: &Pdu, max_pdu_length: &AtomicU16) -> Result<()> {
    let Some(tpkt) = pdu.tpkt.as_ref() else {
        return Err(Error::ResponseInvalid);
    };
    let max = max_pdu_length.load(Ordering::Relaxed);
    if tpkt.length < MIN_PDU_SIZE || (max > 0 && tpkt.length > max + ISO_HEADER_SIZE) {
        return Err(Error::ResponseInvalid);
    }
    Ok(())
}

fn expire_timeouts(waiters: &mut Waiters) {
    let now = Instant::now();
    let expired: Vec<Instant> = waiters
        .timeouts
        .keys()
        .take_while(|deadline| **deadline <= now)
        .copied()
        .collect();
    for deadline in expired {
        if let Some(keys) = waiters.timeouts.remove(&deadline) {
            for key in keys {
                if let Some(tx) = waiters.take(key) {
                    tracing::debug!(key = ?key, "request timed out");
                    let _ = tx.send(Err(Error::RequestTimeout));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::frame::WireEncode;
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn connect_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    fn spawn_dispatcher(stream: TcpStream) -> (Dispatcher, mpsc::Receiver<Error>) {
        let (lost_tx, lost_rx) = mpsc::channel(1);
        let dispatcher = Dispatcher::spawn(
            stream,
            "test".to_string(),
            Arc::new(AtomicU16::new(0)),
            lost_tx,
        );
        (dispatcher, lost_rx)
    }

    #[tokio::test]
    async fn matches_response_by_pdu_reference() {
        let (client, mut server) = connect_pair().await;
        let (dispatcher, _lost) = spawn_dispatcher(client);

        let peer = tokio::spawn(async move {
            let mut buf = vec![0u8; 256];
            let n = server.read(&mut buf).await.unwrap();
            let request = Pdu::parse(&buf[..n]).unwrap();
            let reference = request.pdu_reference().unwrap();
            // answer with a clock-read style request echo carrying the same reference
            let response = Pdu::clock_read(reference);
            server.write_all(&response.to_bytes()).await.unwrap();
            server
        });

        let response = dispatcher
            .request(
                WaiterKey::Reference(9),
                Pdu::clock_read(9),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(response.pdu_reference(), Some(9));
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_reference_is_rejected() {
        let (client, _server) = connect_pair().await;
        let (dispatcher, _lost) = spawn_dispatcher(client);

        let first = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .request(
                        WaiterKey::Reference(5),
                        Pdu::clock_read(5),
                        Duration::from_millis(300),
                    )
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = dispatcher
            .request(
                WaiterKey::Reference(5),
                Pdu::clock_read(5),
                Duration::from_millis(300),
            )
            .await;
        assert!(matches!(second, Err(Error::RequestProcessing(5))));
        // the first waiter expires on its own
        assert!(matches!(first.await.unwrap(), Err(Error::RequestTimeout)));
    }

    #[tokio::test]
    async fn timeout_removes_waiter_and_late_response_is_dropped() {
        let (client, mut server) = connect_pair().await;
        let (dispatcher, _lost) = spawn_dispatcher(client);

        let result = dispatcher
            .request(
                WaiterKey::Reference(3),
                Pdu::clock_read(3),
                Duration::from_millis(50),
            )
            .await;
        assert!(matches!(result, Err(Error::RequestTimeout)));

        // late response; nothing to complete, it must simply be discarded
        server
            .write_all(&Pdu::clock_read(3).to_bytes())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // dispatcher still alive and usable
        let again = dispatcher
            .request(
                WaiterKey::Reference(4),
                Pdu::clock_read(4),
                Duration::from_millis(50),
            )
            .await;
        assert!(matches!(again, Err(Error::RequestTimeout)));
    }

    #[tokio::test]
    async fn peer_close_fails_pending_and_notifies_loss() {
        let (client, server) = connect_pair().await;
        let (dispatcher, mut lost) = spawn_dispatcher(client);

        let pending = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .request(
                        WaiterKey::Reference(1),
                        Pdu::clock_read(1),
                        Duration::from_secs(5),
                    )
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(server);

        assert!(matches!(
            pending.await.unwrap(),
            Err(Error::ConnectionInactive(_))
        ));
        assert!(lost.recv().await.is_some());
    }

    #[tokio::test]
    async fn cancel_fails_pending_waiters() {
        let (client, _server) = connect_pair().await;
        let (dispatcher, _lost) = spawn_dispatcher(client);

        let pending = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .request(
                        WaiterKey::Reference(2),
                        Pdu::clock_read(2),
                        Duration::from_secs(5),
                    )
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        dispatcher.cancel();
        assert!(matches!(
            pending.await.unwrap(),
            Err(Error::ConnectionInactive(_))
        ));
    }
}
