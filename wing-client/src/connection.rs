//! Session management for one console connection.
//!
//! A session owns a private tokio runtime running two background tasks:
//! the session task multiplexes outgoing commands, keep-alives, and the
//! incoming token stream over the TCP control channel, and the meter task
//! drains level datagrams from the UDP socket. The public methods are
//! blocking and bridge into the runtime over bounded channels, so the
//! library is usable from plain threaded code.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::{mpsc, oneshot};

use wing_protocol::{
    decode_meter_datagram, encode_command, Command, MeterBatch, MeterId, NodeId, ProtocolError,
    Response, StreamDecoder, HANDSHAKE,
};

use crate::config::ConsoleConfig;
use crate::error::Error;

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// One meter batch correlated with the subscription it answers.
///
/// Levels pair up positionally with the subscribed identifiers, in
/// subscription order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterUpdate {
    pub request_id: u16,
    pub levels: Vec<(MeterId, i16)>,
}

#[derive(Debug, Clone)]
struct Subscription {
    request_id: u16,
    meters: Vec<MeterId>,
}

/// A live session with one console.
pub struct Connection {
    /// Current state.
    state: Mutex<SessionState>,
    /// Channel for outgoing commands.
    cmd_tx: Mutex<Option<mpsc::Sender<Command>>>,
    /// Channel for decoded responses. Holding the lock across the blocking
    /// receive serializes concurrent readers.
    resp_rx: Mutex<Option<mpsc::Receiver<Result<Response, Error>>>>,
    /// Channel for decoded meter batches.
    meter_rx: Mutex<Option<mpsc::Receiver<MeterBatch>>>,
    /// Local UDP port meter datagrams arrive on.
    meter_port: u16,
    /// The subscription the next batches are expected to answer.
    subscription: Mutex<Option<Subscription>>,
    /// Source of meter request ids.
    next_request: AtomicU16,
    /// Private tokio runtime.
    runtime: Mutex<Option<tokio::runtime::Runtime>>,
}

impl Connection {
    /// Connect to the console at `addr`, perform the channel handshake,
    /// and start the background tasks.
    pub fn establish(config: ConsoleConfig, addr: String) -> Result<Arc<Self>, Error> {
        info!("connecting to console at {addr}");

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;

        let connect_timeout = config.connect_timeout;
        let (stream, udp) = runtime.block_on(async {
            let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&addr))
                .await
                .map_err(|_| Error::Connect {
                    addr: addr.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "connect timed out",
                    ),
                })?
                .map_err(|e| Error::Connect { addr: addr.clone(), source: e })?;
            stream.set_nodelay(true)?;

            let mut stream = stream;
            stream.write_all(&HANDSHAKE).await?;

            let udp = UdpSocket::bind(("0.0.0.0", 0)).await?;
            Ok::<_, Error>((stream, udp))
        })?;

        let meter_port = udp.local_addr()?.port();
        info!("connected to {addr}, meter levels on UDP port {meter_port}");

        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_queue_depth);
        let (resp_tx, resp_rx) = mpsc::channel(config.command_queue_depth);
        let (meter_tx, meter_rx) = mpsc::channel(64);
        let (stop_tx, stop_rx) = oneshot::channel();

        runtime.spawn(async move {
            // Dropped on any exit path, stopping the meter task with us so
            // a reader blocked on meter batches wakes up too.
            let _stop = stop_tx;
            if let Err(e) = session_task(config, stream, cmd_rx, resp_tx).await {
                warn!("session task ended: {e}");
            }
        });
        runtime.spawn(meter_task(udp, meter_tx, stop_rx));

        Ok(Arc::new(Self {
            state: Mutex::new(SessionState::Connected),
            cmd_tx: Mutex::new(Some(cmd_tx)),
            resp_rx: Mutex::new(Some(resp_rx)),
            meter_rx: Mutex::new(Some(meter_rx)),
            meter_port,
            subscription: Mutex::new(None),
            next_request: AtomicU16::new(1),
            runtime: Mutex::new(Some(runtime)),
        }))
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Whether the session and its background task are both alive.
    pub fn is_connected(&self) -> bool {
        *self.state.lock() == SessionState::Connected
            && self
                .cmd_tx
                .lock()
                .as_ref()
                .is_some_and(|tx| !tx.is_closed())
    }

    /// Local UDP port the console sends meter datagrams to.
    pub fn meter_port(&self) -> u16 {
        self.meter_port
    }

    fn send(&self, cmd: Command) -> Result<(), Error> {
        let guard = self.cmd_tx.lock();
        let tx = guard.as_ref().ok_or(Error::NotConnected)?;
        tx.blocking_send(cmd).map_err(|_| Error::ConnectionClosed)
    }

    /// Queue a string write.
    ///
    /// Success means the command was queued for the session task; a wire
    /// failure surfaces as `ConnectionClosed` on a later call. The console
    /// does not acknowledge writes, so observing the applied value means
    /// requesting the node's data afterwards.
    pub fn set_string(&self, id: NodeId, value: &str) -> Result<(), Error> {
        self.send(Command::SetString { id, value: value.to_string() })
    }

    /// Queue a float write; same delivery semantics as
    /// [`set_string`](Self::set_string).
    pub fn set_float(&self, id: NodeId, value: f32) -> Result<(), Error> {
        self.send(Command::SetFloat { id, value })
    }

    /// Queue an integer write; same delivery semantics as
    /// [`set_string`](Self::set_string).
    pub fn set_int(&self, id: NodeId, value: i32) -> Result<(), Error> {
        self.send(Command::SetInt { id, value })
    }

    pub fn request_node_definition(&self, id: NodeId) -> Result<(), Error> {
        self.send(Command::RequestNodeDefinition { id })
    }

    pub fn request_node_data(&self, id: NodeId) -> Result<(), Error> {
        self.send(Command::RequestNodeData { id })
    }

    /// Block until the next response arrives.
    ///
    /// The wait is cooperative: the calling thread parks on the response
    /// channel while the runtime keeps servicing keep-alives and decoding,
    /// so a long wait cannot stall the session.
    pub fn read(&self) -> Result<Response, Error> {
        let mut guard = self.resp_rx.lock();
        let rx = guard.as_mut().ok_or(Error::NotConnected)?;
        match rx.blocking_recv() {
            Some(result) => result,
            None => Err(Error::ConnectionClosed),
        }
    }

    /// Replace the meter subscription and return its request id.
    ///
    /// An empty identifier list clears the subscription.
    pub fn subscribe_meters(&self, meters: &[MeterId]) -> Result<u16, Error> {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        self.send(Command::SubscribeMeters {
            request_id,
            port: self.meter_port,
            meters: meters.to_vec(),
        })?;
        *self.subscription.lock() = if meters.is_empty() {
            None
        } else {
            Some(Subscription { request_id, meters: meters.to_vec() })
        };
        Ok(request_id)
    }

    /// Block until the next meter batch for the active subscription
    /// arrives and pair its levels with the subscribed identifiers.
    ///
    /// Batches answering a superseded request id are still in flight right
    /// after a re-subscription; they are dropped silently. A batch whose
    /// level count disagrees with the subscription is a protocol error.
    pub fn read_meters(&self) -> Result<MeterUpdate, Error> {
        let sub = self.subscription.lock().clone().ok_or(Error::NotSubscribed)?;
        let mut guard = self.meter_rx.lock();
        let rx = guard.as_mut().ok_or(Error::NotConnected)?;
        loop {
            let Some(batch) = rx.blocking_recv() else {
                return Err(Error::ConnectionClosed);
            };
            if batch.request_id != sub.request_id {
                debug!(
                    "dropping stale meter batch for request {} (active: {})",
                    batch.request_id, sub.request_id
                );
                continue;
            }
            if batch.levels.len() != sub.meters.len() {
                return Err(ProtocolError::MeterBatchMismatch {
                    expected: sub.meters.len(),
                    got: batch.levels.len(),
                }
                .into());
            }
            return Ok(MeterUpdate {
                request_id: batch.request_id,
                levels: sub.meters.iter().copied().zip(batch.levels).collect(),
            });
        }
    }

    /// Tear the session down. Safe to call more than once.
    ///
    /// Readers parked in [`read`](Self::read) or
    /// [`read_meters`](Self::read_meters) wake with `ConnectionClosed`.
    pub fn disconnect(&self) {
        if *self.state.lock() == SessionState::Disconnected {
            return;
        }

        // Dropping the command channel ends the session task, which stops
        // the meter task with it. The runtime shutdown closes both result
        // channels, so parked readers wake and release the receiver locks
        // before they are taken below.
        *self.cmd_tx.lock() = None;
        if let Some(rt) = self.runtime.lock().take() {
            rt.shutdown_timeout(Duration::from_secs(1));
        }

        *self.resp_rx.lock() = None;
        *self.meter_rx.lock() = None;
        *self.subscription.lock() = None;

        *self.state.lock() = SessionState::Disconnected;
        info!("disconnected");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Background task multiplexing the TCP control channel.
async fn session_task(
    config: ConsoleConfig,
    stream: TcpStream,
    mut cmd_rx: mpsc::Receiver<Command>,
    resp_tx: mpsc::Sender<Result<Response, Error>>,
) -> Result<(), Error> {
    let (mut reader, mut writer) = stream.into_split();
    let mut decoder = StreamDecoder::new();
    let mut read_buf = BytesMut::with_capacity(8192);
    let mut active_meter: Option<(u16, u16)> = None;

    let start = tokio::time::Instant::now();
    let mut keep_alive =
        tokio::time::interval_at(start + config.data_keep_alive, config.data_keep_alive);
    let mut meter_keep_alive =
        tokio::time::interval_at(start + config.meter_keep_alive, config.meter_keep_alive);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    debug!("command channel closed, ending session task");
                    break;
                };
                if let Command::SubscribeMeters { request_id, port, meters } = &cmd {
                    if meters.is_empty() {
                        active_meter = None;
                    } else {
                        active_meter = Some((*request_id, *port));
                    }
                }
                trace!("sending command: {cmd:?}");
                match encode_command(&cmd) {
                    Ok(encoded) => {
                        writer.write_all(&encoded).await?;
                        // Traffic counts as liveness.
                        keep_alive.reset();
                    }
                    Err(e) => {
                        if resp_tx.send(Err(e.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }

            _ = keep_alive.tick() => {
                trace!("control keep-alive");
                writer.write_all(&HANDSHAKE).await?;
            }

            _ = meter_keep_alive.tick() => {
                if let Some((request_id, port)) = active_meter {
                    trace!("meter keep-alive for request {request_id}");
                    let encoded = encode_command(&Command::MeterKeepAlive { request_id, port })?;
                    writer.write_all(&encoded).await?;
                }
            }

            result = reader.read_buf(&mut read_buf) => {
                let n = result?;
                if n == 0 {
                    info!("console closed the connection");
                    let _ = resp_tx.send(Err(Error::ConnectionClosed)).await;
                    break;
                }
                decoder.feed(&read_buf);
                read_buf.clear();
                loop {
                    match decoder.next_response() {
                        Ok(Some(resp)) => {
                            if resp_tx.send(Ok(resp)).await.is_err() {
                                return Ok(());
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            error!("protocol error, dropping session: {e}");
                            let _ = resp_tx.send(Err(e.into())).await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

/// Background task draining meter datagrams from the UDP socket.
///
/// A malformed datagram is logged and dropped; UDP loss is already part of
/// the metering contract, so one bad datagram never ends the session. The
/// task exits when the session task drops its end of `stop`, closing the
/// batch channel and waking any parked meter reader.
async fn meter_task(
    socket: UdpSocket,
    meter_tx: mpsc::Sender<MeterBatch>,
    mut stop: oneshot::Receiver<()>,
) {
    let mut buf = [0u8; 4096];
    loop {
        tokio::select! {
            _ = &mut stop => {
                debug!("session ended, stopping meter task");
                break;
            }
            result = socket.recv_from(&mut buf) => match result {
                Ok((n, from)) => match decode_meter_datagram(&buf[..n]) {
                    Ok(batch) => {
                        trace!("meter batch {} with {} levels", batch.request_id, batch.levels.len());
                        if meter_tx.send(batch).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("dropping meter datagram from {from}: {e}"),
                },
                Err(e) => {
                    warn!("meter socket error: {e}");
                    break;
                }
            }
        }
    }
}
