//! Connection and request correlation.
//!
//! A [`Connection`] owns one GBXRemote session:
//! 1. Connect and check the handshake
//! 2. Split the stream; spawn the writer task and the read loop
//! 3. Callers register a handle, send a frame and wait on a oneshot channel
//! 4. The read loop routes responses to their waiter by handle and queues
//!    callbacks for [`Connection::get_callbacks`]
//!
//! The pending map and the closed flag share one lock, so a request can never
//! register after the connection has failed its waiters.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;

use crate::codec::{Value, XmlRpcCodec};
use crate::config::{ClientConfig, Timeouts};
use crate::error::{GbxError, Result};
use crate::protocol::{
    next_request_handle, Frame, FrameBuffer, FIRST_REQUEST_HANDLE, MAX_REQUEST_SIZE,
};
use crate::transport;
use crate::writer::{spawn_writer_task, OutboundFrame, WriterHandle};

/// An unsolicited server push, decoded from a callback frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackEnvelope {
    pub name: String,
    pub args: Vec<Value>,
}

impl CallbackEnvelope {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

type Reply = oneshot::Sender<Result<Value>>;

/// A request waiting for its response frame.
struct PendingRequest {
    method: String,
    reply: Reply,
}

struct State {
    pending: HashMap<u32, PendingRequest>,
    next_handle: u32,
    closed: bool,
}

/// State shared between callers, the read loop and the writer task.
struct Shared {
    state: Mutex<State>,
    callbacks: Mutex<VecDeque<CallbackEnvelope>>,
    last_read: Mutex<Instant>,
    timeouts: Arc<Timeouts>,
    shutdown: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn new(timeouts: Arc<Timeouts>) -> Self {
        Self {
            state: Mutex::new(State {
                pending: HashMap::new(),
                next_handle: FIRST_REQUEST_HANDLE,
                closed: false,
            }),
            callbacks: Mutex::new(VecDeque::new()),
            last_read: Mutex::new(Instant::now()),
            timeouts,
            shutdown: Notify::new(),
        }
    }

    /// Allocate a handle and park a reply channel under it.
    fn register(&self, method: &str) -> Result<(u32, oneshot::Receiver<Result<Value>>)> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(GbxError::ConnectionClosed);
        }

        let mut handle = state.next_handle;
        while state.pending.contains_key(&handle) {
            handle = next_request_handle(handle);
        }
        state.next_handle = next_request_handle(handle);

        let (reply, rx) = oneshot::channel();
        state.pending.insert(
            handle,
            PendingRequest {
                method: method.to_string(),
                reply,
            },
        );
        Ok((handle, rx))
    }

    fn forget(&self, handle: u32) {
        lock(&self.state).pending.remove(&handle);
    }

    fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    fn pending_count(&self) -> usize {
        lock(&self.state).pending.len()
    }

    /// Mark the connection closed and fail every waiter with `make_error()`.
    fn fail_all(&self, make_error: impl Fn() -> GbxError) {
        let drained: Vec<(u32, PendingRequest)> = {
            let mut state = lock(&self.state);
            state.closed = true;
            state.pending.drain().collect()
        };

        for (handle, request) in drained {
            tracing::debug!(
                "Failing pending {} (handle {:#010x})",
                request.method,
                handle
            );
            let _ = request.reply.send(Err(make_error()));
        }

        self.shutdown.notify_one();
    }

    fn route(&self, frame: Frame) {
        *lock(&self.last_read) = Instant::now();

        if frame.is_callback() {
            match XmlRpcCodec::decode_call(frame.payload()) {
                Ok((name, args)) => {
                    tracing::debug!("<- callback {}", name);
                    lock(&self.callbacks).push_back(CallbackEnvelope { name, args });
                }
                Err(e) => tracing::warn!("Discarding malformed callback frame: {}", e),
            }
            return;
        }

        let handle = frame.handle();
        let request = lock(&self.state).pending.remove(&handle);
        match request {
            Some(request) => {
                tracing::debug!("<- {} (handle {:#010x})", request.method, handle);
                let result = XmlRpcCodec::decode_response(frame.payload());
                let _ = request.reply.send(result);
            }
            None => tracing::warn!("Discarding response for unknown handle {:#010x}", handle),
        }
    }
}

/// Removes the pending entry when the waiting caller goes away.
struct PendingGuard<'a> {
    shared: &'a Shared,
    handle: u32,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared.forget(self.handle);
    }
}

/// A live GBXRemote connection.
///
/// All methods take `&self`; share it across tasks behind an `Arc`.
pub struct Connection {
    shared: Arc<Shared>,
    writer: WriterHandle,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<Result<()>>,
}

impl Connection {
    /// Connect over TCP and perform the handshake.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let stream =
            transport::connect(&config.host, config.port, config.connect_timeout()).await?;
        let connection = Self::from_stream(stream, config).await?;
        tracing::info!("Connected to {}:{}", config.host, config.port);
        Ok(connection)
    }

    /// Perform the handshake on an already connected stream and start the I/O tasks.
    pub async fn from_stream<S>(mut stream: S, config: &ClientConfig) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        transport::read_handshake(&mut stream, config.connect_timeout()).await?;

        let timeouts = Arc::new(Timeouts::new(config.read_timeout(), config.write_timeout()));
        let shared = Arc::new(Shared::new(timeouts.clone()));
        let (reader, write_half) = tokio::io::split(stream);

        let on_write_error = {
            let shared = shared.clone();
            move |e: &GbxError| {
                let message = e.to_string();
                if matches!(e, GbxError::Timeout(_)) {
                    shared.fail_all(|| GbxError::Timeout(message.clone()));
                } else {
                    shared.fail_all(|| GbxError::ConnectionClosed);
                }
            }
        };
        let (writer, writer_task) = spawn_writer_task(
            write_half,
            config.channel_capacity,
            timeouts,
            on_write_error,
        );

        let reader_shared = shared.clone();
        let max_payload = config.max_response_size;
        let reader_task = tokio::spawn(async move {
            let result = read_loop(reader, &reader_shared, max_payload).await;
            close_after_read_loop(&reader_shared, result);
        });

        Ok(Self {
            shared,
            writer,
            reader_task,
            writer_task,
        })
    }

    /// Call `method` and wait for its response.
    ///
    /// # Errors
    ///
    /// - `Fault` if the server answered with a fault
    /// - `Timeout` if no response arrived within the read timeout
    /// - `ConnectionClosed` if the connection closed first
    /// - `InvalidArgument` if the request cannot be encoded or is too large
    ///
    /// A `Timeout` only abandons this call: the connection stays open and a
    /// late reply is discarded. Callers that would rather not reuse a
    /// connection after a timeout should [`close`](Self::close) it and
    /// reconnect.
    pub async fn query(&self, method: &str, params: &[Value]) -> Result<Value> {
        let payload = XmlRpcCodec::encode_call(method, params)?;
        self.round_trip(method, payload).await
    }

    pub(crate) async fn round_trip(&self, method: &str, payload: Vec<u8>) -> Result<Value> {
        if payload.len() > MAX_REQUEST_SIZE as usize {
            return Err(GbxError::InvalidArgument(format!(
                "{} request is {} bytes, limit is {}",
                method,
                payload.len(),
                MAX_REQUEST_SIZE
            )));
        }

        let (handle, rx) = self.shared.register(method)?;
        let _guard = PendingGuard {
            shared: &self.shared,
            handle,
        };

        tracing::debug!("-> {} (handle {:#010x})", method, handle);
        self.writer
            .send(OutboundFrame::new(handle, Bytes::from(payload)))
            .await?;

        let limit = self.shared.timeouts.read();
        match tokio::time::timeout(limit, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GbxError::ConnectionClosed),
            Err(_) => Err(GbxError::Timeout(format!(
                "no response to {} within {:?}",
                method, limit
            ))),
        }
    }

    /// Drain every callback received so far, oldest first.
    pub fn get_callbacks(&self) -> Vec<CallbackEnvelope> {
        lock(&self.shared.callbacks).drain(..).collect()
    }

    /// Change the read and write timeouts of the running connection.
    pub fn set_timeouts(&self, read: Duration, write: Duration) {
        self.shared.timeouts.set(read, write);
    }

    /// Current `(read, write)` timeouts.
    pub fn timeouts(&self) -> (Duration, Duration) {
        (self.shared.timeouts.read(), self.shared.timeouts.write())
    }

    /// Time since the last frame of any kind was read.
    pub fn idle_time(&self) -> Duration {
        lock(&self.shared.last_read).elapsed()
    }

    /// Number of requests waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending_count()
    }

    /// Check if the connection has been closed, locally or by the peer.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed() || self.writer.is_closed()
    }

    /// Close the connection. Pending calls fail with `ConnectionClosed`.
    pub fn close(&self) {
        if !self.shared.is_closed() {
            tracing::info!("Closing connection");
        }
        self.shared.fail_all(|| GbxError::ConnectionClosed);
        self.writer_task.abort();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.fail_all(|| GbxError::ConnectionClosed);
        self.reader_task.abort();
    }
}

/// Read frames until EOF, a transport error, or a local shutdown.
async fn read_loop<R>(mut reader: R, shared: &Shared, max_payload: u32) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut frame_buffer = FrameBuffer::with_max_payload(max_payload);
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        if shared.is_closed() {
            return Ok(());
        }

        // A frame that started arriving must finish within the read timeout;
        // an idle connection may stay quiet indefinitely.
        let n = if frame_buffer.has_partial_frame() {
            let limit = shared.timeouts.read();
            tokio::select! {
                _ = shared.shutdown.notified() => return Ok(()),
                read = tokio::time::timeout(limit, reader.read(&mut buf)) => {
                    read.map_err(|_| {
                        GbxError::Timeout(format!("partial frame stalled for {:?}", limit))
                    })??
                }
            }
        } else {
            tokio::select! {
                _ = shared.shutdown.notified() => return Ok(()),
                read = reader.read(&mut buf) => read?,
            }
        };

        if n == 0 {
            return Err(GbxError::ConnectionClosed);
        }

        for frame in frame_buffer.push(&buf[..n])? {
            shared.route(frame);
        }
    }
}

fn close_after_read_loop(shared: &Shared, result: Result<()>) {
    match result {
        Ok(()) => shared.fail_all(|| GbxError::ConnectionClosed),
        Err(GbxError::ConnectionClosed) => {
            tracing::info!("Server closed the connection");
            shared.fail_all(|| GbxError::ConnectionClosed);
        }
        Err(GbxError::Io(e)) => {
            tracing::warn!("Connection lost: {}", e);
            shared.fail_all(|| GbxError::ConnectionClosed);
        }
        Err(GbxError::Timeout(message)) => {
            tracing::error!("Read loop timed out: {}", message);
            shared.fail_all(|| GbxError::Timeout(message.clone()));
        }
        Err(e) => {
            tracing::error!("Read loop error: {}", e);
            let message = e.to_string();
            shared.fail_all(|| GbxError::Protocol(message.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, build_handshake, HANDSHAKE_SIGNATURE};
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    /// Server side of a duplex pipe, speaking raw frames.
    struct FakeServer {
        stream: DuplexStream,
        buffer: FrameBuffer,
        frames: VecDeque<Frame>,
    }

    impl FakeServer {
        async fn next_call(&mut self) -> (u32, String, Vec<Value>) {
            loop {
                if let Some(frame) = self.frames.pop_front() {
                    let (method, params) = XmlRpcCodec::decode_call(frame.payload()).unwrap();
                    return (frame.handle(), method, params);
                }
                let mut buf = [0u8; 4096];
                let n = self.stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "client hung up");
                self.frames.extend(self.buffer.push(&buf[..n]).unwrap());
            }
        }

        async fn reply(&mut self, handle: u32, value: &Value) {
            let payload = XmlRpcCodec::encode_response(value).unwrap();
            self.stream
                .write_all(&build_frame(handle, &payload))
                .await
                .unwrap();
        }

        async fn push_callback(&mut self, name: &str, args: &[Value]) {
            let payload = XmlRpcCodec::encode_call(name, args).unwrap();
            self.stream.write_all(&build_frame(1, &payload)).await.unwrap();
        }
    }

    async fn connected(config: ClientConfig) -> (Connection, FakeServer) {
        let (client, mut server) = duplex(64 * 1024);
        server
            .write_all(&build_handshake(HANDSHAKE_SIGNATURE))
            .await
            .unwrap();
        let connection = Connection::from_stream(client, &config).await.unwrap();
        let server = FakeServer {
            stream: server,
            buffer: FrameBuffer::new(),
            frames: VecDeque::new(),
        };
        (connection, server)
    }

    #[test]
    fn test_wrapped_handle_skips_pending() {
        let shared = Shared::new(Arc::new(Timeouts::default()));
        lock(&shared.state).next_handle = u32::MAX;

        let (last, _rx1) = shared.register("a").unwrap();
        let (first, _rx2) = shared.register("b").unwrap();
        assert_eq!(last, u32::MAX);
        assert_eq!(first, FIRST_REQUEST_HANDLE);

        // Both still pending, so the allocator must step past them.
        lock(&shared.state).next_handle = u32::MAX;
        let (handle, _rx3) = shared.register("c").unwrap();
        assert_eq!(handle, 0x8000_0001);
        assert_eq!(lock(&shared.state).pending.len(), 3);
    }

    #[tokio::test]
    async fn test_query_roundtrip() {
        let (connection, mut server) = connected(ClientConfig::default()).await;

        let call = connection.query("GetMaxPlayers", &[]);
        let serve = async {
            let (handle, method, params) = server.next_call().await;
            assert_eq!(handle, FIRST_REQUEST_HANDLE);
            assert_eq!(method, "GetMaxPlayers");
            assert!(params.is_empty());
            server
                .reply(handle, &Value::structure([("CurrentValue", Value::Int(32))]))
                .await;
        };

        let (result, ()) = tokio::join!(call, serve);
        let value = result.unwrap();
        assert_eq!(value.get("CurrentValue"), Some(&Value::Int(32)));
        assert_eq!(connection.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_fault_is_local_to_call() {
        let (connection, mut server) = connected(ClientConfig::default()).await;

        let params = [Value::from("nobody")];
        let call = connection.query("Kick", &params);
        let serve = async {
            let (handle, _, _) = server.next_call().await;
            let payload = XmlRpcCodec::encode_fault(-1000, "Login unknown.").unwrap();
            server
                .stream
                .write_all(&build_frame(handle, &payload))
                .await
                .unwrap();
        };

        let (result, ()) = tokio::join!(call, serve);
        assert_eq!(result.unwrap_err().fault_code(), Some(-1000));
        assert!(!connection.is_closed());
    }

    #[tokio::test]
    async fn test_out_of_order_responses_reach_their_callers() {
        let (connection, mut server) = connected(ClientConfig::default()).await;

        let (a, b) = ([Value::from("a")], [Value::from("b")]);
        let first = connection.query("Echo", &a);
        let second = connection.query("Echo", &b);
        let serve = async {
            let mut calls = vec![server.next_call().await, server.next_call().await];
            // Answer in reverse order, with a callback in between.
            calls.reverse();
            let (h1, _, p1) = calls.remove(0);
            server.reply(h1, &p1[0]).await;
            server
                .push_callback("ManiaPlanet.PlayerConnect", &[Value::from("x")])
                .await;
            let (h2, _, p2) = calls.remove(0);
            server.reply(h2, &p2[0]).await;
        };

        let (a, b, ()) = tokio::join!(first, second, serve);
        assert_eq!(a.unwrap(), Value::from("a"));
        assert_eq!(b.unwrap(), Value::from("b"));
        assert_eq!(connection.get_callbacks().len(), 1);
    }

    #[tokio::test]
    async fn test_callbacks_drain_to_empty() {
        let (connection, mut server) = connected(ClientConfig::default()).await;

        server
            .push_callback("ManiaPlanet.PlayerConnect", &[Value::from("login123")])
            .await;
        // A query round trip guarantees the callback frame was read first.
        let call = connection.query("GetStatus", &[]);
        let serve = async {
            let (handle, _, _) = server.next_call().await;
            server.reply(handle, &Value::Int(4)).await;
        };
        let (result, ()) = tokio::join!(call, serve);
        result.unwrap();

        let callbacks = connection.get_callbacks();
        assert_eq!(
            callbacks,
            vec![CallbackEnvelope::new(
                "ManiaPlanet.PlayerConnect",
                vec![Value::from("login123")]
            )]
        );
        assert!(connection.get_callbacks().is_empty());
    }

    #[tokio::test]
    async fn test_read_timeout_fails_call_but_keeps_connection() {
        let mut config = ClientConfig::default();
        config.read_timeout_ms = 30;
        let (connection, mut server) = connected(config).await;

        let err = connection.query("GetStatus", &[]).await.unwrap_err();
        assert!(matches!(err, GbxError::Timeout(_)));
        assert_eq!(connection.pending_requests(), 0);

        // The late reply is discarded; the next call still works.
        let (late, _, _) = server.next_call().await;
        server.reply(late, &Value::Int(1)).await;

        connection.set_timeouts(Duration::from_secs(5), Duration::from_secs(5));
        let call = connection.query("GetStatus", &[]);
        let serve = async {
            let (handle, _, _) = server.next_call().await;
            assert_ne!(handle, late);
            server.reply(handle, &Value::Int(2)).await;
        };
        let (result, ()) = tokio::join!(call, serve);
        assert_eq!(result.unwrap(), Value::Int(2));
    }

    #[tokio::test]
    async fn test_peer_close_fails_pending_calls() {
        let (connection, mut server) = connected(ClientConfig::default()).await;

        let first = connection.query("GetStatus", &[]);
        let second = connection.query("GetVersion", &[]);
        let serve = async {
            server.next_call().await;
            server.next_call().await;
            drop(server);
        };

        let (a, b, ()) = tokio::join!(first, second, serve);
        assert!(matches!(a, Err(GbxError::ConnectionClosed)));
        assert!(matches!(b, Err(GbxError::ConnectionClosed)));
        assert!(connection.is_closed());
        assert!(matches!(
            connection.query("GetStatus", &[]).await,
            Err(GbxError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_closes_connection() {
        let mut config = ClientConfig::default();
        config.max_response_size = 64;
        let (connection, mut server) = connected(config).await;

        let call = connection.query("GetMapList", &[]);
        let serve = async {
            let (handle, _, _) = server.next_call().await;
            server.reply(handle, &Value::from("x".repeat(500))).await;
        };

        let (result, ()) = tokio::join!(call, serve);
        assert!(matches!(result, Err(GbxError::Protocol(_))));
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn test_close_rejects_new_calls() {
        let (connection, _server) = connected(ClientConfig::default()).await;

        connection.close();

        assert!(connection.is_closed());
        assert!(matches!(
            connection.query("GetStatus", &[]).await,
            Err(GbxError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_oversized_request_rejected_before_io() {
        let (connection, _server) = connected(ClientConfig::default()).await;

        let huge = Value::from("x".repeat(MAX_REQUEST_SIZE as usize));
        let err = connection.query("ChatSend", &[huge]).await.unwrap_err();

        assert!(matches!(err, GbxError::InvalidArgument(_)));
        assert_eq!(connection.pending_requests(), 0);
        assert!(!connection.is_closed());
    }

    #[tokio::test]
    async fn test_idle_time_resets_on_frame() {
        let (connection, mut server) = connected(ClientConfig::default()).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(connection.idle_time() >= Duration::from_millis(30));

        let call = connection.query("GetStatus", &[]);
        let serve = async {
            let (handle, _, _) = server.next_call().await;
            server.reply(handle, &Value::Int(4)).await;
        };
        let (result, ()) = tokio::join!(call, serve);
        result.unwrap();

        assert!(connection.idle_time() < Duration::from_millis(30));
    }
}
