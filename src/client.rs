//! Client builder and the facade handed to collaborators.
//!
//! The [`ClientBuilder`] provides a fluent API for the connection settings and
//! the session setup done right after the handshake:
//! 1. Connect and check the `GBXRemote 2` handshake
//! 2. Authenticate, if credentials were given
//! 3. Select the API version, if one was given
//! 4. Enable callbacks, if requested
//!
//! # Example
//!
//! ```ignore
//! use gbxremote_client::{methods, GbxClient};
//!
//! #[tokio::main]
//! async fn main() -> gbxremote_client::Result<()> {
//!     let client = GbxClient::builder()
//!         .host("127.0.0.1")
//!         .port(5000)
//!         .credentials("SuperAdmin", "SuperAdmin")
//!         .enable_callbacks(true)
//!         .connect()
//!         .await?;
//!
//!     let status = methods::get_status().call(&client).await?;
//!     println!("{} ({})", status.name, status.code);
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::auth::{AuthGate, AuthLevel};
use crate::codec::Value;
use crate::config::ClientConfig;
use crate::connection::{CallbackEnvelope, Connection};
use crate::error::Result;
use crate::methods;
use crate::multicall::{Multicall, MulticallResults, Slot};

/// Builder for configuring and connecting a [`GbxClient`].
#[derive(Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    credentials: Option<(String, String)>,
    api_version: Option<String>,
    enable_callbacks: bool,
}

impl ClientBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Default: 5 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Time a caller waits for its response.
    ///
    /// Default: 20 seconds
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Default: 10 seconds
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Largest response payload accepted.
    ///
    /// Default: 16 MiB
    pub fn max_response_size(mut self, bytes: u32) -> Self {
        self.config.max_response_size = bytes;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 256
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Authenticate with these credentials once connected.
    pub fn credentials(mut self, login: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((login.into(), password.into()));
        self
    }

    /// Select the callback and struct API version once connected.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Ask the server to push callbacks once connected.
    pub fn enable_callbacks(mut self, enable: bool) -> Self {
        self.enable_callbacks = enable;
        self
    }

    /// Connect over TCP and run the session setup.
    pub async fn connect(self) -> Result<GbxClient> {
        let connection = Connection::connect(&self.config).await?;
        self.setup(connection).await
    }

    /// Run the handshake and session setup over an already open stream.
    pub async fn connect_stream<S>(self, stream: S) -> Result<GbxClient>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let connection = Connection::from_stream(stream, &self.config).await?;
        self.setup(connection).await
    }

    async fn setup(self, connection: Connection) -> Result<GbxClient> {
        let client = GbxClient::from_connection(connection);

        if let Some((login, password)) = &self.credentials {
            client.authenticate(login, password).await?;
        }
        if let Some(version) = &self.api_version {
            methods::set_api_version(version).call(&client).await?;
        }
        if self.enable_callbacks {
            methods::enable_callbacks(true).call(&client).await?;
        }

        Ok(client)
    }
}

/// A connected GBXRemote client.
///
/// All methods take `&self`; share it across tasks behind an `Arc`.
pub struct GbxClient {
    connection: Connection,
    auth: AuthGate,
    multicall: Multicall,
}

impl GbxClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connect with `config`, without any session setup.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        Ok(Self::from_connection(Connection::connect(config).await?))
    }

    /// Wrap an established connection.
    pub fn from_connection(connection: Connection) -> Self {
        Self {
            connection,
            auth: AuthGate::new(),
            multicall: Multicall::new(),
        }
    }

    /// Authenticate as `SuperAdmin`, `Admin` or `User`.
    ///
    /// No request is sent if the session already holds that level.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<AuthLevel> {
        self.auth
            .authenticate(&self.connection, login, password)
            .await
    }

    /// Level held by the session.
    pub fn auth_level(&self) -> AuthLevel {
        self.auth.level()
    }

    /// Call `method` now and wait for its raw result.
    pub async fn execute(&self, method: &str, params: &[Value]) -> Result<Value> {
        self.connection.query(method, params).await
    }

    /// Queue `method` for the next [`GbxClient::execute_multicall`].
    pub fn queue(&self, method: &str, params: Vec<Value>) -> Slot<Value> {
        self.multicall.add_call(method, params)
    }

    /// Queue `method`; its result is passed through `decode` on flush.
    pub fn queue_with<T, F>(&self, method: &str, params: Vec<Value>, decode: F) -> Slot<T>
    where
        T: Send + 'static,
        F: FnOnce(Value) -> Result<T> + Send + 'static,
    {
        self.multicall.add_call_with(method, params, decode)
    }

    /// Number of calls waiting for the next multicall.
    pub fn queued_calls(&self) -> usize {
        self.multicall.len()
    }

    /// Send every queued call as one `system.multicall`.
    ///
    /// An empty queue sends nothing and yields empty results.
    pub async fn execute_multicall(&self) -> Result<MulticallResults> {
        self.multicall.execute(&self.connection).await
    }

    /// Drain every callback received so far, oldest first.
    pub fn get_callbacks(&self) -> Vec<CallbackEnvelope> {
        self.connection.get_callbacks()
    }

    pub fn set_timeouts(&self, read: Duration, write: Duration) {
        self.connection.set_timeouts(read, write);
    }

    /// Current `(read, write)` timeouts.
    pub fn timeouts(&self) -> (Duration, Duration) {
        self.connection.timeouts()
    }

    /// Time since the server last sent anything.
    pub fn idle_time(&self) -> Duration {
        self.connection.idle_time()
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    /// Close the connection. Pending calls fail with `ConnectionClosed`.
    pub fn close(&self) {
        self.connection.close();
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub(crate) fn check_level(&self, method: &str, required: AuthLevel) {
        self.auth.check(method, required);
    }
}
