//! # gbxremote-client
//!
//! Async Rust client for the GBXRemote 2 protocol spoken by dedicated game
//! servers on their XML-RPC control port.
//!
//! This crate lets a controller process administer a running server: call
//! remote methods, batch them into multicalls, receive server callbacks and
//! fan them out once per controller tick.
//!
//! ## Architecture
//!
//! - **Transport** (TCP): `GBXRemote 2` handshake, then length-prefixed frames
//! - **Connection**: one reader task and one writer task; responses are matched
//!   to callers by request handle, callbacks are queued
//! - **Facade** ([`GbxClient`]): authentication, immediate and batched calls
//! - **Dispatch**: listeners keyed by callback name, plus `Timer.*` events
//!
//! ## Example
//!
//! ```ignore
//! use gbxremote_client::dispatch::Dispatcher;
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
//!     methods::chat_send_server_message("Controller online").call(&client).await?;
//!
//!     let mut dispatcher = Dispatcher::new();
//!     dispatcher.on("ManiaPlanet.PlayerConnect", |cb| println!("join: {:?}", cb.args));
//!     loop {
//!         dispatcher.tick(&client);
//!         tokio::time::sleep(std::time::Duration::from_millis(100)).await;
//!     }
//! }
//! ```

pub mod auth;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod marshal;
pub mod methods;
pub mod multicall;
pub mod protocol;
pub mod transport;

mod client;
mod connection;
mod writer;

pub use auth::AuthLevel;
pub use client::{ClientBuilder, GbxClient};
pub use codec::Value;
pub use config::ClientConfig;
pub use connection::{CallbackEnvelope, Connection};
pub use error::{GbxError, Result};
pub use methods::RemoteCall;
pub use multicall::{MulticallResults, Slot};
