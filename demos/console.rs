//! Admin console - example of a small server controller.
//!
//! This example demonstrates:
//! - Connecting with `GbxClient::builder()` and authenticating
//! - Immediate typed calls and a batched multicall
//! - Fanning callbacks out with a `Dispatcher` on a fixed tick
//!
//! # Running against a local dedicated server
//!
//! ```text
//! GBX_HOST=127.0.0.1 GBX_PORT=5000 GBX_PASSWORD=SuperAdmin \
//!     RUST_LOG=gbxremote_client=debug cargo run --example console
//! ```

use std::time::Duration;

use gbxremote_client::dispatch::{Callback, Dispatcher, PLAYER_CHAT, PLAYER_CONNECT, TIMER_ONE_MINUTE};
use gbxremote_client::{methods, GbxClient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let host = std::env::var("GBX_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("GBX_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5000);
    let password = std::env::var("GBX_PASSWORD").unwrap_or_else(|_| "SuperAdmin".to_string());

    let client = GbxClient::builder()
        .host(host)
        .port(port)
        .credentials("SuperAdmin", password)
        .api_version("2013-04-16")
        .enable_callbacks(true)
        .connect()
        .await?;

    let version = methods::get_version().call(&client).await?;
    tracing::info!("Connected to {} {} ({})", version.name, version.version, version.build);

    // One round trip for the whole overview.
    let name = methods::get_server_name().queue(&client);
    let status = methods::get_status().queue(&client);
    let players = methods::get_player_list(100, 0).queue(&client);
    let map = methods::get_current_map_info().queue(&client);
    let mut overview = client.execute_multicall().await?;

    tracing::info!("Server: {}", overview.take(name)?);
    tracing::info!("Status: {}", overview.take(status)?.name);
    match overview.take(map) {
        Ok(map) => tracing::info!("Map: {} by {}", map.name, map.author),
        Err(e) => tracing::warn!("No current map: {}", e),
    }
    for player in overview.take(players)? {
        tracing::info!("  {} ({})", player.nick_name, player.login);
    }

    let mut dispatcher = Dispatcher::new();
    dispatcher.on(PLAYER_CONNECT, |cb| {
        if let Ok(Callback::PlayerConnect { login, .. }) = Callback::parse(cb) {
            tracing::info!("{} joined", login);
        }
    });
    dispatcher.on(PLAYER_CHAT, |cb| {
        if let Ok(Callback::PlayerChat { login, text, .. }) = Callback::parse(cb) {
            tracing::info!("[{}] {}", login, text);
        }
    });
    dispatcher.on(TIMER_ONE_MINUTE, |_| tracing::info!("Still running"));

    let mut tick = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = tick.tick() => {
                dispatcher.tick(&client);
                if client.is_closed() {
                    tracing::warn!("Connection lost");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                client.close();
                break;
            }
        }
    }

    Ok(())
}
