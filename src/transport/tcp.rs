//! TCP connect and GBXRemote handshake.
//!
//! # Example
//!
//! ```ignore
//! use gbxremote_client::transport::{connect, read_handshake};
//! use std::time::Duration;
//!
//! let mut stream = connect("127.0.0.1", 5000, Duration::from_secs(5)).await?;
//! read_handshake(&mut stream, Duration::from_secs(5)).await?;
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;

use crate::error::{GbxError, Result};
use crate::protocol::{validate_handshake, MAX_HANDSHAKE_SIZE};

/// Open a TCP connection, bounded by `timeout`.
pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    if host.is_empty() {
        return Err(GbxError::InvalidArgument("host must not be empty".to_string()));
    }

    let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| GbxError::Timeout(format!("connecting to {}:{}", host, port)))??;

    stream.set_nodelay(true)?;
    tracing::debug!("TCP connection to {}:{} established", host, port);
    Ok(stream)
}

/// Read the server handshake and check its signature.
///
/// # Errors
///
/// - `ProtocolMismatch` if the signature is not `GBXRemote 2`
/// - `Timeout` if the handshake does not arrive within `timeout`
/// - `ConnectionClosed` if the server hangs up first
pub async fn read_handshake<R>(reader: &mut R, timeout: Duration) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    tokio::time::timeout(timeout, read_signature(reader))
        .await
        .map_err(|_| GbxError::Timeout("waiting for handshake".to_string()))?
}

async fn read_signature<R>(reader: &mut R) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    read_exact_or_closed(reader, &mut len_buf).await?;
    let length = u32::from_le_bytes(len_buf);

    if length > MAX_HANDSHAKE_SIZE {
        return validate_handshake(length, &[]);
    }

    let mut signature = vec![0u8; length as usize];
    read_exact_or_closed(reader, &mut signature).await?;
    validate_handshake(length, &signature)?;

    tracing::debug!("Handshake OK: {}", String::from_utf8_lossy(&signature));
    Ok(())
}

async fn read_exact_or_closed<R>(reader: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(GbxError::ConnectionClosed),
        Err(e) => Err(GbxError::Io(e)),
    }
}
