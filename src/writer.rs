//! Dedicated writer task for frame sending.
//!
//! All outbound frames go through one task fed by an mpsc channel, so frames
//! from concurrent callers are written whole and never interleave on the socket.
//!
//! ```text
//! Caller 1 ─┐
//! Caller 2 ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► TCP write half
//! Caller N ─┘
//! ```
//!
//! Frames that are already queued when the task wakes up are coalesced into a
//! single write.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Timeouts;
use crate::error::{GbxError, Result};
use crate::protocol::{Header, HEADER_SIZE};

/// Maximum frames to coalesce in a single write.
const MAX_BATCH_SIZE: usize = 32;

/// A frame ready to be written.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded header (8 bytes).
    pub header: [u8; HEADER_SIZE],
    /// XML payload.
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Create a new outbound frame for `handle`.
    #[inline]
    pub fn new(handle: u32, payload: Bytes) -> Self {
        Self {
            header: Header::new(payload.len() as u32, handle).encode(),
            payload,
        }
    }

    /// Total size of this frame (header + payload).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Handle for sending frames to the writer task.
///
/// Cheaply cloneable.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame for writing.
    ///
    /// Fails with `ConnectionClosed` once the writer task has stopped.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| GbxError::ConnectionClosed)
    }

    /// Check if the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// `on_error` runs once if a write fails or times out; the task then stops and
/// every later `send` fails with `ConnectionClosed`.
pub fn spawn_writer_task<W, F>(
    writer: W,
    channel_capacity: usize,
    timeouts: Arc<Timeouts>,
    on_error: F,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
    F: FnOnce(&GbxError) + Send + 'static,
{
    let (tx, rx) = mpsc::channel(channel_capacity.max(1));

    let task = tokio::spawn(async move {
        let result = writer_loop(rx, writer, timeouts).await;
        if let Err(e) = &result {
            tracing::error!("Writer task failed: {}", e);
            on_error(e);
        }
        result
    });

    (WriterHandle { tx }, task)
}

async fn writer_loop<W>(
    mut rx: mpsc::Receiver<OutboundFrame>,
    mut writer: W,
    timeouts: Arc<Timeouts>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(16 * 1024);

    loop {
        let Some(first) = rx.recv().await else {
            // All handles dropped, clean shutdown.
            let _ = writer.shutdown().await;
            return Ok(());
        };

        buf.clear();
        append_frame(&mut buf, &first);

        let mut count = 1;
        while count < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => {
                    append_frame(&mut buf, &frame);
                    count += 1;
                }
                Err(_) => break,
            }
        }

        let limit = timeouts.write();
        tokio::time::timeout(limit, write_buffer(&mut writer, &buf))
            .await
            .map_err(|_| {
                GbxError::Timeout(format!("writing {} frame(s) took over {:?}", count, limit))
            })??;

        tracing::trace!("Wrote {} frame(s), {} bytes", count, buf.len());
    }
}

fn append_frame(buf: &mut BytesMut, frame: &OutboundFrame) {
    buf.reserve(frame.size());
    buf.extend_from_slice(&frame.header);
    buf.extend_from_slice(&frame.payload);
}

async fn write_buffer<W>(writer: &mut W, buf: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(buf).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameBuffer;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt};

    fn timeouts() -> Arc<Timeouts> {
        Arc::new(Timeouts::default())
    }

    #[test]
    fn test_outbound_frame_creation() {
        let frame = OutboundFrame::new(0x8000_0001, Bytes::from_static(b"hello"));

        assert_eq!(frame.size(), HEADER_SIZE + 5);
        assert_eq!(
            Header::decode(&frame.header),
            Some(Header::new(5, 0x8000_0001))
        );
    }

    #[tokio::test]
    async fn test_writer_handle_send() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, 16, timeouts(), |_| {});

        let frame = OutboundFrame::new(0x8000_0001, Bytes::from_static(b"hello"));
        handle.send(frame).await.unwrap();

        let mut buf = vec![0u8; HEADER_SIZE + 5];
        server.read_exact(&mut buf).await.unwrap();

        let frames = FrameBuffer::new().push(&buf).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"hello");
    }

    #[tokio::test]
    async fn test_concurrent_senders_do_not_interleave() {
        let (client, mut server) = duplex(64 * 1024);
        let (handle, _task) = spawn_writer_task(client, 4, timeouts(), |_| {});

        let mut joins = Vec::new();
        for i in 0..8u32 {
            let handle = handle.clone();
            joins.push(tokio::spawn(async move {
                let payload = Bytes::from(vec![b'a' + i as u8; 300]);
                handle
                    .send(OutboundFrame::new(0x8000_0000 + i, payload))
                    .await
            }));
        }
        for join in joins {
            join.await.unwrap().unwrap();
        }

        let mut buf = vec![0u8; 8 * (HEADER_SIZE + 300)];
        server.read_exact(&mut buf).await.unwrap();

        let frames = FrameBuffer::new().push(&buf).unwrap();
        assert_eq!(frames.len(), 8);
        for frame in frames {
            let expected = b'a' + (frame.handle() - 0x8000_0000) as u8;
            assert!(frame.payload().iter().all(|&b| b == expected));
        }
    }

    #[tokio::test]
    async fn test_write_timeout_reports_error() {
        // A 16-byte pipe nobody reads from stalls the write.
        let (client, _server) = duplex(16);
        let timeouts = Arc::new(Timeouts::new(
            Duration::from_secs(1),
            Duration::from_millis(20),
        ));
        let failed = Arc::new(AtomicBool::new(false));
        let flag = failed.clone();
        let (handle, task) = spawn_writer_task(client, 4, timeouts, move |_| {
            flag.store(true, Ordering::SeqCst);
        });

        let frame = OutboundFrame::new(0x8000_0001, Bytes::from(vec![0u8; 1024]));
        handle.send(frame).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(GbxError::Timeout(_))));
        assert!(failed.load(Ordering::SeqCst));
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (client, _server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client, 4, timeouts(), |_| {});

        drop(handle);

        let result = task.await.unwrap();
        assert!(result.is_ok());
    }
}
