//! Wire format encoding and decoding.
//!
//! Every frame after the handshake starts with an 8-byte header:
//! ```text
//! ┌──────────┬──────────┐
//! │ Length   │ Handle   │
//! │ 4 bytes  │ 4 bytes  │
//! │ uint32 LE│ uint32 LE│
//! └──────────┴──────────┘
//! ```
//!
//! `Length` counts payload bytes only. Request handles have the high bit set and
//! are echoed back on the response; a handle with the high bit clear marks a
//! server push (callback).
//!
//! The handshake itself is a 4-byte little-endian length followed by the
//! protocol signature.

use crate::error::{GbxError, Result};

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Signature the server sends right after accepting the connection.
pub const HANDSHAKE_SIGNATURE: &[u8] = b"GBXRemote 2";

/// Largest handshake payload we are willing to read.
pub const MAX_HANDSHAKE_SIZE: u32 = 64;

/// First request handle; also the value handles wrap back to.
pub const FIRST_REQUEST_HANDLE: u32 = 0x8000_0000;

/// Bit distinguishing client request handles from callback handles.
pub const REQUEST_HANDLE_BIT: u32 = 0x8000_0000;

/// Largest request the server accepts (4 MB).
pub const MAX_REQUEST_SIZE: u32 = 4 * 1024 * 1024;

/// Default maximum response payload size (16 MB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Payload length in bytes.
    pub payload_length: u32,
    /// Request handle, or a callback handle (high bit clear).
    pub handle: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(payload_length: u32, handle: u32) -> Self {
        Self {
            payload_length,
            handle,
        }
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use gbxremote_client::protocol::Header;
    ///
    /// let header = Header::new(100, 0x8000_0001);
    /// let bytes = header.encode();
    /// assert_eq!(bytes, [100, 0, 0, 0, 1, 0, 0, 0x80]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (8 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..4].copy_from_slice(&self.payload_length.to_le_bytes());
        buf[4..8].copy_from_slice(&self.handle.to_le_bytes());
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            payload_length: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            handle: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    /// Validate an inbound header.
    ///
    /// Checks:
    /// - Payload is not empty (every frame carries an XML document)
    /// - Payload length doesn't exceed max
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length == 0 {
            return Err(GbxError::Protocol(format!(
                "Empty frame for handle {:#010x}",
                self.handle
            )));
        }

        if self.payload_length > max_payload_size {
            return Err(GbxError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }

        Ok(())
    }

    /// Check if this frame is a server push rather than a response.
    #[inline]
    pub fn is_callback(&self) -> bool {
        is_callback_handle(self.handle)
    }
}

/// Check if a handle belongs to a server push.
#[inline]
pub fn is_callback_handle(handle: u32) -> bool {
    handle & REQUEST_HANDLE_BIT == 0
}

/// Handle following `handle`, wrapping back to [`FIRST_REQUEST_HANDLE`].
#[inline]
pub fn next_request_handle(handle: u32) -> u32 {
    if handle == u32::MAX {
        FIRST_REQUEST_HANDLE
    } else {
        (handle + 1) | REQUEST_HANDLE_BIT
    }
}

/// Check a handshake payload against the expected signature.
pub fn validate_handshake(length: u32, signature: &[u8]) -> Result<()> {
    if length > MAX_HANDSHAKE_SIZE {
        return Err(GbxError::ProtocolMismatch(format!(
            "handshake length {} exceeds {}",
            length, MAX_HANDSHAKE_SIZE
        )));
    }

    if signature != HANDSHAKE_SIGNATURE {
        return Err(GbxError::ProtocolMismatch(format!(
            "unexpected signature {:?}",
            String::from_utf8_lossy(signature)
        )));
    }

    Ok(())
}
