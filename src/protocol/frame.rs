//! Frame struct with typed accessors.
//!
//! Represents a complete protocol frame with header and payload.
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use gbxremote_client::protocol::{Frame, Header};
//! use bytes::Bytes;
//!
//! let header = Header::new(5, 0x8000_0000);
//! let frame = Frame::new(header, Bytes::from_static(b"<a/>!"));
//!
//! assert_eq!(frame.handle(), 0x8000_0000);
//! assert!(!frame.is_callback());
//! ```

use bytes::Bytes;

use super::wire_format::{Header, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (an XML-RPC document).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the handle.
    #[inline]
    pub fn handle(&self) -> u32 {
        self.header.handle
    }

    /// Check if this frame is a server push.
    #[inline]
    pub fn is_callback(&self) -> bool {
        self.header.is_callback()
    }
}

/// Build a complete frame as a single byte vector.
///
/// # Example
///
/// ```
/// use gbxremote_client::protocol::build_frame;
///
/// let bytes = build_frame(0x8000_0001, b"hello");
/// assert_eq!(bytes.len(), 8 + 5);
/// ```
pub fn build_frame(handle: u32, payload: &[u8]) -> Vec<u8> {
    let header = Header::new(payload.len() as u32, handle);
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}

/// Build the handshake bytes a server sends on accept.
pub fn build_handshake(signature: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + signature.len());
    buf.extend_from_slice(&(signature.len() as u32).to_le_bytes());
    buf.extend_from_slice(signature);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HANDSHAKE_SIGNATURE;

    #[test]
    fn test_frame_accessors() {
        let frame = Frame::new(Header::new(2, 7), Bytes::from_static(b"hi"));

        assert_eq!(frame.handle(), 7);
        assert_eq!(frame.payload(), b"hi");
        assert!(frame.is_callback());
    }

    #[test]
    fn test_build_frame() {
        let bytes = build_frame(0x8000_002A, b"hello");

        assert_eq!(bytes.len(), HEADER_SIZE + 5);
        let parsed = Header::decode(&bytes[..HEADER_SIZE]).unwrap();
        assert_eq!(parsed, Header::new(5, 0x8000_002A));
        assert_eq!(&bytes[HEADER_SIZE..], b"hello");
    }

    #[test]
    fn test_build_handshake() {
        let bytes = build_handshake(HANDSHAKE_SIGNATURE);
        assert_eq!(&bytes[..4], &[11, 0, 0, 0]);
        assert_eq!(&bytes[4..], b"GBXRemote 2");
    }

    #[test]
    fn test_build_frame_roundtrip() {
        use super::super::FrameBuffer;

        let bytes = build_frame(0x8000_0456, b"0123456789");

        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].handle(), 0x8000_0456);
        assert_eq!(frames[0].payload(), b"0123456789");
    }
}
