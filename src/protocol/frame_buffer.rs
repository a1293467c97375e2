//! Reassembly of frames from arbitrary read chunks.
//!
//! Socket reads rarely line up with frame boundaries. [`FrameBuffer`] keeps
//! the unconsumed tail between pushes and remembers a header once it has
//! been read, so the eight header bytes are only parsed once per frame.
//!
//! A header that fails validation leaves the stream unusable: there is no way
//! to find the next frame boundary, so callers must drop the connection.

use bytes::{Buf, BytesMut};

use super::wire_format::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Frame;
use crate::error::Result;

const INITIAL_CAPACITY: usize = 64 * 1024;

/// Accumulates incoming bytes and yields complete frames.
pub struct FrameBuffer {
    pending: BytesMut,
    /// Header of the frame whose payload is still arriving.
    header: Option<Header>,
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Buffer accepting payloads up to the default 16 MiB.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            pending: BytesMut::with_capacity(INITIAL_CAPACITY),
            header: None,
            max_payload_size,
        }
    }

    /// Append `data` and return every frame it completes, in arrival order.
    ///
    /// # Errors
    ///
    /// `Protocol` when a header announces an empty or oversized payload.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.pending.extend_from_slice(data);

        let mut complete = Vec::new();
        loop {
            let header = match self.header {
                Some(header) => header,
                None => match Header::decode(&self.pending) {
                    Some(header) => {
                        header.validate(self.max_payload_size)?;
                        self.pending.advance(HEADER_SIZE);
                        self.header = Some(header);
                        header
                    }
                    None => break,
                },
            };

            let wanted = header.payload_length as usize;
            if self.pending.len() < wanted {
                break;
            }

            let payload = self.pending.split_to(wanted).freeze();
            self.header = None;
            complete.push(Frame::new(header, payload));
        }

        Ok(complete)
    }

    /// True while a frame has started arriving but is not complete yet.
    pub fn has_partial_frame(&self) -> bool {
        self.header.is_some() || !self.pending.is_empty()
    }

    /// Buffered bytes not yet returned in a frame.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop buffered bytes and any half-read frame.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.header = None;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GbxError;
    use crate::protocol::build_frame;

    fn feed(buffer: &mut FrameBuffer, chunks: &[&[u8]]) -> Vec<Frame> {
        chunks
            .iter()
            .flat_map(|chunk| buffer.push(chunk).unwrap())
            .collect()
    }

    #[test]
    fn test_response_and_callback_in_one_read() {
        let mut wire = build_frame(0x8000_0000, b"<methodResponse/>");
        wire.extend(build_frame(0x0000_0001, b"<methodCall/>"));

        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&wire).unwrap();

        assert_eq!(frames.len(), 2);
        assert!(!frames[0].is_callback());
        assert!(frames[1].is_callback());
        assert_eq!(frames[1].payload(), b"<methodCall/>");
        assert!(!buffer.has_partial_frame());
    }

    #[test]
    fn test_split_inside_header() {
        let wire = build_frame(0x8000_0010, b"abc");
        let mut buffer = FrameBuffer::new();

        assert!(buffer.push(&wire[..3]).unwrap().is_empty());
        assert!(buffer.has_partial_frame());

        let frames = buffer.push(&wire[3..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].handle(), 0x8000_0010);
    }

    #[test]
    fn test_header_alone_leaves_partial_frame() {
        let wire = build_frame(0x8000_0042, b"xyz");
        let mut buffer = FrameBuffer::new();

        assert!(buffer.push(&wire[..HEADER_SIZE]).unwrap().is_empty());
        assert!(buffer.is_empty());
        assert!(buffer.has_partial_frame());

        let frames = buffer.push(&wire[HEADER_SIZE..]).unwrap();
        assert_eq!(frames[0].payload(), b"xyz");
    }

    #[test]
    fn test_trickled_bytes() {
        let payload = "Électricité ☺".as_bytes();
        let wire = build_frame(9, payload);
        let chunks: Vec<&[u8]> = wire.chunks(1).collect();

        let mut buffer = FrameBuffer::new();
        let frames = feed(&mut buffer, &chunks);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), payload);
    }

    #[test]
    fn test_tail_of_next_frame_is_kept() {
        let first = build_frame(0x8000_0001, b"one");
        let second = build_frame(0x8000_0002, b"two");
        let mut wire = first.clone();
        wire.extend_from_slice(&second[..5]);

        let mut buffer = FrameBuffer::new();
        assert_eq!(buffer.push(&wire).unwrap().len(), 1);
        assert_eq!(buffer.len(), 5);

        let frames = buffer.push(&second[5..]).unwrap();
        assert_eq!(frames[0].handle(), 0x8000_0002);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_length_frame_is_protocol_error() {
        let mut buffer = FrameBuffer::new();
        assert!(matches!(
            buffer.push(&build_frame(0x8000_0001, b"")),
            Err(GbxError::Protocol(_))
        ));
    }

    #[test]
    fn test_oversized_frame_rejected_from_header() {
        let mut buffer = FrameBuffer::with_max_payload(100);
        let err = buffer.push(&Header::new(101, 0x8000_0001).encode()).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_clear_forgets_half_read_frame() {
        let wire = build_frame(0x8000_0001, b"test");
        let mut buffer = FrameBuffer::new();
        buffer.push(&wire[..HEADER_SIZE + 1]).unwrap();

        buffer.clear();
        assert!(!buffer.has_partial_frame());

        let frames = buffer.push(&build_frame(4, b"ok")).unwrap();
        assert_eq!(frames[0].handle(), 4);
    }
}
