//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the GBXRemote 2 framing layer:
//! - Handshake signature check
//! - 8-byte header encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Frame struct with typed accessors

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_frame, build_handshake, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    is_callback_handle, next_request_handle, validate_handshake, Header,
    DEFAULT_MAX_PAYLOAD_SIZE, FIRST_REQUEST_HANDLE, HANDSHAKE_SIGNATURE, HEADER_SIZE,
    MAX_HANDSHAKE_SIZE, MAX_REQUEST_SIZE, REQUEST_HANDLE_BIT,
};
