//! Codec module - XML-RPC values and documents.
//!
//! - [`Value`] - the XML-RPC value model
//! - [`XmlRpcCodec`] - `methodCall` / `methodResponse` / `fault` documents
//!
//! Codecs are marker structs with static methods, so call sites read
//! `XmlRpcCodec::encode_call(..)` and no codec object is threaded around.

mod value;
mod xmlrpc;

pub use value::{StructMap, Value};
pub use xmlrpc::{fault_from_value, fault_value, XmlRpcCodec};
