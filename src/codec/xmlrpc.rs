//! XML-RPC document codec using `xml-rs`.
//!
//! Handles the three document shapes GBXRemote uses:
//! - `<methodCall>`: outgoing requests and incoming callbacks
//! - `<methodResponse><params>`: successful replies
//! - `<methodResponse><fault>`: per-call errors, decoded to [`GbxError::Fault`]
//!
//! # Example
//!
//! ```
//! use gbxremote_client::codec::{Value, XmlRpcCodec};
//!
//! let call = XmlRpcCodec::encode_call("Kick", &[Value::from("login")]).unwrap();
//! let (method, params) = XmlRpcCodec::decode_call(&call).unwrap();
//! assert_eq!(method, "Kick");
//! assert_eq!(params, vec![Value::from("login")]);
//! ```

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use xml::escape::escape_str_pcdata;
use xml::reader::XmlEvent as ReaderEvent;
use xml::writer::{EmitterConfig, EventWriter, XmlEvent as WriterEvent};

use super::value::{StructMap, Value};
use crate::error::{GbxError, Result};

/// Codec for XML-RPC documents.
pub struct XmlRpcCodec;

impl XmlRpcCodec {
    /// Encode a `<methodCall>` document.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty method name, a non-finite double, or
    /// text holding a character XML 1.0 cannot carry.
    pub fn encode_call(method: &str, params: &[Value]) -> Result<Vec<u8>> {
        if method.is_empty() {
            return Err(GbxError::InvalidArgument(
                "method name must not be empty".to_string(),
            ));
        }

        let mut doc = DocumentWriter::new();
        doc.start("methodCall")?;
        doc.leaf("methodName", method)?;
        doc.start("params")?;
        for param in params {
            doc.start("param")?;
            doc.value(param)?;
            doc.end()?;
        }
        doc.end()?;
        doc.end()?;
        Ok(doc.finish())
    }

    /// Encode a successful `<methodResponse>` document.
    pub fn encode_response(value: &Value) -> Result<Vec<u8>> {
        let mut doc = DocumentWriter::new();
        doc.start("methodResponse")?;
        doc.start("params")?;
        doc.start("param")?;
        doc.value(value)?;
        doc.end()?;
        doc.end()?;
        doc.end()?;
        Ok(doc.finish())
    }

    /// Encode a `<fault>` response document.
    pub fn encode_fault(code: i32, message: &str) -> Result<Vec<u8>> {
        let mut doc = DocumentWriter::new();
        doc.start("methodResponse")?;
        doc.start("fault")?;
        doc.value(&fault_value(code, message))?;
        doc.end()?;
        doc.end()?;
        Ok(doc.finish())
    }

    /// Decode a `<methodCall>` document into its method name and parameters.
    pub fn decode_call(bytes: &[u8]) -> Result<(String, Vec<Value>)> {
        let root = parse_document(bytes)?;
        root.expect_name("methodCall")?;

        let method = root.child("methodName")?.text.trim().to_string();
        if method.is_empty() {
            return Err(GbxError::Protocol("methodCall without methodName".to_string()));
        }

        let params = match root.find("params") {
            Some(params) => decode_params(params)?,
            None => Vec::new(),
        };

        Ok((method, params))
    }

    /// Decode a `<methodResponse>` document.
    ///
    /// # Errors
    ///
    /// [`GbxError::Fault`] if the document is a fault, `Protocol` if it is
    /// malformed.
    pub fn decode_response(bytes: &[u8]) -> Result<Value> {
        let root = parse_document(bytes)?;
        root.expect_name("methodResponse")?;

        if let Some(fault) = root.find("fault") {
            let value = decode_value(fault.child("value")?)?;
            return Err(fault_from_value(&value).unwrap_or_else(|| {
                GbxError::Protocol(format!("malformed fault: {}", value))
            }));
        }

        let mut params = decode_params(root.child("params")?)?;
        if params.len() != 1 {
            return Err(GbxError::Protocol(format!(
                "methodResponse carries {} params, expected 1",
                params.len()
            )));
        }
        Ok(params.remove(0))
    }
}

/// Build the `{faultCode, faultString}` struct used by faults and multicall slots.
pub fn fault_value(code: i32, message: &str) -> Value {
    Value::structure([
        ("faultCode", Value::Int(code)),
        ("faultString", Value::from(message)),
    ])
}

/// Read a `{faultCode, faultString}` struct, if `value` is one.
pub fn fault_from_value(value: &Value) -> Option<GbxError> {
    let code = value.get("faultCode")?.as_i32()?;
    let message = value
        .get("faultString")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(GbxError::Fault { code, message })
}

fn xml_error(e: impl std::fmt::Display) -> GbxError {
    GbxError::Protocol(format!("XML error: {}", e))
}

/// Thin wrapper over `EventWriter` that writes XML-RPC elements.
struct DocumentWriter {
    writer: EventWriter<Vec<u8>>,
}

impl DocumentWriter {
    fn new() -> Self {
        let writer = EmitterConfig::new()
            .perform_indent(false)
            .normalize_empty_elements(false)
            .create_writer(Vec::new());
        Self { writer }
    }

    fn start(&mut self, name: &str) -> Result<()> {
        self.writer
            .write(WriterEvent::start_element(name))
            .map_err(xml_error)
    }

    fn end(&mut self) -> Result<()> {
        self.writer
            .write(WriterEvent::end_element())
            .map_err(xml_error)
    }

    fn leaf(&mut self, name: &str, text: &str) -> Result<()> {
        self.start(name)?;
        if !text.is_empty() {
            let escaped = escape_text(text)?;
            self.writer
                .write(WriterEvent::raw_characters(&escaped))
                .map_err(xml_error)?;
        }
        self.end()
    }

    fn value(&mut self, value: &Value) -> Result<()> {
        self.start("value")?;
        match value {
            Value::Int(v) => self.leaf("i4", &v.to_string())?,
            Value::Boolean(v) => self.leaf("boolean", if *v { "1" } else { "0" })?,
            Value::String(v) => self.leaf("string", v)?,
            Value::Double(v) => {
                if !v.is_finite() {
                    return Err(GbxError::InvalidArgument(format!(
                        "cannot encode non-finite double {}",
                        v
                    )));
                }
                self.leaf("double", &v.to_string())?
            }
            Value::DateTime(v) => self.leaf("dateTime.iso8601", v)?,
            Value::Base64(v) => self.leaf("base64", &BASE64.encode(v))?,
            Value::Struct(members) => {
                self.start("struct")?;
                for (name, member) in members {
                    self.start("member")?;
                    self.leaf("name", name)?;
                    self.value(member)?;
                    self.end()?;
                }
                self.end()?;
            }
            Value::Array(items) => {
                self.start("array")?;
                self.start("data")?;
                for item in items {
                    self.value(item)?;
                }
                self.end()?;
                self.end()?;
            }
        }
        self.end()
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

/// Escape character data, writing `\r` as a reference so readers do not
/// fold it into `\n`.
fn escape_text(text: &str) -> Result<String> {
    if let Some(c) = text.chars().find(|&c| !is_xml_char(c)) {
        return Err(GbxError::InvalidArgument(format!(
            "U+{:04X} cannot be sent in an XML document",
            c as u32
        )));
    }
    Ok(escape_str_pcdata(text).replace('\r', "&#13;"))
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..)
}

/// Minimal element tree; XML-RPC needs no attributes or mixed content.
#[derive(Debug, Default)]
struct Node {
    name: String,
    children: Vec<Node>,
    text: String,
}

impl Node {
    fn expect_name(&self, name: &str) -> Result<()> {
        if self.name != name {
            return Err(GbxError::Protocol(format!(
                "expected <{}>, found <{}>",
                name, self.name
            )));
        }
        Ok(())
    }

    fn find(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn child(&self, name: &str) -> Result<&Node> {
        self.find(name).ok_or_else(|| {
            GbxError::Protocol(format!("<{}> is missing <{}>", self.name, name))
        })
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn parse_document(bytes: &[u8]) -> Result<Node> {
    let parser = xml::EventReader::new(bytes);
    let mut stack: Vec<Node> = Vec::new();

    for event in parser {
        match event.map_err(xml_error)? {
            ReaderEvent::StartElement { name, .. } => stack.push(Node {
                name: name.local_name,
                ..Node::default()
            }),
            ReaderEvent::EndElement { .. } => {
                let node = stack
                    .pop()
                    .ok_or_else(|| GbxError::Protocol("unbalanced document".to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Ok(node),
                }
            }
            ReaderEvent::Characters(text)
            | ReaderEvent::Whitespace(text)
            | ReaderEvent::CData(text) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            _ => {}
        }
    }

    Err(GbxError::Protocol("document has no root element".to_string()))
}

fn decode_params(params: &Node) -> Result<Vec<Value>> {
    params
        .children_named("param")
        .map(|param| decode_value(param.child("value")?))
        .collect()
}

fn decode_value(node: &Node) -> Result<Value> {
    // An untyped <value> is a string.
    let Some(typed) = node.children.first() else {
        return Ok(Value::String(node.text.clone()));
    };

    let text = typed.text.as_str();
    let value = match typed.name.as_str() {
        "i4" | "int" => Value::Int(
            text.trim()
                .parse()
                .map_err(|_| GbxError::Protocol(format!("invalid int {:?}", text)))?,
        ),
        "boolean" => match text.trim() {
            "1" | "true" => Value::Boolean(true),
            "0" | "false" => Value::Boolean(false),
            other => {
                return Err(GbxError::Protocol(format!("invalid boolean {:?}", other)))
            }
        },
        "string" => Value::String(text.to_string()),
        "double" => Value::Double(
            text.trim()
                .parse()
                .map_err(|_| GbxError::Protocol(format!("invalid double {:?}", text)))?,
        ),
        "dateTime.iso8601" => Value::DateTime(text.trim().to_string()),
        "base64" => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            Value::Base64(
                BASE64
                    .decode(compact)
                    .map_err(|e| GbxError::Protocol(format!("invalid base64: {}", e)))?,
            )
        }
        "struct" => {
            let mut members = StructMap::new();
            for member in typed.children_named("member") {
                let name = member.child("name")?.text.clone();
                let value = decode_value(member.child("value")?)?;
                members.insert(name, value);
            }
            Value::Struct(members)
        }
        "array" => {
            let data = typed.child("data")?;
            Value::Array(
                data.children_named("value")
                    .map(decode_value)
                    .collect::<Result<_>>()?,
            )
        }
        other => return Err(GbxError::Protocol(format!("unknown value type <{}>", other))),
    };

    Ok(value)
}
