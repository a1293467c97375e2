//! Client-side batching of calls into one `system.multicall` round trip.
//!
//! Calls are queued with [`Multicall::add_call`] (no I/O), each returning a
//! typed [`Slot`]. [`Multicall::execute`] takes the whole queue in one step,
//! sends a single frame and returns [`MulticallResults`], read back through the
//! slots. A fault in one slot does not affect its siblings.
//!
//! # Example
//!
//! ```ignore
//! let multicall = Multicall::new();
//! let name = multicall.add_call("GetServerName", vec![]);
//! let max = multicall.add_call_with("GetMaxPlayers", vec![], |v| {
//!     Fields::new("CurrentNextValue", v)?.required::<i32>("CurrentValue")
//! });
//!
//! let mut results = multicall.execute(&connection).await?;
//! println!("{}: {} slots", results.take(name)?, results.take(max)?);
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError};

use crate::codec::{fault_from_value, Value, XmlRpcCodec};
use crate::connection::Connection;
use crate::error::{GbxError, Result};

/// Method name of the batched call.
pub const MULTICALL_METHOD: &str = "system.multicall";

type Decoded = Box<dyn Any + Send>;

/// Post-processing applied to one successful result.
type Transformer = Box<dyn FnOnce(Value) -> Result<Decoded> + Send>;

struct QueuedCall {
    method: String,
    params: Vec<Value>,
    transform: Transformer,
}

/// Position of a queued call inside one batch.
///
/// Only valid for the [`MulticallResults`] of the batch it was issued for.
pub struct Slot<T> {
    batch: u64,
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Slot<T> {
    /// Position in enqueue order.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Slot<T> {}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("batch", &self.batch)
            .field("index", &self.index)
            .finish()
    }
}

/// Ordered queue of calls plus the generation they will be flushed under.
#[derive(Default)]
pub struct MulticallBatch {
    generation: u64,
    calls: Vec<QueuedCall>,
}

impl MulticallBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a call whose raw value is returned as-is.
    pub fn add_call(&mut self, method: &str, params: Vec<Value>) -> Slot<Value> {
        self.add_call_with(method, params, Ok)
    }

    /// Queue a call whose successful value is passed through `transform`.
    pub fn add_call_with<T, F>(&mut self, method: &str, params: Vec<Value>, transform: F) -> Slot<T>
    where
        T: Send + 'static,
        F: FnOnce(Value) -> Result<T> + Send + 'static,
    {
        let index = self.calls.len();
        self.calls.push(QueuedCall {
            method: method.to_string(),
            params,
            transform: Box::new(move |value| transform(value).map(|v| Box::new(v) as Decoded)),
        });
        Slot {
            batch: self.generation,
            index,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Take every queued call and move on to the next generation.
    fn take(&mut self) -> (u64, Vec<QueuedCall>) {
        let generation = self.generation;
        self.generation += 1;
        (generation, std::mem::take(&mut self.calls))
    }
}

/// Per-call outcomes of one flushed batch, in enqueue order.
pub struct MulticallResults {
    batch: u64,
    slots: Vec<Option<Result<Decoded>>>,
}

impl MulticallResults {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Take the result stored in `slot`.
    ///
    /// # Errors
    ///
    /// The call's own error (usually a `Fault`), or `InvalidArgument` if the
    /// slot belongs to another batch or was already taken.
    pub fn take<T: 'static>(&mut self, slot: Slot<T>) -> Result<T> {
        if slot.batch != self.batch {
            return Err(GbxError::InvalidArgument(format!(
                "slot from batch {} used on results of batch {}",
                slot.batch, self.batch
            )));
        }

        let entry = self
            .slots
            .get_mut(slot.index)
            .and_then(Option::take)
            .ok_or_else(|| {
                GbxError::InvalidArgument(format!("slot {} already taken", slot.index))
            })?;

        entry?.downcast::<T>().map(|v| *v).map_err(|_| {
            GbxError::InvalidArgument(format!("slot {} holds another type", slot.index))
        })
    }

    /// Check if the call at `index` ended with an error.
    pub fn is_error(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(Err(_))))
    }

    /// Errors still held, with their positions.
    pub fn errors(&self) -> impl Iterator<Item = (usize, &GbxError)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| match slot {
                Some(Err(e)) => Some((i, e)),
                _ => None,
            })
    }
}

/// Shared multicall queue with a single flush in flight at a time.
#[derive(Default)]
pub struct Multicall {
    queue: Mutex<MulticallBatch>,
    flush: tokio::sync::Mutex<()>,
}

impl Multicall {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw call. No I/O happens until [`Multicall::execute`].
    pub fn add_call(&self, method: &str, params: Vec<Value>) -> Slot<Value> {
        self.with_queue(|batch| batch.add_call(method, params))
    }

    /// Queue a call with a transformer for its successful value.
    pub fn add_call_with<T, F>(&self, method: &str, params: Vec<Value>, transform: F) -> Slot<T>
    where
        T: Send + 'static,
        F: FnOnce(Value) -> Result<T> + Send + 'static,
    {
        self.with_queue(|batch| batch.add_call_with(method, params, transform))
    }

    /// Number of queued calls.
    pub fn len(&self) -> usize {
        self.with_queue(|batch| batch.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_queue<R>(&self, f: impl FnOnce(&mut MulticallBatch) -> R) -> R {
        let mut batch = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut batch)
    }

    /// Flush the queue as one request.
    ///
    /// The queue is emptied when the flush starts, whatever its outcome. Calls
    /// queued meanwhile go into the next batch.
    pub async fn execute(&self, connection: &Connection) -> Result<MulticallResults> {
        let _flush = self.flush.lock().await;
        let (batch, calls) = self.with_queue(MulticallBatch::take);

        if calls.is_empty() {
            return Ok(MulticallResults {
                batch,
                slots: Vec::new(),
            });
        }

        let mut requests = Vec::with_capacity(calls.len());
        let mut transforms = Vec::with_capacity(calls.len());
        for call in calls {
            requests.push((call.method, call.params));
            transforms.push(call.transform);
        }

        tracing::debug!("Flushing multicall batch {} ({} calls)", batch, requests.len());
        let raw = multiquery(connection, requests).await?;

        let slots = raw
            .into_iter()
            .zip(transforms)
            .map(|(result, transform)| Some(result.and_then(transform)))
            .collect();

        Ok(MulticallResults { batch, slots })
    }
}

/// Send `calls` as one `system.multicall` and split the reply per call.
pub async fn multiquery(
    connection: &Connection,
    calls: Vec<(String, Vec<Value>)>,
) -> Result<Vec<Result<Value>>> {
    let expected = calls.len();
    let payload = encode_multicall(calls)?;
    let response = connection.round_trip(MULTICALL_METHOD, payload).await?;
    decode_multicall(response, expected)
}

/// Encode the `system.multicall` request document.
pub fn encode_multicall(calls: Vec<(String, Vec<Value>)>) -> Result<Vec<u8>> {
    let entries = calls
        .into_iter()
        .map(|(method, params)| {
            if method == MULTICALL_METHOD {
                return Err(GbxError::InvalidArgument(
                    "system.multicall cannot be nested".to_string(),
                ));
            }
            Ok(Value::structure([
                ("methodName", Value::String(method)),
                ("params", Value::Array(params)),
            ]))
        })
        .collect::<Result<Vec<_>>>()?;

    XmlRpcCodec::encode_call(MULTICALL_METHOD, &[Value::Array(entries)])
}

/// Split a `system.multicall` reply into per-call results.
///
/// Each entry is either a one-element array holding the value, or a
/// `{faultCode, faultString}` struct.
pub fn decode_multicall(response: Value, expected: usize) -> Result<Vec<Result<Value>>> {
    let Value::Array(entries) = response else {
        return Err(GbxError::Protocol(format!(
            "system.multicall returned {}, expected array",
            response.type_name()
        )));
    };

    if entries.len() != expected {
        return Err(GbxError::Protocol(format!(
            "system.multicall returned {} results for {} calls",
            entries.len(),
            expected
        )));
    }

    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| match entry {
            Value::Array(mut wrapped) if wrapped.len() == 1 => Ok(wrapped.remove(0)),
            other => Err(fault_from_value(&other).unwrap_or_else(|| {
                GbxError::marshal(
                    format!("{}[{}]", MULTICALL_METHOD, i),
                    format!("unexpected {} entry", other.type_name()),
                )
            })),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::fault_value;

    #[test]
    fn test_batch_slots_follow_enqueue_order() {
        let mut batch = MulticallBatch::new();
        let a = batch.add_call("GetServerName", vec![]);
        let b = batch.add_call("GetMaxPlayers", vec![]);

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_take_clears_and_bumps_generation() {
        let mut batch = MulticallBatch::new();
        let old = batch.add_call("GetServerName", vec![]);

        let (generation, calls) = batch.take();
        assert_eq!(generation, 0);
        assert_eq!(calls.len(), 1);
        assert!(batch.is_empty());

        let new = batch.add_call("GetServerName", vec![]);
        assert_ne!(old.batch, new.batch);
        assert_eq!(new.index(), 0);
    }

    #[test]
    fn test_encode_multicall_shape() {
        let bytes = encode_multicall(vec![
            ("Kick".to_string(), vec![Value::from("a")]),
            ("GetStatus".to_string(), vec![]),
        ])
        .unwrap();

        let (method, params) = XmlRpcCodec::decode_call(&bytes).unwrap();
        assert_eq!(method, MULTICALL_METHOD);
        let entries = params[0].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].get("methodName"), Some(&Value::from("Kick")));
        assert_eq!(
            entries[0].get("params"),
            Some(&Value::Array(vec![Value::from("a")]))
        );
    }

    #[test]
    fn test_encode_rejects_nested_multicall() {
        let result = encode_multicall(vec![(MULTICALL_METHOD.to_string(), vec![])]);
        assert!(matches!(result, Err(GbxError::InvalidArgument(_))));
    }

    #[test]
    fn test_decode_mixed_results() {
        let response = Value::Array(vec![
            Value::Array(vec![Value::Boolean(true)]),
            fault_value(-1000, "Login unknown."),
            Value::Array(vec![Value::from("name")]),
        ]);

        let results = decode_multicall(response, 3).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &Value::Boolean(true));
        assert_eq!(results[1].as_ref().unwrap_err().fault_code(), Some(-1000));
        assert_eq!(results[2].as_ref().unwrap(), &Value::from("name"));
    }

    #[test]
    fn test_decode_rejects_count_mismatch() {
        let response = Value::Array(vec![Value::Array(vec![Value::Int(1)])]);
        assert!(matches!(
            decode_multicall(response, 2),
            Err(GbxError::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_unexpected_entry_is_local() {
        let response = Value::Array(vec![Value::Int(3), Value::Array(vec![Value::Int(1)])]);
        let results = decode_multicall(response, 2).unwrap();
        assert!(matches!(results[0], Err(GbxError::Marshal { .. })));
        assert!(results[1].is_ok());
    }

    #[test]
    fn test_results_take_checks_slot() {
        let mut batch = MulticallBatch::new();
        let name = batch.add_call("GetServerName", vec![]);
        let count = batch.add_call_with("GetMaxPlayers", vec![], |v| {
            v.as_i32().ok_or_else(|| GbxError::marshal("int", "not an int"))
        });
        let (generation, calls) = batch.take();

        let mut results = MulticallResults {
            batch: generation,
            slots: calls
                .into_iter()
                .zip([Value::from("srv"), Value::Int(32)])
                .map(|(call, value)| Some((call.transform)(value)))
                .collect(),
        };

        assert_eq!(results.take(count).unwrap(), 32);
        assert_eq!(results.take(name).unwrap(), Value::from("srv"));
        assert!(matches!(results.take(name), Err(GbxError::InvalidArgument(_))));

        let stale = batch.add_call("GetServerName", vec![]);
        assert!(matches!(results.take(stale), Err(GbxError::InvalidArgument(_))));
    }
}
