//! Foreign-object reference table.
//!
//! Guest code cannot hold host references, so every host value it needs to
//! talk about (strings, byte buffers, records) lives in an [`ObjectTable`]
//! and crosses the boundary as a [`Handle`].
//!
//! Handles come from a strictly increasing counter and are never handed out
//! twice. A lookup of a released handle fails with
//! [`BridgeError::StaleHandle`]; a handle the table never issued fails with
//! [`BridgeError::UnknownHandle`]. Once the counter reaches `u32::MAX`,
//! `create` fails with [`BridgeError::KeysExhausted`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::trace;

use crate::error::{BridgeError, Result};

/// Integer reference to a host value, opaque to the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(pub u32);

impl Handle {
    /// Never issued by any table.
    pub const NULL: Handle = Handle(0);

    /// Raw value as passed across the wasm boundary.
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Field map of a record value.
pub type Record = BTreeMap<String, HostValue>;

/// A host value stored behind a handle.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// Numeric value (fields written with `js_set_field_f32`)
    Number(f64),
    /// UTF-8 text
    Str(String),
    /// Owned byte buffer
    Bytes(Vec<u8>),
    /// Key/value record
    Record(Record),
}

impl HostValue {
    /// Empty record.
    pub fn record() -> Self {
        HostValue::Record(Record::new())
    }

    /// Short name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            HostValue::Number(_) => "number",
            HostValue::Str(_) => "string",
            HostValue::Bytes(_) => "buffer",
            HostValue::Record(_) => "record",
        }
    }

    /// Numeric view; non-numbers read as NaN.
    pub fn as_f32(&self) -> f32 {
        match self {
            HostValue::Number(n) => *n as f32,
            _ => f32::NAN,
        }
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Str(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::Str(s)
    }
}

impl From<Vec<u8>> for HostValue {
    fn from(bytes: Vec<u8>) -> Self {
        HostValue::Bytes(bytes)
    }
}

impl From<f32> for HostValue {
    fn from(n: f32) -> Self {
        HostValue::Number(f64::from(n))
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<Record> for HostValue {
    fn from(record: Record) -> Self {
        HostValue::Record(record)
    }
}

/// Handle → value registry with monotonic handle allocation.
#[derive(Debug)]
pub struct ObjectTable {
    entries: HashMap<u32, HostValue>,
    next_id: u32,
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectTable {
    /// Create an empty table. The first handle issued is 1.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
        }
    }

    /// Store a value and return its new handle.
    pub fn create(&mut self, value: impl Into<HostValue>) -> Result<Handle> {
        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or(BridgeError::KeysExhausted("object handle"))?;
        let value = value.into();
        trace!(handle = id, kind = value.kind(), "object created");
        self.entries.insert(id, value);
        Ok(Handle(id))
    }

    /// Borrow the value behind a handle.
    pub fn get(&self, handle: Handle) -> Result<&HostValue> {
        self.entries
            .get(&handle.0)
            .ok_or_else(|| self.miss(handle))
    }

    /// Mutably borrow the value behind a handle.
    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut HostValue> {
        let err = self.miss(handle);
        self.entries.get_mut(&handle.0).ok_or(err)
    }

    /// Borrow a string value.
    pub fn get_str(&self, handle: Handle) -> Result<&str> {
        match self.get(handle)? {
            HostValue::Str(s) => Ok(s),
            other => Err(mismatch(handle, "string", other)),
        }
    }

    /// Borrow a byte buffer value.
    pub fn get_bytes(&self, handle: Handle) -> Result<&[u8]> {
        match self.get(handle)? {
            HostValue::Bytes(b) => Ok(b),
            other => Err(mismatch(handle, "buffer", other)),
        }
    }

    /// Insert or overwrite a field of a record value.
    pub fn set_field(
        &mut self,
        handle: Handle,
        field: &str,
        value: impl Into<HostValue>,
    ) -> Result<()> {
        let record = self.record_mut(handle)?;
        record.insert(field.to_string(), value.into());
        Ok(())
    }

    /// Read a field of a record value.
    pub fn get_field(&self, handle: Handle, field: &str) -> Result<&HostValue> {
        self.record(handle)?
            .get(field)
            .ok_or_else(|| BridgeError::MissingField {
                handle: handle.0,
                field: field.to_string(),
            })
    }

    /// Whether a record value has the named field.
    pub fn has_field(&self, handle: Handle, field: &str) -> Result<bool> {
        Ok(self.record(handle)?.contains_key(field))
    }

    /// UTF-8 byte length of a string, or element count of a buffer.
    pub fn length_of(&self, handle: Handle) -> Result<usize> {
        match self.get(handle)? {
            HostValue::Str(s) => Ok(s.len()),
            HostValue::Bytes(b) => Ok(b.len()),
            other => Err(mismatch(handle, "string or buffer", other)),
        }
    }

    /// Drop the entry behind a handle.
    pub fn release(&mut self, handle: Handle) -> Result<()> {
        self.take(handle).map(|_| ())
    }

    /// Remove the entry and hand its value to the caller.
    pub fn take(&mut self, handle: Handle) -> Result<HostValue> {
        match self.entries.remove(&handle.0) {
            Some(value) => {
                trace!(handle = handle.0, "object released");
                Ok(value)
            }
            None => Err(self.miss(handle)),
        }
    }

    /// Whether the handle currently refers to a live entry.
    pub fn is_live(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle.0)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every entry. The handle counter keeps counting.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn record(&self, handle: Handle) -> Result<&Record> {
        match self.get(handle)? {
            HostValue::Record(r) => Ok(r),
            other => Err(mismatch(handle, "record", other)),
        }
    }

    fn record_mut(&mut self, handle: Handle) -> Result<&mut Record> {
        match self.get_mut(handle)? {
            HostValue::Record(r) => Ok(r),
            other => Err(mismatch(handle, "record", other)),
        }
    }

    fn miss(&self, handle: Handle) -> BridgeError {
        if handle.0 == 0 || handle.0 >= self.next_id {
            BridgeError::UnknownHandle(handle.0)
        } else {
            BridgeError::StaleHandle(handle.0)
        }
    }
}

fn mismatch(handle: Handle, expected: &'static str, found: &HostValue) -> BridgeError {
    BridgeError::TypeMismatch {
        handle: handle.0,
        expected,
        found: found.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_handle_is_one() {
        let mut table = ObjectTable::new();
        assert_eq!(table.create("a").unwrap(), Handle(1));
        assert_eq!(table.create("b").unwrap(), Handle(2));
    }

    #[test]
    fn test_release_then_lookup_is_stale() {
        let mut table = ObjectTable::new();
        let h = table.create("hello").unwrap();
        table.release(h).unwrap();

        assert!(matches!(table.get(h), Err(BridgeError::StaleHandle(1))));
        assert!(matches!(table.release(h), Err(BridgeError::StaleHandle(1))));
    }

    #[test]
    fn test_unknown_handles() {
        let table = ObjectTable::new();
        assert!(matches!(table.get(Handle::NULL), Err(BridgeError::UnknownHandle(0))));
        assert!(matches!(table.get(Handle(42)), Err(BridgeError::UnknownHandle(42))));
    }

    #[test]
    fn test_released_handle_is_not_reassigned() {
        let mut table = ObjectTable::new();
        let a = table.create("a").unwrap();
        table.release(a).unwrap();
        let b = table.create("b").unwrap();

        assert_ne!(a, b);
        assert!(table.get(a).is_err());
        assert_eq!(table.get_str(b).unwrap(), "b");
    }

    #[test]
    fn test_record_fields() {
        let mut table = ObjectTable::new();
        let obj = table.create(HostValue::record()).unwrap();

        table.set_field(obj, "x", 1.5f32).unwrap();
        table.set_field(obj, "name", "quad").unwrap();

        assert_eq!(table.get_field(obj, "x").unwrap(), &HostValue::Number(1.5));
        assert_eq!(table.get_field(obj, "name").unwrap(), &HostValue::from("quad"));
        assert!(table.has_field(obj, "x").unwrap());
        assert!(!table.has_field(obj, "y").unwrap());

        table.set_field(obj, "x", 2.0f32).unwrap();
        assert_eq!(table.get_field(obj, "x").unwrap().as_f32(), 2.0);
    }

    #[test]
    fn test_missing_field() {
        let mut table = ObjectTable::new();
        let obj = table.create(HostValue::record()).unwrap();
        let err = table.get_field(obj, "nope").unwrap_err();
        assert!(matches!(err, BridgeError::MissingField { handle: 1, .. }));
    }

    #[test]
    fn test_field_ops_require_record() {
        let mut table = ObjectTable::new();
        let s = table.create("text").unwrap();

        let err = table.set_field(s, "x", 1.0f32).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::TypeMismatch { expected: "record", found: "string", .. }
        ));
        assert!(table.has_field(s, "x").is_err());
    }

    #[test]
    fn test_length_of_counts_utf8_bytes() {
        let mut table = ObjectTable::new();
        let euro = table.create("€").unwrap();
        let bytes = table.create(vec![1u8, 2, 3, 4]).unwrap();
        let num = table.create(3.0f64).unwrap();

        assert_eq!(table.length_of(euro).unwrap(), 3);
        assert_eq!(table.length_of(bytes).unwrap(), 4);
        assert!(table.length_of(num).is_err());
    }

    #[test]
    fn test_take_returns_value() {
        let mut table = ObjectTable::new();
        let h = table.create(vec![9u8]).unwrap();
        assert_eq!(table.take(h).unwrap(), HostValue::Bytes(vec![9]));
        assert!(table.is_empty());
    }

    #[test]
    fn test_clear_keeps_counter() {
        let mut table = ObjectTable::new();
        table.create("a").unwrap();
        table.create("b").unwrap();
        table.clear();
        assert_eq!(table.len(), 0);
        assert_eq!(table.create("c").unwrap(), Handle(3));
    }

    #[test]
    fn test_handle_counter_exhaustion() {
        let mut table = ObjectTable {
            entries: HashMap::new(),
            next_id: u32::MAX - 1,
        };
        assert_eq!(table.create("last").unwrap(), Handle(u32::MAX - 1));

        let err = table.create("one too many").unwrap_err();
        assert!(matches!(err, BridgeError::KeysExhausted("object handle")));
        assert_eq!(table.len(), 1);
        assert!(matches!(table.get(Handle(u32::MAX)), Err(BridgeError::UnknownHandle(_))));
    }

    proptest! {
        #[test]
        fn prop_handles_strictly_increase(ops in proptest::collection::vec(any::<bool>(), 1..64)) {
            let mut table = ObjectTable::new();
            let mut issued: Vec<Handle> = Vec::new();

            for release_last in ops {
                if release_last {
                    if let Some(h) = issued.last().copied() {
                        let _ = table.release(h);
                    }
                }
                let h = table.create("v").unwrap();
                if let Some(prev) = issued.last() {
                    prop_assert!(h > *prev);
                }
                prop_assert!(!issued.contains(&h));
                issued.push(h);
            }
        }
    }
}
