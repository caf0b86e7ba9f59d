use crate::client::NativeValue;
use crate::value::{ScalarKind, Value};
use chrono::{DateTime, TimeZone, Utc};

/// One link of the conversion chain: host value to native scalar and back.
/// Returning `None` passes the value to the next converter.
pub trait ValueConverter: Send + Sync {
    fn to_native(&self, value: &Value) -> Option<NativeValue>;

    fn to_host(&self, value: &NativeValue, want: ScalarKind) -> Option<Value>;
}

/// Ordered registry of converters. The first converter that answers wins.
pub struct ConverterChain {
    converters: Vec<Box<dyn ValueConverter>>,
}

impl ConverterChain {
    pub fn new(converters: Vec<Box<dyn ValueConverter>>) -> ConverterChain {
        ConverterChain { converters }
    }

    /// The chain used by default sessions: bools, integers, floats (with
    /// i64 widening), strings, blobs, timestamps and keys.
    pub fn standard() -> ConverterChain {
        ConverterChain::new(vec![
            Box::new(BoolConverter),
            Box::new(I64Converter),
            Box::new(F64Converter),
            Box::new(StrConverter),
            Box::new(BytesConverter),
            Box::new(DateTimeConverter),
            Box::new(KeyConverter),
        ])
    }

    pub fn push(&mut self, converter: Box<dyn ValueConverter>) {
        self.converters.push(converter);
    }

    pub fn converts_to_native(&self, value: &Value) -> bool {
        self.to_native(value).is_some()
    }

    pub fn to_native(&self, value: &Value) -> Option<NativeValue> {
        if value.is_null() {
            return Some(NativeValue::Null);
        }
        self.converters.iter().find_map(|c| c.to_native(value))
    }

    pub fn to_host(&self, value: &NativeValue, want: ScalarKind) -> Option<Value> {
        if matches!(value, NativeValue::Null) {
            return Some(Value::Null);
        }
        self.converters.iter().find_map(|c| c.to_host(value, want))
    }
}

struct BoolConverter;

impl ValueConverter for BoolConverter {
    fn to_native(&self, value: &Value) -> Option<NativeValue> {
        match value {
            Value::Bool(b) => Some(NativeValue::Bool(*b)),
            _ => None,
        }
    }

    fn to_host(&self, value: &NativeValue, want: ScalarKind) -> Option<Value> {
        match (value, want) {
            (NativeValue::Bool(b), ScalarKind::Bool) => Some(Value::Bool(*b)),
            _ => None,
        }
    }
}

struct I64Converter;

impl ValueConverter for I64Converter {
    fn to_native(&self, value: &Value) -> Option<NativeValue> {
        match value {
            Value::I64(n) => Some(NativeValue::I64(*n)),
            _ => None,
        }
    }

    fn to_host(&self, value: &NativeValue, want: ScalarKind) -> Option<Value> {
        match (value, want) {
            (NativeValue::I64(n), ScalarKind::I64) => Some(Value::I64(*n)),
            _ => None,
        }
    }
}

struct F64Converter;

impl ValueConverter for F64Converter {
    fn to_native(&self, value: &Value) -> Option<NativeValue> {
        match value {
            Value::F64(f) => Some(NativeValue::F64(*f)),
            _ => None,
        }
    }

    fn to_host(&self, value: &NativeValue, want: ScalarKind) -> Option<Value> {
        match (value, want) {
            (NativeValue::F64(f), ScalarKind::F64) => Some(Value::F64(*f)),
            // stores may hold integers where a float field is declared
            (NativeValue::I64(n), ScalarKind::F64) => Some(Value::F64(*n as f64)),
            _ => None,
        }
    }
}

struct StrConverter;

impl ValueConverter for StrConverter {
    fn to_native(&self, value: &Value) -> Option<NativeValue> {
        match value {
            Value::Str(s) => Some(NativeValue::Str(s.clone())),
            _ => None,
        }
    }

    fn to_host(&self, value: &NativeValue, want: ScalarKind) -> Option<Value> {
        match (value, want) {
            (NativeValue::Str(s), ScalarKind::Str) => Some(Value::Str(s.clone())),
            _ => None,
        }
    }
}

struct BytesConverter;

impl ValueConverter for BytesConverter {
    fn to_native(&self, value: &Value) -> Option<NativeValue> {
        match value {
            Value::Bytes(b) => Some(NativeValue::Blob(b.clone())),
            _ => None,
        }
    }

    fn to_host(&self, value: &NativeValue, want: ScalarKind) -> Option<Value> {
        match (value, want) {
            (NativeValue::Blob(b), ScalarKind::Bytes) => Some(Value::Bytes(b.clone())),
            _ => None,
        }
    }
}

struct DateTimeConverter;

impl ValueConverter for DateTimeConverter {
    fn to_native(&self, value: &Value) -> Option<NativeValue> {
        match value {
            Value::DateTime(dt) => Some(NativeValue::Timestamp(dt.timestamp_micros())),
            _ => None,
        }
    }

    fn to_host(&self, value: &NativeValue, want: ScalarKind) -> Option<Value> {
        match (value, want) {
            (NativeValue::Timestamp(us), ScalarKind::DateTime) => {
                micros_to_datetime(*us).map(Value::DateTime)
            }
            _ => None,
        }
    }
}

fn micros_to_datetime(us: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_micros(us).single()
}

struct KeyConverter;

impl ValueConverter for KeyConverter {
    fn to_native(&self, value: &Value) -> Option<NativeValue> {
        match value {
            Value::Key(k) => Some(NativeValue::Key(k.clone())),
            _ => None,
        }
    }

    fn to_host(&self, value: &NativeValue, want: ScalarKind) -> Option<Value> {
        match (value, want) {
            (NativeValue::Key(k), ScalarKind::Key) => Some(Value::Key(k.clone())),
            _ => None,
        }
    }
}
