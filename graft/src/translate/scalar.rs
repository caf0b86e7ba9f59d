use crate::client::NativeValue;
use crate::error::MapperError;
use crate::path::Path;
use crate::property::{Property, PropertySet};
use crate::translate::{PropertyTranslator, TranslationCtx};
use crate::value::{DeclaredKind, ScalarKind, Value};
use chrono::TimeZone;

/// Scalar codec backed by the session's conversion chain.
pub struct ValueChainTranslator;

impl PropertyTranslator for ValueChainTranslator {
    fn encode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        value: &Value,
        path: &Path,
        indexed: bool,
    ) -> Result<Option<PropertySet>, MapperError> {
        match value {
            Value::Object(_) | Value::List(_) | Value::Map(_) => Ok(None),
            scalar => Ok(ctx.converters.to_native(scalar).map(|native| {
                PropertySet::singleton(Property::new(path.clone(), native, indexed))
            })),
        }
    }

    fn decode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        props: &[Property],
        path: &Path,
        declared: &DeclaredKind,
    ) -> Result<Option<Value>, MapperError> {
        let want = match declared {
            DeclaredKind::Scalar(kind) => *kind,
            _ => return Ok(None),
        };
        if props.is_empty() {
            return Ok(Some(Value::Null));
        }
        let prop = &props[0];
        if prop.path != *path {
            return Ok(None);
        }
        match ctx.converters.to_host(&prop.value, want) {
            Some(value) => Ok(Some(value)),
            None => Err(MapperError::conversion(
                path,
                prop.value.kind_name(),
                format!("{want:?}"),
            )),
        }
    }
}

/// Injection seam for shapes the value chain cannot flatten, typically
/// nested collections of scalars. Serializes to an opaque, unindexed JSON
/// blob; decode is guided by the declared kind.
pub struct BlobFallbackTranslator;

impl PropertyTranslator for BlobFallbackTranslator {
    fn encode(
        &self,
        _ctx: &mut TranslationCtx<'_>,
        value: &Value,
        path: &Path,
        _indexed: bool,
    ) -> Result<Option<PropertySet>, MapperError> {
        if matches!(value, Value::Object(_)) {
            return Ok(None);
        }
        match to_json(value) {
            Some(json) => {
                let body = serde_json::to_vec(&json)?;
                Ok(Some(PropertySet::singleton(Property::new(
                    path.clone(),
                    NativeValue::Blob(body),
                    false,
                ))))
            }
            None => Ok(None),
        }
    }

    fn decode(
        &self,
        _ctx: &mut TranslationCtx<'_>,
        props: &[Property],
        path: &Path,
        declared: &DeclaredKind,
    ) -> Result<Option<Value>, MapperError> {
        if props.is_empty() {
            return Ok(Some(Value::Null));
        }
        let prop = &props[0];
        if prop.path != *path {
            return Ok(None);
        }
        let NativeValue::Blob(body) = &prop.value else {
            return Ok(None);
        };
        let json: serde_json::Value = serde_json::from_slice(body)?;
        if json.is_null() {
            return Ok(Some(Value::Null));
        }
        match from_json(&json, declared) {
            Some(value) => Ok(Some(value)),
            None => Err(MapperError::conversion(path, "blob", format!("{declared:?}"))),
        }
    }
}

fn to_json(value: &Value) -> Option<serde_json::Value> {
    match value {
        Value::Null => Some(serde_json::Value::Null),
        Value::Bool(b) => Some(serde_json::json!(b)),
        Value::I64(n) => Some(serde_json::json!(n)),
        Value::F64(f) => Some(serde_json::json!(f)),
        Value::Str(s) => Some(serde_json::json!(s)),
        Value::Bytes(b) => Some(serde_json::json!(b)),
        Value::DateTime(dt) => Some(serde_json::json!(dt.timestamp_micros())),
        Value::List(items) => items
            .iter()
            .map(to_json)
            .collect::<Option<Vec<_>>>()
            .map(serde_json::Value::Array),
        Value::Map(entries) => entries
            .iter()
            .map(|(k, v)| to_json(v).map(|j| (k.clone(), j)))
            .collect::<Option<serde_json::Map<String, serde_json::Value>>>()
            .map(serde_json::Value::Object),
        Value::Key(_) | Value::Object(_) => None,
    }
}

fn from_json(json: &serde_json::Value, declared: &DeclaredKind) -> Option<Value> {
    if json.is_null() {
        return Some(Value::Null);
    }
    match declared {
        DeclaredKind::Scalar(ScalarKind::Bool) => json.as_bool().map(Value::Bool),
        DeclaredKind::Scalar(ScalarKind::I64) => json.as_i64().map(Value::I64),
        DeclaredKind::Scalar(ScalarKind::F64) => json.as_f64().map(Value::F64),
        DeclaredKind::Scalar(ScalarKind::Str) => json.as_str().map(|s| Value::Str(s.into())),
        DeclaredKind::Scalar(ScalarKind::Bytes) => json
            .as_array()?
            .iter()
            .map(|j| j.as_u64().map(|n| n as u8))
            .collect::<Option<Vec<u8>>>()
            .map(Value::Bytes),
        DeclaredKind::Scalar(ScalarKind::DateTime) => json
            .as_i64()
            .and_then(|us| chrono::Utc.timestamp_micros(us).single())
            .map(Value::DateTime),
        DeclaredKind::Scalar(ScalarKind::Key) => None,
        DeclaredKind::List(inner) => json
            .as_array()?
            .iter()
            .map(|j| from_json(j, inner))
            .collect::<Option<Vec<_>>>()
            .map(Value::List),
        DeclaredKind::Map(inner) => json
            .as_object()?
            .iter()
            .map(|(k, j)| from_json(j, inner).map(|v| (k.clone(), v)))
            .collect::<Option<Vec<_>>>()
            .map(Value::Map),
        DeclaredKind::Object(_) | DeclaredKind::Dynamic => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_lists_survive_the_blob() {
        let value = Value::List(vec![
            Value::List(vec![Value::I64(1), Value::I64(2)]),
            Value::List(vec![Value::I64(3)]),
        ]);
        let json = to_json(&value).unwrap();
        let declared = DeclaredKind::list_of(DeclaredKind::list_of(DeclaredKind::Scalar(
            ScalarKind::I64,
        )));
        match from_json(&json, &declared).unwrap() {
            Value::List(outer) => assert_eq!(outer.len(), 2),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn objects_are_not_blobbed() {
        assert!(to_json(&Value::Object(crate::value::Obj::new(1i64))).is_none());
    }
}
