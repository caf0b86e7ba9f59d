use crate::client::KeyId;
use crate::error::MapperError;
use crate::path::Path;
use crate::property::{Property, PropertySet};
use crate::translate::{PropertyTranslator, TranslationCtx};
use crate::value::{DeclaredKind, Value};

/// The id field never becomes a property; it completes the key spec on
/// encode and surfaces the id component of the decoded key.
pub struct IdFieldTranslator;

impl PropertyTranslator for IdFieldTranslator {
    fn encode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        value: &Value,
        path: &Path,
        _indexed: bool,
    ) -> Result<Option<PropertySet>, MapperError> {
        if let Some(spec) = ctx.state.encode_key_spec.as_mut() {
            match value {
                Value::Null => {}
                Value::I64(n) => spec.id = Some(KeyId::Id(*n)),
                Value::Str(s) => spec.id = Some(KeyId::Name(s.clone())),
                other => {
                    return Err(MapperError::conversion(path, other.kind_name(), "key id"))
                }
            }
        }
        Ok(Some(PropertySet::new()))
    }

    fn decode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        _props: &[Property],
        _path: &Path,
        _declared: &DeclaredKind,
    ) -> Result<Option<Value>, MapperError> {
        let value = match ctx.state.decode_key.as_ref().map(|k| &k.id) {
            Some(KeyId::Id(n)) => Value::I64(*n),
            Some(KeyId::Name(s)) => Value::Str(s.clone()),
            None => Value::Null,
        };
        Ok(Some(value))
    }
}

/// A native-key field short-circuits key derivation entirely.
pub struct KeyFieldTranslator;

impl PropertyTranslator for KeyFieldTranslator {
    fn encode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        value: &Value,
        path: &Path,
        _indexed: bool,
    ) -> Result<Option<PropertySet>, MapperError> {
        if let Some(spec) = ctx.state.encode_key_spec.as_mut() {
            match value {
                Value::Null => {}
                Value::Key(key) => spec.key = Some(key.clone()),
                other => {
                    return Err(MapperError::conversion(path, other.kind_name(), "native key"))
                }
            }
        }
        Ok(Some(PropertySet::new()))
    }

    fn decode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        _props: &[Property],
        _path: &Path,
        _declared: &DeclaredKind,
    ) -> Result<Option<Value>, MapperError> {
        Ok(Some(ctx.state.decode_key.clone().map(Value::Key).unwrap_or(Value::Null)))
    }
}
