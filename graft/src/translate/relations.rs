use crate::client::NativeValue;
use crate::error::MapperError;
use crate::path::Path;
use crate::property::{Property, PropertySet};
use crate::translate::{resolve_relation, store_instance, PropertyTranslator, TranslationCtx};
use crate::value::{DeclaredKind, Value};

/// The referent becomes the current entity's key ancestor. Encoding emits
/// no property; the key lands in the encode spec. Decoding takes the
/// parent component of the entity's own key.
pub struct ParentTranslator;

impl PropertyTranslator for ParentTranslator {
    fn encode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        value: &Value,
        _path: &Path,
        _indexed: bool,
    ) -> Result<Option<PropertySet>, MapperError> {
        match value {
            Value::Null => Ok(Some(PropertySet::new())),
            Value::Object(obj) => {
                let key = match ctx.state.cache.key_for(obj) {
                    Some(key) => key.clone(),
                    None => store_instance(ctx, obj, None, None)?,
                };
                if let Some(spec) = ctx.state.encode_key_spec.as_mut() {
                    spec.parent = Some(key);
                }
                Ok(Some(PropertySet::new()))
            }
            _ => Ok(None),
        }
    }

    fn decode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        _props: &[Property],
        _path: &Path,
        _declared: &DeclaredKind,
    ) -> Result<Option<Value>, MapperError> {
        let parent = ctx.state.decode_key.as_ref().and_then(|k| k.parent().cloned());
        match parent {
            Some(key) => Ok(Some(resolve_relation(ctx, &key)?)),
            None => Ok(Some(Value::Null)),
        }
    }
}

/// The referent is stored keyed under the current entity; the entity
/// carries the child key as a property.
pub struct ChildTranslator;

impl PropertyTranslator for ChildTranslator {
    fn encode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        value: &Value,
        path: &Path,
        indexed: bool,
    ) -> Result<Option<PropertySet>, MapperError> {
        match value {
            Value::Null => Ok(Some(PropertySet::new())),
            Value::Object(obj) => {
                let owner = ctx.state.encode_key.clone().ok_or_else(|| {
                    MapperError::Assignment {
                        at: path.to_string(),
                        reason: "child encoded before its owner has a key".into(),
                    }
                })?;
                let key = match ctx.state.cache.key_for(obj) {
                    Some(key) => key.clone(),
                    None => store_instance(ctx, obj, None, Some(owner))?,
                };
                Ok(Some(PropertySet::singleton(Property::new(
                    path.clone(),
                    NativeValue::Key(key),
                    indexed,
                ))))
            }
            _ => Ok(None),
        }
    }

    fn decode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        props: &[Property],
        path: &Path,
        _declared: &DeclaredKind,
    ) -> Result<Option<Value>, MapperError> {
        decode_key_property(ctx, props, path)
    }
}

/// The referent is stored as its own root entity; only its key is
/// recorded on the referrer.
pub struct IndependentTranslator;

impl PropertyTranslator for IndependentTranslator {
    fn encode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        value: &Value,
        path: &Path,
        indexed: bool,
    ) -> Result<Option<PropertySet>, MapperError> {
        match value {
            Value::Null => Ok(Some(PropertySet::new())),
            Value::Object(obj) => {
                let key = match ctx.state.cache.key_for(obj) {
                    Some(key) => key.clone(),
                    None => store_instance(ctx, obj, None, None)?,
                };
                Ok(Some(PropertySet::singleton(Property::new(
                    path.clone(),
                    NativeValue::Key(key),
                    indexed,
                ))))
            }
            _ => Ok(None),
        }
    }

    fn decode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        props: &[Property],
        path: &Path,
        _declared: &DeclaredKind,
    ) -> Result<Option<Value>, MapperError> {
        decode_key_property(ctx, props, path)
    }
}

fn decode_key_property(
    ctx: &mut TranslationCtx<'_>,
    props: &[Property],
    path: &Path,
) -> Result<Option<Value>, MapperError> {
    if props.is_empty() {
        return Ok(Some(Value::Null));
    }
    let prop = &props[0];
    if prop.path != *path {
        return Ok(None);
    }
    match &prop.value {
        NativeValue::Null => Ok(Some(Value::Null)),
        NativeValue::Key(key) => {
            let key = key.clone();
            Ok(Some(resolve_relation(ctx, &key)?))
        }
        other => Err(MapperError::conversion(path, other.kind_name(), "relation key")),
    }
}
