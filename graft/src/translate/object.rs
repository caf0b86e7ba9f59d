use crate::client::NativeValue;
use crate::error::MapperError;
use crate::path::Path;
use crate::property::{slice_with_prefix, Property, PropertySet};
use crate::translate::{PropertyTranslator, TranslationCtx};
use crate::value::{DeclaredKind, Value};
use chrono::TimeZone;

/// Walks a registered model's fields in configured-name order, fanning
/// each out to the translator its classification selects. This is the
/// entry point for whole entities (empty path) and for embedded records.
pub struct ObjectFieldTranslator;

impl PropertyTranslator for ObjectFieldTranslator {
    fn encode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        value: &Value,
        path: &Path,
        _indexed: bool,
    ) -> Result<Option<PropertySet>, MapperError> {
        let Some(obj) = value.as_object() else {
            return Ok(None);
        };
        let registry = ctx.registry;
        let config = ctx.config;
        let translators = ctx.translators;

        // a persistent (associated) instance can never be embedded
        if !path.is_empty() && ctx.state.cache.key_for(obj).is_some() {
            return Err(MapperError::ForbiddenEmbed { path: path.to_string() });
        }
        let model = registry.model_for_type(obj.type_id())?;

        let mut out = PropertySet::new();
        for field in model.fields() {
            if !config.stored(field) {
                continue;
            }
            let key_material = config.id(field) || config.key(field) || config.parent(field);
            if ctx.state.associating && !key_material {
                continue;
            }
            let field_value = field.get(obj)?;
            let field_path = path.field(config.name(field));
            let indexed = config.indexed(field, ctx.state.indexed_default);
            if field_value.is_null() && !key_material {
                if config.null_stored() {
                    out.push(Property::new(field_path, NativeValue::Null, indexed));
                }
                continue;
            }
            let translator = translators.for_field(config, field);
            let encoded =
                translator.encode(ctx, &field_value, &field_path, indexed)?.ok_or_else(|| {
                    MapperError::conversion(&field_path, field_value.kind_name(), "stored property")
                })?;
            out.merge(encoded);
        }
        Ok(Some(out))
    }

    fn decode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        props: &[Property],
        path: &Path,
        declared: &DeclaredKind,
    ) -> Result<Option<Value>, MapperError> {
        let type_id = match declared {
            DeclaredKind::Object(type_id) => *type_id,
            _ => return Ok(None),
        };
        let registry = ctx.registry;
        let config = ctx.config;
        let translators = ctx.translators;
        let model = registry.model_for_type(type_id)?;

        if props.is_empty() && !path.is_empty() {
            return Ok(Some(Value::Null));
        }

        let at_root = path.is_empty();
        let obj = if at_root {
            match ctx.state.refresh.take() {
                Some(existing) if existing.type_id() == type_id => existing,
                Some(other) => {
                    ctx.state.refresh = Some(other);
                    model.construct()?
                }
                None => model.construct()?,
            }
        } else {
            model.construct()?
        };
        if at_root {
            if let Some(key) = ctx.state.decode_key.clone() {
                // register before populating so relation cycles resolve here
                ctx.state.cache.cache(obj.clone(), key);
            }
        }

        for field in model.fields() {
            if !config.stored(field) {
                continue;
            }
            let field_path = path.field(config.name(field));
            let slice = slice_with_prefix(props, &field_path);
            let translator = translators.for_field(config, field);
            let saved_depth = ctx.state.activation_depth;
            ctx.state.activation_depth = config.activation_depth(field, saved_depth);
            let decoded = translator.decode(ctx, slice, &field_path, config.declared(field));
            ctx.state.activation_depth = saved_depth;
            match decoded? {
                Some(value) => field.set(&obj, value)?,
                None => {
                    return Err(MapperError::conversion(
                        &field_path,
                        "stored property",
                        format!("{:?}", config.declared(field)),
                    ))
                }
            }
        }
        Ok(Some(Value::Object(obj)))
    }
}

/// Wraps a translator for slots whose concrete type varies per instance.
/// Objects carry a kind discriminator at `path$class`; scalars need none
/// since the native variant already identifies them.
pub struct PolymorphicTranslator {
    child: Box<dyn PropertyTranslator>,
}

impl PolymorphicTranslator {
    pub fn new(child: impl PropertyTranslator + 'static) -> PolymorphicTranslator {
        PolymorphicTranslator { child: Box::new(child) }
    }
}

impl PropertyTranslator for PolymorphicTranslator {
    fn encode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        value: &Value,
        path: &Path,
        indexed: bool,
    ) -> Result<Option<PropertySet>, MapperError> {
        match value {
            Value::Object(obj) => {
                let kind = ctx.config.type_to_kind(obj.type_id())?;
                let mut props = self.child.encode(ctx, value, path, indexed)?.ok_or_else(
                    || MapperError::conversion(path, value.kind_name(), "polymorphic slot"),
                )?;
                props.push(Property::new(path.meta("class"), NativeValue::Str(kind), indexed));
                Ok(Some(props))
            }
            _ => self.child.encode(ctx, value, path, indexed),
        }
    }

    fn decode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        props: &[Property],
        path: &Path,
        _declared: &DeclaredKind,
    ) -> Result<Option<Value>, MapperError> {
        if props.is_empty() {
            return Ok(Some(Value::Null));
        }
        let marker = path.meta("class");
        if let Some(discriminator) = props.iter().find(|p| p.path == marker) {
            let NativeValue::Str(kind) = &discriminator.value else {
                return Err(MapperError::conversion(
                    &marker,
                    discriminator.value.kind_name(),
                    "class discriminator",
                ));
            };
            let type_id = ctx.config.kind_to_type(kind)?;
            return self.child.decode(ctx, props, path, &DeclaredKind::Object(type_id));
        }
        // no discriminator: a scalar slot, recovered from the native variant
        let prop = &props[0];
        if prop.path != *path {
            return Ok(None);
        }
        Ok(Some(dynamic_value(&prop.value)))
    }
}

fn dynamic_value(native: &NativeValue) -> Value {
    match native {
        NativeValue::Null => Value::Null,
        NativeValue::Bool(b) => Value::Bool(*b),
        NativeValue::I64(n) => Value::I64(*n),
        NativeValue::F64(f) => Value::F64(*f),
        NativeValue::Str(s) => Value::Str(s.clone()),
        NativeValue::Blob(b) => Value::Bytes(b.clone()),
        NativeValue::Timestamp(us) => chrono::Utc
            .timestamp_micros(*us)
            .single()
            .map(Value::DateTime)
            .unwrap_or(Value::Null),
        NativeValue::Key(k) => Value::Key(k.clone()),
    }
}
