use crate::client::NativeValue;
use crate::error::MapperError;
use crate::path::{contains_separator, Path};
use crate::property::{slice_with_prefix, Property, PropertySet};
use crate::translate::{PropertyTranslator, TranslationCtx};
use crate::value::{DeclaredKind, Value};

/// Sequences encode as repeated properties at the element path; emission
/// order is list order, so the i-th occurrence of every distinct path
/// belongs to element i. Non-sequence values and declarations pass through
/// to the child.
pub struct ListTranslator {
    child: Box<dyn PropertyTranslator>,
}

impl ListTranslator {
    pub fn new(child: impl PropertyTranslator + 'static) -> ListTranslator {
        ListTranslator { child: Box::new(child) }
    }
}

impl PropertyTranslator for ListTranslator {
    fn encode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        value: &Value,
        path: &Path,
        indexed: bool,
    ) -> Result<Option<PropertySet>, MapperError> {
        let Value::List(items) = value else {
            return self.child.encode(ctx, value, path, indexed);
        };
        let mut out = PropertySet::new();
        for item in items {
            if item.is_null() {
                out.push(Property::new(path.clone(), NativeValue::Null, indexed));
                continue;
            }
            let encoded = self.child.encode(ctx, item, path, indexed)?.ok_or_else(|| {
                MapperError::conversion(path, item.kind_name(), "list element")
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
        let DeclaredKind::List(inner) = declared else {
            return self.child.decode(ctx, props, path, declared);
        };
        if props.is_empty() {
            return Ok(Some(Value::Null));
        }

        // adjacent equal paths form the occurrence groups
        let mut groups: Vec<(&Path, Vec<&Property>)> = Vec::new();
        for prop in props {
            match groups.last_mut() {
                Some((group_path, occurrences)) if **group_path == prop.path => {
                    occurrences.push(prop)
                }
                _ => groups.push((&prop.path, vec![prop])),
            }
        }
        let len = groups.iter().map(|(_, v)| v.len()).max().unwrap_or(0);

        let mut items = Vec::with_capacity(len);
        for i in 0..len {
            let element: Vec<Property> = groups
                .iter()
                .filter_map(|(_, occurrences)| occurrences.get(i).map(|p| (*p).clone()))
                .collect();
            if element.len() == 1
                && element[0].path == *path
                && element[0].value == NativeValue::Null
            {
                items.push(Value::Null);
                continue;
            }
            let value = self.child.decode(ctx, &element, path, inner)?.ok_or_else(|| {
                MapperError::conversion(path, "stored property", "list element")
            })?;
            items.push(value);
        }
        Ok(Some(Value::List(items)))
    }
}

/// Map entries encode under `path.field(entry_key)`; keys must be
/// separator-free strings. Decode delineates entries by the first part
/// after the prefix. Non-map values and declarations pass through.
pub struct MapTranslator {
    child: Box<dyn PropertyTranslator>,
}

impl MapTranslator {
    pub fn new(child: impl PropertyTranslator + 'static) -> MapTranslator {
        MapTranslator { child: Box::new(child) }
    }
}

impl PropertyTranslator for MapTranslator {
    fn encode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        value: &Value,
        path: &Path,
        indexed: bool,
    ) -> Result<Option<PropertySet>, MapperError> {
        let Value::Map(entries) = value else {
            return self.child.encode(ctx, value, path, indexed);
        };
        let mut out = PropertySet::new();
        for (key, entry) in entries {
            if key.is_empty() || contains_separator(key) {
                return Err(MapperError::BadMapKey(key.clone()));
            }
            if entry.is_null() {
                continue;
            }
            let entry_path = path.field(key);
            let encoded = self.child.encode(ctx, entry, &entry_path, indexed)?.ok_or_else(
                || MapperError::conversion(&entry_path, entry.kind_name(), "map entry"),
            )?;
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
        let DeclaredKind::Map(inner) = declared else {
            return self.child.decode(ctx, props, path, declared);
        };
        if props.is_empty() {
            return Ok(Some(Value::Null));
        }
        let mut entries = Vec::new();
        let mut at = 0;
        while at < props.len() {
            let part = props[at].path.first_part_after_prefix(path).ok_or_else(|| {
                MapperError::conversion(&props[at].path, "stored property", "map entry")
            })?;
            let name = part.name().to_string();
            let entry_path = path.field(&name);
            let slice = slice_with_prefix(&props[at..], &entry_path);
            let advance = slice.len().max(1);
            let value = self.child.decode(ctx, slice, &entry_path, inner)?.ok_or_else(
                || MapperError::conversion(&entry_path, "stored property", "map entry"),
            )?;
            entries.push((name, value));
            at += advance;
        }
        Ok(Some(Value::Map(entries)))
    }
}
