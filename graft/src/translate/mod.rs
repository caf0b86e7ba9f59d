pub mod collections;
pub mod keys;
pub mod object;
pub mod relations;
pub mod scalar;

pub use collections::{ListTranslator, MapTranslator};
pub use keys::{IdFieldTranslator, KeyFieldTranslator};
pub use object::{ObjectFieldTranslator, PolymorphicTranslator};
pub use relations::{ChildTranslator, IndependentTranslator, ParentTranslator};
pub use scalar::{BlobFallbackTranslator, ValueChainTranslator};

use crate::cache::InstanceKeyCache;
use crate::client::{DatastoreClient, Entity, Key, KeyId, KeySpec};
use crate::config::Configuration;
use crate::convert::ConverterChain;
use crate::error::{DatastoreError, MapperError};
use crate::model::{FieldDef, Registry};
use crate::path::Path;
use crate::property::{Property, PropertySet};
use crate::retry::retry_with_delay;
use crate::value::{DeclaredKind, Obj, ScalarKind, Value};
use crate::warn;
use std::collections::HashMap;
use std::ops::Range;
use std::time::Duration;

/// Mutable per-session state threaded through every translation. Fields
/// mirror the lifecycle of one encode or decode pass; nested passes save
/// and restore the slots they touch.
pub struct SessionState {
    pub cache: InstanceKeyCache,
    pub activation_depth: i32,
    /// Key material accumulated while the current instance encodes.
    pub encode_key_spec: Option<KeySpec>,
    /// Complete key of the instance currently encoding.
    pub encode_key: Option<Key>,
    /// Key of the entity currently decoding.
    pub decode_key: Option<Key>,
    /// Existing instance the next root decode hydrates instead of
    /// constructing a fresh one.
    pub refresh: Option<Obj>,
    /// When set, only key-material fields count as stored.
    pub associating: bool,
    /// Open batch; stores append here instead of putting immediately.
    pub batched: Option<Vec<(KeySpec, PropertySet)>>,
    /// Prefetched id ranges, consumed before asking the client.
    pub allocated: HashMap<String, Range<i64>>,
    pub indexed_default: bool,
}

pub const DEFAULT_ACTIVATION_DEPTH: i32 = 5;

impl SessionState {
    pub fn new() -> SessionState {
        SessionState {
            cache: InstanceKeyCache::new(),
            activation_depth: DEFAULT_ACTIVATION_DEPTH,
            encode_key_spec: None,
            encode_key: None,
            decode_key: None,
            refresh: None,
            associating: false,
            batched: None,
            allocated: HashMap::new(),
            indexed_default: true,
        }
    }
}

impl Default for SessionState {
    fn default() -> SessionState {
        SessionState::new()
    }
}

/// Everything a translator can reach during one pass. The shared-safe
/// collaborators come in by reference; only `state` is mutable.
pub struct TranslationCtx<'a> {
    pub state: &'a mut SessionState,
    pub registry: &'a Registry,
    pub config: &'a dyn Configuration,
    pub converters: &'a ConverterChain,
    pub client: &'a dyn DatastoreClient,
    pub translators: &'a TranslatorSet,
}

/// One codec between host values and flattened properties. `Ok(None)`
/// means "cannot handle this shape", which is what chaining dispatches on.
pub trait PropertyTranslator {
    fn encode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        value: &Value,
        path: &Path,
        indexed: bool,
    ) -> Result<Option<PropertySet>, MapperError>;

    fn decode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        props: &[Property],
        path: &Path,
        declared: &DeclaredKind,
    ) -> Result<Option<Value>, MapperError>;
}

/// Tries each link in order until one answers.
pub struct ChainedTranslator {
    links: Vec<Box<dyn PropertyTranslator>>,
}

impl ChainedTranslator {
    pub fn new(links: Vec<Box<dyn PropertyTranslator>>) -> ChainedTranslator {
        ChainedTranslator { links }
    }
}

impl PropertyTranslator for ChainedTranslator {
    fn encode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        value: &Value,
        path: &Path,
        indexed: bool,
    ) -> Result<Option<PropertySet>, MapperError> {
        for link in &self.links {
            if let Some(props) = link.encode(ctx, value, path, indexed)? {
                return Ok(Some(props));
            }
        }
        Ok(None)
    }

    fn decode(
        &self,
        ctx: &mut TranslationCtx<'_>,
        props: &[Property],
        path: &Path,
        declared: &DeclaredKind,
    ) -> Result<Option<Value>, MapperError> {
        for link in &self.links {
            if let Some(value) = link.decode(ctx, props, path, declared)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

/// The canonical translator compositions, built once per session. The
/// fallback seam is injectable so sessions can substitute their own codec
/// for shapes the value chain cannot flatten.
pub struct TranslatorSet {
    root: ObjectFieldTranslator,
    default_field: Box<dyn PropertyTranslator>,
    embed: Box<dyn PropertyTranslator>,
    poly_embed: Box<dyn PropertyTranslator>,
    parent: ParentTranslator,
    child: Box<dyn PropertyTranslator>,
    independent: Box<dyn PropertyTranslator>,
    id: IdFieldTranslator,
    key: KeyFieldTranslator,
}

impl TranslatorSet {
    pub fn standard() -> TranslatorSet {
        TranslatorSet::with_fallback(Box::new(BlobFallbackTranslator))
    }

    pub fn with_fallback(fallback: Box<dyn PropertyTranslator>) -> TranslatorSet {
        TranslatorSet {
            root: ObjectFieldTranslator,
            default_field: Box::new(ListTranslator::new(MapTranslator::new(
                ChainedTranslator::new(vec![Box::new(ValueChainTranslator), fallback]),
            ))),
            embed: Box::new(ListTranslator::new(MapTranslator::new(ObjectFieldTranslator))),
            poly_embed: Box::new(ListTranslator::new(MapTranslator::new(
                PolymorphicTranslator::new(ChainedTranslator::new(vec![
                    Box::new(ValueChainTranslator),
                    Box::new(ObjectFieldTranslator),
                ])),
            ))),
            parent: ParentTranslator,
            child: Box::new(ListTranslator::new(ChildTranslator)),
            independent: Box::new(ListTranslator::new(IndependentTranslator)),
            id: IdFieldTranslator,
            key: KeyFieldTranslator,
        }
    }

    pub fn object_field(&self) -> &ObjectFieldTranslator {
        &self.root
    }

    /// Fixed first-match dispatch from a classified field to its codec.
    pub fn for_field(&self, config: &dyn Configuration, field: &FieldDef) -> &dyn PropertyTranslator {
        if config.entity(field) {
            if config.parent(field) {
                &self.parent
            } else if config.child(field) {
                &*self.child
            } else {
                &*self.independent
            }
        } else if config.id(field) {
            &self.id
        } else if config.polymorphic(field) {
            &*self.poly_embed
        } else if config.embed(field) {
            &*self.embed
        } else if config.key(field) {
            &self.key
        } else {
            &*self.default_field
        }
    }
}

const PUT_ATTEMPTS: usize = 3;
const PUT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Puts a batch, retrying transient unavailability; every other failure is
/// final on the first attempt.
pub(crate) fn put_with_retry(
    client: &dyn DatastoreClient,
    batch: Vec<(KeySpec, PropertySet)>,
) -> Result<Vec<Key>, MapperError> {
    let outcome = retry_with_delay(PUT_ATTEMPTS, PUT_RETRY_DELAY, || {
        match client.put(batch.clone()) {
            Err(DatastoreError::Unavailable(msg)) => {
                warn!("datastore unavailable, will retry put: {}", msg);
                Err(DatastoreError::Unavailable(msg))
            }
            other => Ok(other),
        }
    })?;
    Ok(outcome?)
}

/// Returns the instance's key, deriving and caching one if it has none
/// yet. The derivation runs the object translator in associating mode so
/// only id, key and parent fields contribute, folds the resulting spec and
/// allocates a numeric id when nothing supplied one. The instance is
/// cached before the caller encodes any relation, which is what terminates
/// cyclic graphs.
pub fn ensure_key(
    ctx: &mut TranslationCtx<'_>,
    obj: &Obj,
    explicit_id: Option<KeyId>,
    explicit_parent: Option<Key>,
) -> Result<Key, MapperError> {
    if let Some(key) = ctx.state.cache.key_for(obj) {
        return Ok(key.clone());
    }
    let registry = ctx.registry;
    let translators = ctx.translators;
    let model = registry.model_for_type(obj.type_id())?;

    let saved_spec = ctx.state.encode_key_spec.replace(KeySpec::new(model.kind.clone()));
    let saved_key = ctx.state.encode_key.take();
    let saved_associating = std::mem::replace(&mut ctx.state.associating, true);
    let outcome = translators.object_field().encode(
        ctx,
        &Value::Object(obj.clone()),
        &Path::empty(),
        false,
    );
    ctx.state.associating = saved_associating;
    ctx.state.encode_key = saved_key;
    let mut spec = std::mem::replace(&mut ctx.state.encode_key_spec, saved_spec)
        .unwrap_or_else(|| KeySpec::new(model.kind.clone()));
    outcome?;

    if let Some(id) = explicit_id {
        spec.id = Some(id);
    }
    if let Some(parent) = explicit_parent {
        spec.parent = Some(parent);
    }

    let key = match spec.to_key() {
        Some(key) => key,
        None => {
            let id = next_allocated_id(ctx, &spec.kind)?;
            if let Some(field) = model.id_field() {
                match field.declared {
                    DeclaredKind::Scalar(ScalarKind::I64) => field.set(obj, Value::I64(id))?,
                    _ => {
                        return Err(MapperError::Assignment {
                            at: field.name.clone(),
                            reason: "name-valued id field is empty; names cannot be allocated"
                                .into(),
                        })
                    }
                }
            }
            Key::new(spec.kind.clone(), KeyId::Id(id), spec.parent.clone())
        }
    };
    ctx.state.cache.cache(obj.clone(), key.clone());
    Ok(key)
}

fn next_allocated_id(ctx: &mut TranslationCtx<'_>, kind: &str) -> Result<i64, MapperError> {
    if let Some(range) = ctx.state.allocated.get_mut(kind) {
        if range.start < range.end {
            let id = range.start;
            range.start += 1;
            return Ok(id);
        }
    }
    let range = ctx.client.allocate_ids(kind, 1)?;
    Ok(range.start)
}

/// Full encode of an associated instance into its flattened properties.
pub fn encode_instance(
    ctx: &mut TranslationCtx<'_>,
    obj: &Obj,
    key: &Key,
) -> Result<PropertySet, MapperError> {
    let translators = ctx.translators;
    let saved_spec = ctx.state.encode_key_spec.replace(KeySpec::new(key.kind.clone()));
    let saved_key = ctx.state.encode_key.replace(key.clone());
    let indexed = ctx.state.indexed_default;
    let outcome =
        translators.object_field().encode(ctx, &Value::Object(obj.clone()), &Path::empty(), indexed);
    ctx.state.encode_key_spec = saved_spec;
    ctx.state.encode_key = saved_key;
    outcome?.ok_or_else(|| {
        MapperError::conversion(&Path::empty(), "object", "property set")
    })
}

/// Ensures a key, encodes, then puts immediately or appends to the open
/// batch. Returns the (complete) key.
pub fn store_instance(
    ctx: &mut TranslationCtx<'_>,
    obj: &Obj,
    explicit_id: Option<KeyId>,
    explicit_parent: Option<Key>,
) -> Result<Key, MapperError> {
    let key = ensure_key(ctx, obj, explicit_id, explicit_parent)?;
    let props = encode_instance(ctx, obj, &key)?;
    let mut spec = KeySpec::new(key.kind.clone());
    spec.key = Some(key.clone());
    if let Some(batch) = ctx.state.batched.as_mut() {
        batch.push((spec, props));
    } else {
        put_with_retry(ctx.client, vec![(spec, props)])?;
    }
    Ok(key)
}

/// Decodes one fetched entity into a live, cached instance.
pub fn decode_entity(ctx: &mut TranslationCtx<'_>, entity: &Entity) -> Result<Obj, MapperError> {
    let registry = ctx.registry;
    let translators = ctx.translators;
    let model = registry.model_for_kind(&entity.key.kind)?;
    let declared = DeclaredKind::Object(model.type_id);

    let saved_key = ctx.state.decode_key.replace(entity.key.clone());
    let outcome =
        translators.object_field().decode(ctx, entity.props.as_slice(), &Path::empty(), &declared);
    ctx.state.decode_key = saved_key;
    match outcome? {
        Some(Value::Object(obj)) => Ok(obj),
        _ => Err(DatastoreError::Corrupt(format!("entity {} did not decode", entity.key)).into()),
    }
}

/// Resolves a stored relation key to an instance: cache hit first, then a
/// depth-bounded fetch. Exhausted depth and vanished referents both decode
/// to `Null`.
pub fn resolve_relation(ctx: &mut TranslationCtx<'_>, key: &Key) -> Result<Value, MapperError> {
    if let Some(obj) = ctx.state.cache.instance_for(key) {
        return Ok(Value::Object(obj.clone()));
    }
    if ctx.state.activation_depth <= 0 {
        return Ok(Value::Null);
    }
    let entity = match ctx.client.get(std::slice::from_ref(key))?.into_iter().next().flatten() {
        Some(entity) => entity,
        None => return Ok(Value::Null),
    };
    let saved_depth = ctx.state.activation_depth;
    ctx.state.activation_depth = saved_depth - 1;
    let decoded = decode_entity(ctx, &entity);
    ctx.state.activation_depth = saved_depth;
    Ok(Value::Object(decoded?))
}
