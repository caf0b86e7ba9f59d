use crate::client::{
    DatastoreClient, Entity, FetchOptions, FilterOp, Key, KeyId, KeySpec, KindQuery, NativeValue,
};
use crate::config::{Configuration, ModelConfiguration};
use crate::convert::ConverterChain;
use crate::debug;
use crate::error::MapperError;
use crate::model::Registry;
use crate::translate::{
    decode_entity, encode_instance, ensure_key, put_with_retry, store_instance, SessionState,
    TranslationCtx, TranslatorSet,
};
use crate::value::Obj;
use std::any::TypeId;
use std::collections::VecDeque;
use std::sync::Arc;

pub type BeforeUpdateHook = Box<dyn Fn(&Obj, &Key) -> Result<(), MapperError>>;

const DELETE_CHUNK: usize = 100;

/// A single-threaded unit of work over one datastore. Holds the
/// instance-key cache, so within a session one key always maps to one live
/// instance. The registry, configuration and client are shared-safe; the
/// session itself is `!Send` because cached instances are `Rc` handles.
pub struct ObjectDatastore {
    client: Arc<dyn DatastoreClient>,
    registry: Arc<Registry>,
    config: Arc<dyn Configuration>,
    converters: ConverterChain,
    translators: TranslatorSet,
    state: SessionState,
    before_update: Option<BeforeUpdateHook>,
}

impl ObjectDatastore {
    pub fn new(client: Arc<dyn DatastoreClient>, registry: Arc<Registry>) -> ObjectDatastore {
        let config = Arc::new(ModelConfiguration::new(Arc::clone(&registry)));
        ObjectDatastore::with_configuration(client, registry, config)
    }

    pub fn with_configuration(
        client: Arc<dyn DatastoreClient>,
        registry: Arc<Registry>,
        config: Arc<dyn Configuration>,
    ) -> ObjectDatastore {
        ObjectDatastore {
            client,
            registry,
            config,
            converters: ConverterChain::standard(),
            translators: TranslatorSet::standard(),
            state: SessionState::new(),
            before_update: None,
        }
    }

    fn ctx(&mut self) -> TranslationCtx<'_> {
        TranslationCtx {
            state: &mut self.state,
            registry: &self.registry,
            config: self.config.as_ref(),
            converters: &self.converters,
            client: self.client.as_ref(),
            translators: &self.translators,
        }
    }

    fn kind_of<T: 'static>(&self) -> Result<String, MapperError> {
        self.config.type_to_kind(TypeId::of::<T>())
    }

    // ---- store ----

    /// Stores the instance graph rooted at `obj`, allocating a key when it
    /// has none, and returns the key. Referenced instances are stored on
    /// first encounter; already-associated referents contribute only their
    /// cached key.
    pub fn store(&mut self, obj: &Obj) -> Result<Key, MapperError> {
        let mut ctx = self.ctx();
        let key = store_instance(&mut ctx, obj, None, None)?;
        debug!("stored {}", key);
        Ok(key)
    }

    pub fn store_with_id(&mut self, obj: &Obj, id: impl Into<KeyId>) -> Result<Key, MapperError> {
        let mut ctx = self.ctx();
        store_instance(&mut ctx, obj, Some(id.into()), None)
    }

    /// Stores `obj` keyed under `parent`, storing the parent first if it
    /// is not associated yet.
    pub fn store_child(&mut self, obj: &Obj, parent: &Obj) -> Result<Key, MapperError> {
        let mut ctx = self.ctx();
        let parent_key = match ctx.state.cache.key_for(parent) {
            Some(key) => key.clone(),
            None => store_instance(&mut ctx, parent, None, None)?,
        };
        store_instance(&mut ctx, obj, None, Some(parent_key))
    }

    /// Stores every instance in one datastore put. Keys come back in input
    /// order; referents stored along the way join the same batch.
    pub fn store_all(&mut self, objs: &[Obj]) -> Result<Vec<Key>, MapperError> {
        let mut ctx = self.ctx();
        ctx.state.batched = Some(Vec::new());
        let mut keys = Vec::with_capacity(objs.len());
        let mut failure = None;
        for obj in objs {
            match store_instance(&mut ctx, obj, None, None) {
                Ok(key) => keys.push(key),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        let batch = ctx.state.batched.take().unwrap_or_default();
        if let Some(e) = failure {
            return Err(e);
        }
        if !batch.is_empty() {
            put_with_retry(self.client.as_ref(), batch)?;
        }
        Ok(keys)
    }

    // ---- update ----

    /// Re-encodes and puts an associated instance under its existing key.
    /// Never allocates ids; fails with `NotAssociated` otherwise.
    pub fn update(&mut self, obj: &Obj) -> Result<Key, MapperError> {
        let key = self.associated_key(obj).ok_or_else(|| self.not_associated(obj))?;
        if let Some(hook) = &self.before_update {
            hook(obj, &key)?;
        }
        let mut ctx = self.ctx();
        let props = encode_instance(&mut ctx, obj, &key)?;
        let mut spec = KeySpec::new(key.kind.clone());
        spec.key = Some(key.clone());
        if let Some(batch) = ctx.state.batched.as_mut() {
            batch.push((spec, props));
        } else {
            put_with_retry(ctx.client, vec![(spec, props)])?;
        }
        Ok(key)
    }

    pub fn update_all(&mut self, objs: &[Obj]) -> Result<Vec<Key>, MapperError> {
        self.state.batched = Some(Vec::new());
        let mut keys = Vec::with_capacity(objs.len());
        let mut failure = None;
        for obj in objs {
            match self.update(obj) {
                Ok(key) => keys.push(key),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        let batch = self.state.batched.take().unwrap_or_default();
        if let Some(e) = failure {
            return Err(e);
        }
        if !batch.is_empty() {
            put_with_retry(self.client.as_ref(), batch)?;
        }
        Ok(keys)
    }

    pub fn store_or_update(&mut self, obj: &Obj) -> Result<Key, MapperError> {
        if self.is_associated(obj) {
            self.update(obj)
        } else {
            self.store(obj)
        }
    }

    // ---- load ----

    /// Loads by key: the cached instance when the key is associated,
    /// otherwise a fetch and decode. `None` when the entity does not exist.
    pub fn load_key(&mut self, key: &Key) -> Result<Option<Obj>, MapperError> {
        if let Some(obj) = self.state.cache.instance_for(key) {
            return Ok(Some(obj.clone()));
        }
        let entity = self.client.get(std::slice::from_ref(key))?.into_iter().next().flatten();
        match entity {
            Some(entity) => {
                let mut ctx = self.ctx();
                Ok(Some(decode_entity(&mut ctx, &entity)?))
            }
            None => Ok(None),
        }
    }

    pub fn load<T: 'static>(&mut self, id: impl Into<KeyId>) -> Result<Option<Obj>, MapperError> {
        let kind = self.kind_of::<T>()?;
        self.load_key(&Key::new(kind, id.into(), None))
    }

    /// Batch load preserving input order; missing entities come back as
    /// `None` in their slot.
    pub fn load_all<T: 'static>(
        &mut self,
        ids: impl IntoIterator<Item = impl Into<KeyId>>,
    ) -> Result<Vec<Option<Obj>>, MapperError> {
        let kind = self.kind_of::<T>()?;
        let keys: Vec<Key> =
            ids.into_iter().map(|id| Key::new(kind.clone(), id.into(), None)).collect();
        let fetched = self.client.get(&keys)?;
        let mut out = Vec::with_capacity(keys.len());
        for (key, entity) in keys.iter().zip(fetched) {
            if let Some(obj) = self.state.cache.instance_for(key) {
                out.push(Some(obj.clone()));
                continue;
            }
            match entity {
                Some(entity) => {
                    let mut ctx = self.ctx();
                    out.push(Some(decode_entity(&mut ctx, &entity)?));
                }
                None => out.push(None),
            }
        }
        Ok(out)
    }

    // ---- delete ----

    pub fn delete(&mut self, obj: &Obj) -> Result<(), MapperError> {
        let key = self.associated_key(obj).ok_or_else(|| self.not_associated(obj))?;
        self.client.delete(std::slice::from_ref(&key))?;
        self.state.cache.evict_instance(obj);
        Ok(())
    }

    pub fn delete_all_of(&mut self, objs: &[Obj]) -> Result<(), MapperError> {
        let mut keys = Vec::with_capacity(objs.len());
        for obj in objs {
            keys.push(self.associated_key(obj).ok_or_else(|| self.not_associated(obj))?);
        }
        self.client.delete(&keys)?;
        for obj in objs {
            self.state.cache.evict_instance(obj);
        }
        Ok(())
    }

    /// Deletes every stored entity of the type's kind, in bounded batches.
    pub fn delete_kind<T: 'static>(&mut self) -> Result<usize, MapperError> {
        let kind = self.kind_of::<T>()?;
        let query = KindQuery::kind(kind.clone()).keys_only();
        let mut keys = Vec::new();
        for entity in self.client.query(&query, &FetchOptions::default())? {
            keys.push(entity?.key);
        }
        let total = keys.len();
        for chunk in keys.chunks(DELETE_CHUNK) {
            self.client.delete(chunk)?;
            for key in chunk {
                self.state.cache.evict_key(key);
            }
        }
        debug!("deleted {} entities of kind {}", total, kind);
        Ok(total)
    }

    // ---- refresh / activate ----

    /// Re-reads the instance's entity and hydrates the same instance in
    /// place. Fails with `NotFound` when the entity no longer exists.
    pub fn refresh(&mut self, obj: &Obj) -> Result<(), MapperError> {
        let key = self.associated_key(obj).ok_or_else(|| self.not_associated(obj))?;
        self.state.cache.evict_instance(obj);
        self.state.refresh = Some(obj.clone());
        let reloaded = self.load_key(&key);
        self.state.refresh = None;
        match reloaded? {
            Some(_) => Ok(()),
            None => Err(MapperError::NotFound(key.to_string())),
        }
    }

    pub fn refresh_all(&mut self, objs: &[Obj]) -> Result<(), MapperError> {
        for obj in objs {
            self.refresh(obj)?;
        }
        Ok(())
    }

    /// Re-decodes the instance so relations within the current activation
    /// depth are populated.
    pub fn activate(&mut self, obj: &Obj) -> Result<(), MapperError> {
        self.refresh(obj)
    }

    pub fn activate_all(&mut self, objs: &[Obj]) -> Result<(), MapperError> {
        self.refresh_all(objs)
    }

    // ---- association ----

    /// Derives and caches the key without storing anything.
    pub fn associate(&mut self, obj: &Obj) -> Result<Key, MapperError> {
        let mut ctx = self.ctx();
        ensure_key(&mut ctx, obj, None, None)
    }

    pub fn associate_child(&mut self, obj: &Obj, parent: &Obj) -> Result<Key, MapperError> {
        let parent_key = self.associated_key(parent).ok_or_else(|| self.not_associated(parent))?;
        let mut ctx = self.ctx();
        ensure_key(&mut ctx, obj, None, Some(parent_key))
    }

    pub fn associate_all(&mut self, objs: &[Obj]) -> Result<Vec<Key>, MapperError> {
        objs.iter().map(|obj| self.associate(obj)).collect()
    }

    /// Binds an externally known key to the instance.
    pub fn associate_with_key(&mut self, obj: &Obj, key: Key) {
        self.state.cache.cache(obj.clone(), key);
    }

    pub fn disassociate(&mut self, obj: &Obj) {
        self.state.cache.evict_instance(obj);
    }

    pub fn disassociate_all(&mut self) {
        self.state.cache.clear();
    }

    pub fn associated_key(&self, obj: &Obj) -> Option<Key> {
        self.state.cache.key_for(obj).cloned()
    }

    pub fn is_associated(&self, obj: &Obj) -> bool {
        self.state.cache.key_for(obj).is_some()
    }

    // ---- find ----

    pub fn find<T: 'static>(&mut self) -> Result<FindIterator<'_>, MapperError> {
        let kind = self.kind_of::<T>()?;
        self.find_query(KindQuery::kind(kind), FetchOptions::default())
    }

    pub fn find_filtered<T: 'static>(
        &mut self,
        field: &str,
        op: FilterOp<NativeValue>,
    ) -> Result<FindIterator<'_>, MapperError> {
        let kind = self.kind_of::<T>()?;
        self.find_query(KindQuery::kind(kind).with_filter(field, op), FetchOptions::default())
    }

    /// Runs a query and wraps it in a lazily decoding iterator that works
    /// in `chunk_size` strides.
    pub fn find_query(
        &mut self,
        query: KindQuery,
        fetch: FetchOptions,
    ) -> Result<FindIterator<'_>, MapperError> {
        if let Some(prefetch) = fetch.prefetch_size {
            if prefetch != fetch.chunk_size {
                return Err(MapperError::FetchOptionMismatch {
                    chunk: fetch.chunk_size,
                    prefetch,
                });
            }
        }
        let source = self.client.query(&query, &fetch)?;
        Ok(FindIterator {
            session: self,
            source,
            chunk: fetch.chunk_size.max(1),
            buffer: VecDeque::new(),
        })
    }

    // ---- knobs ----

    /// Pre-allocates `count` ids for the type's kind; stores draw from the
    /// range before asking the client again.
    pub fn prefetch_ids<T: 'static>(&mut self, count: u64) -> Result<(), MapperError> {
        let kind = self.kind_of::<T>()?;
        let range = self.client.allocate_ids(&kind, count)?;
        self.state.allocated.insert(kind, range);
        Ok(())
    }

    pub fn set_activation_depth(&mut self, depth: i32) {
        self.state.activation_depth = depth;
    }

    pub fn activation_depth(&self) -> i32 {
        self.state.activation_depth
    }

    pub fn set_indexed_default(&mut self, indexed: bool) {
        self.state.indexed_default = indexed;
    }

    /// Called with the instance and its key before every update put; the
    /// seam where callers hang backup or audit work.
    pub fn set_before_update_hook(&mut self, hook: BeforeUpdateHook) {
        self.before_update = Some(hook);
    }

    pub fn configuration(&self) -> &dyn Configuration {
        self.config.as_ref()
    }

    fn not_associated(&self, obj: &Obj) -> MapperError {
        let name = self
            .registry
            .model_for_type(obj.type_id())
            .map(|m| m.type_name.to_string())
            .unwrap_or_else(|_| format!("{obj:?}"));
        MapperError::NotAssociated(name)
    }

    fn decode_or_cached(&mut self, entity: &Entity) -> Result<Obj, MapperError> {
        if let Some(obj) = self.state.cache.instance_for(&entity.key) {
            return Ok(obj.clone());
        }
        let mut ctx = self.ctx();
        decode_entity(&mut ctx, entity)
    }
}

/// Query results decoded on demand, `chunk` entities at a time. Already
/// associated keys yield their cached instances.
pub struct FindIterator<'a> {
    session: &'a mut ObjectDatastore,
    source: crate::client::EntityIter,
    chunk: usize,
    buffer: VecDeque<Result<Obj, MapperError>>,
}

impl Iterator for FindIterator<'_> {
    type Item = Result<Obj, MapperError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            for _ in 0..self.chunk {
                match self.source.next() {
                    Some(Ok(entity)) => {
                        self.buffer.push_back(self.session.decode_or_cached(&entity))
                    }
                    Some(Err(e)) => self.buffer.push_back(Err(e.into())),
                    None => break,
                }
            }
        }
        self.buffer.pop_front()
    }
}
