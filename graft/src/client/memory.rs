use crate::client::{
    DatastoreClient, Entity, EntityIter, FetchOptions, Key, KeyId, KeySpec, KindQuery,
};
use crate::error::DatastoreError;
use crate::property::PropertySet;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    entities: BTreeMap<Key, PropertySet>,
    sequences: HashMap<String, i64>,
    fail_puts: u32,
}

/// In-memory datastore used by tests and as the reference client
/// implementation. Queries are linear scans.
#[derive(Default)]
pub struct MemoryDatastore {
    inner: Mutex<Inner>,
}

impl MemoryDatastore {
    pub fn new() -> MemoryDatastore {
        MemoryDatastore::default()
    }

    /// Makes the next `n` puts fail with `Unavailable`, for retry tests.
    pub fn fail_next_puts(&self, n: u32) {
        self.lock().fail_puts = n;
    }

    pub fn entity_count(&self) -> usize {
        self.lock().entities.len()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.lock().entities.contains_key(key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // session access is single threaded; a poisoned lock means a test panicked
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Inner {
    fn next_id(&mut self, kind: &str) -> i64 {
        let seq = self.sequences.entry(kind.to_string()).or_insert(0);
        *seq += 1;
        *seq
    }
}

impl DatastoreClient for MemoryDatastore {
    fn put(&self, entities: Vec<(KeySpec, PropertySet)>) -> Result<Vec<Key>, DatastoreError> {
        let mut inner = self.lock();
        if inner.fail_puts > 0 {
            inner.fail_puts -= 1;
            return Err(DatastoreError::Unavailable("injected put failure".into()));
        }
        let mut keys = Vec::with_capacity(entities.len());
        for (spec, props) in entities {
            let key = match spec.to_key() {
                Some(key) => key,
                None => {
                    let id = inner.next_id(&spec.kind);
                    Key::new(spec.kind.clone(), KeyId::Id(id), spec.parent.clone())
                }
            };
            inner.entities.insert(key.clone(), props);
            keys.push(key);
        }
        Ok(keys)
    }

    fn get(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>, DatastoreError> {
        let inner = self.lock();
        Ok(keys
            .iter()
            .map(|key| {
                inner
                    .entities
                    .get(key)
                    .map(|props| Entity { key: key.clone(), props: props.clone() })
            })
            .collect())
    }

    fn delete(&self, keys: &[Key]) -> Result<(), DatastoreError> {
        let mut inner = self.lock();
        for key in keys {
            inner.entities.remove(key);
        }
        Ok(())
    }

    fn query(&self, query: &KindQuery, _fetch: &FetchOptions) -> Result<EntityIter, DatastoreError> {
        let inner = self.lock();
        let mut hits: Vec<Entity> = Vec::new();
        for (key, props) in inner.entities.iter() {
            let entity = Entity { key: key.clone(), props: props.clone() };
            if query.accepts(&entity) {
                if query.keys_only {
                    hits.push(Entity { key: entity.key, props: PropertySet::new() });
                } else {
                    hits.push(entity);
                }
            }
        }
        Ok(Box::new(hits.into_iter().map(Ok)))
    }

    fn allocate_ids(&self, kind: &str, count: u64) -> Result<Range<i64>, DatastoreError> {
        let mut inner = self.lock();
        let seq = inner.sequences.entry(kind.to_string()).or_insert(0);
        let start = *seq + 1;
        *seq += count as i64;
        Ok(start..start + count as i64)
    }
}
