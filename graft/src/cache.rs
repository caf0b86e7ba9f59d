use crate::client::Key;
use crate::value::Obj;
use std::collections::HashMap;

/// Bijective session-scoped map between live instances and their datastore
/// keys. Instances compare by `Rc` pointer identity, keys by value. Caching
/// either side of an existing binding evicts the stale partner first, so
/// the two directions never disagree.
#[derive(Default)]
pub struct InstanceKeyCache {
    key_by_addr: HashMap<usize, (Obj, Key)>,
    obj_by_key: HashMap<Key, Obj>,
}

impl InstanceKeyCache {
    pub fn new() -> InstanceKeyCache {
        InstanceKeyCache::default()
    }

    pub fn cache(&mut self, obj: Obj, key: Key) {
        self.evict_instance(&obj);
        self.evict_key(&key);
        self.key_by_addr.insert(obj.addr(), (obj.clone(), key.clone()));
        self.obj_by_key.insert(key, obj);
    }

    pub fn key_for(&self, obj: &Obj) -> Option<&Key> {
        self.key_by_addr.get(&obj.addr()).map(|(_, key)| key)
    }

    pub fn instance_for(&self, key: &Key) -> Option<&Obj> {
        self.obj_by_key.get(key)
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.obj_by_key.contains_key(key)
    }

    pub fn evict_instance(&mut self, obj: &Obj) -> Option<Key> {
        let (_, key) = self.key_by_addr.remove(&obj.addr())?;
        self.obj_by_key.remove(&key);
        Some(key)
    }

    pub fn evict_key(&mut self, key: &Key) -> Option<Obj> {
        let obj = self.obj_by_key.remove(key)?;
        self.key_by_addr.remove(&obj.addr());
        Some(obj)
    }

    pub fn clear(&mut self) {
        self.key_by_addr.clear();
        self.obj_by_key.clear();
    }

    pub fn len(&self) -> usize {
        self.obj_by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obj_by_key.is_empty()
    }
}
