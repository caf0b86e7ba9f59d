use crate::client::{
    DatastoreClient, Entity, EntityIter, FetchOptions, Key, KeyId, KeySpec, KindQuery,
};
use crate::error::DatastoreError;
use crate::property::PropertySet;
use redb::{
    Database, MultimapTableDefinition, ReadableTable, TableDefinition,
};
use std::ops::Range;
use std::path::Path as FsPath;

const ENTITIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entities");
const KINDS: MultimapTableDefinition<&str, &[u8]> = MultimapTableDefinition::new("keys_by_kind");
const SEQUENCES: TableDefinition<&str, i64> = TableDefinition::new("id_sequences");

/// redb-backed datastore client. Entities live under an order-preserving
/// byte encoding of their key (ancestor chains are byte prefixes, so
/// ancestor ranges stay contiguous); a kind multimap serves kind queries.
pub struct RedbDatastore {
    db: Database,
}

impl RedbDatastore {
    pub fn create(path: impl AsRef<FsPath>) -> Result<RedbDatastore, DatastoreError> {
        let db = Database::create(path)?;
        let store = RedbDatastore { db };
        store.init_tables()?;
        Ok(store)
    }

    /// A throwaway database under the system temp dir, for tests and demos.
    pub fn temp(name: &str) -> Result<RedbDatastore, DatastoreError> {
        let dir = std::env::temp_dir().join("graft").join("test");
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Self::create(dir.join(format!("{}_{}.redb", name, rand::random::<u64>())))
    }

    fn init_tables(&self) -> Result<(), DatastoreError> {
        let tx = self.db.begin_write()?;
        {
            tx.open_table(ENTITIES)?;
            tx.open_multimap_table(KINDS)?;
            tx.open_table(SEQUENCES)?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// Order-preserving key encoding, root ancestor first. Numeric ids are
/// big-endian with the sign bit flipped so negative ids sort first.
fn key_bytes(key: &Key) -> Vec<u8> {
    let mut chain = Vec::new();
    let mut current = Some(key);
    while let Some(k) = current {
        chain.push(k);
        current = k.parent();
    }
    chain.reverse();

    let mut buf = Vec::new();
    for k in chain {
        buf.extend_from_slice(k.kind.as_bytes());
        buf.push(0);
        match &k.id {
            KeyId::Id(n) => {
                buf.push(1);
                buf.extend_from_slice(&((*n as u64) ^ (1 << 63)).to_be_bytes());
            }
            KeyId::Name(s) => {
                buf.push(2);
                buf.extend_from_slice(s.as_bytes());
            }
        }
        buf.push(0);
    }
    buf
}

fn decode_entity(bytes: &[u8]) -> Result<Entity, DatastoreError> {
    Ok(bincode::deserialize(bytes)?)
}

impl DatastoreClient for RedbDatastore {
    fn put(&self, entities: Vec<(KeySpec, PropertySet)>) -> Result<Vec<Key>, DatastoreError> {
        let tx = self.db.begin_write()?;
        let mut keys = Vec::with_capacity(entities.len());
        {
            let mut table = tx.open_table(ENTITIES)?;
            let mut kinds = tx.open_multimap_table(KINDS)?;
            let mut sequences = tx.open_table(SEQUENCES)?;
            for (spec, props) in entities {
                let key = match spec.to_key() {
                    Some(key) => key,
                    None => {
                        let next = sequences.get(spec.kind.as_str())?.map(|g| g.value()).unwrap_or(0) + 1;
                        sequences.insert(spec.kind.as_str(), next)?;
                        Key::new(spec.kind.clone(), KeyId::Id(next), spec.parent.clone())
                    }
                };
                let entity = Entity { key: key.clone(), props };
                let body = bincode::serialize(&entity)?;
                let kb = key_bytes(&key);
                table.insert(kb.as_slice(), body.as_slice())?;
                kinds.insert(key.kind.as_str(), kb.as_slice())?;
                keys.push(key);
            }
        }
        tx.commit()?;
        Ok(keys)
    }

    fn get(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>, DatastoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(ENTITIES)?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let kb = key_bytes(key);
            match table.get(kb.as_slice())? {
                Some(guard) => out.push(Some(decode_entity(guard.value())?)),
                None => out.push(None),
            }
        }
        Ok(out)
    }

    fn delete(&self, keys: &[Key]) -> Result<(), DatastoreError> {
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(ENTITIES)?;
            let mut kinds = tx.open_multimap_table(KINDS)?;
            for key in keys {
                let kb = key_bytes(key);
                table.remove(kb.as_slice())?;
                kinds.remove(key.kind.as_str(), kb.as_slice())?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn query(&self, query: &KindQuery, _fetch: &FetchOptions) -> Result<EntityIter, DatastoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(ENTITIES)?;
        let kinds = tx.open_multimap_table(KINDS)?;
        let mut hits = Vec::new();
        let mut key_guards = kinds.get(query.kind.as_str())?;
        while let Some(guard) = key_guards.next() {
            let kb = guard?;
            let Some(body) = table.get(kb.value())? else { continue };
            let entity = decode_entity(body.value())?;
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
        let tx = self.db.begin_write()?;
        let start;
        {
            let mut sequences = tx.open_table(SEQUENCES)?;
            let current = sequences.get(kind)?.map(|g| g.value()).unwrap_or(0);
            start = current + 1;
            sequences.insert(kind, current + count as i64)?;
        }
        tx.commit()?;
        Ok(start..start + count as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NativeValue;
    use crate::path::Path;
    use crate::property::Property;

    fn props(name: &str) -> PropertySet {
        PropertySet::singleton(Property::new(
            Path::root("name"),
            NativeValue::Str(name.into()),
            true,
        ))
    }

    #[test]
    fn key_bytes_preserve_ancestor_prefixes() {
        let parent = Key::with_id("Parent", 1);
        let child = Key::new("Child", KeyId::Id(2), Some(parent.clone()));
        let pb = key_bytes(&parent);
        let cb = key_bytes(&child);
        assert!(cb.starts_with(&pb));
    }

    #[test]
    fn key_bytes_order_numeric_ids() {
        let lo = key_bytes(&Key::with_id("K", -5));
        let mid = key_bytes(&Key::with_id("K", 0));
        let hi = key_bytes(&Key::with_id("K", 5));
        assert!(lo < mid && mid < hi);
    }

    #[test]
    fn put_get_delete_roundtrip() {
        let store = RedbDatastore::temp("redb_roundtrip").unwrap();
        let keys = store.put(vec![(KeySpec::new("Item"), props("hello"))]).unwrap();
        assert_eq!(keys[0], Key::with_id("Item", 1));

        let got = store.get(&keys).unwrap();
        assert_eq!(got[0].as_ref().unwrap().props, props("hello"));

        store.delete(&keys).unwrap();
        assert!(store.get(&keys).unwrap()[0].is_none());
    }

    #[test]
    fn kind_query_scans_index() {
        let store = RedbDatastore::temp("redb_query").unwrap();
        store
            .put(vec![
                (KeySpec::new("Item"), props("a")),
                (KeySpec::new("Item"), props("b")),
                (KeySpec::new("Other"), props("c")),
            ])
            .unwrap();
        let hits: Vec<_> = store
            .query(&KindQuery::kind("Item"), &FetchOptions::default())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn explicit_name_keys_survive() {
        let store = RedbDatastore::temp("redb_names").unwrap();
        let mut spec = KeySpec::new("Item");
        spec.id = Some(KeyId::Name("hello".into()));
        let keys = store.put(vec![(spec, props("x"))]).unwrap();
        assert_eq!(keys[0], Key::with_name("Item", "hello"));
        assert!(store.get(&keys).unwrap()[0].is_some());
    }
}
