use crate::client::{FetchOptions, FilterOp, Key, KeyId, KindQuery, NativeValue};
use crate::error::MapperError;
use crate::session::{FindIterator, ObjectDatastore};
use crate::value::Obj;
use std::any::TypeId;
use std::marker::PhantomData;

/// Fluent alternative to the session's store methods.
///
/// ```ignore
/// let key = session.store_cmd(&obj).id(7).now()?;
/// ```
pub struct StoreCommand<'a> {
    session: &'a mut ObjectDatastore,
    obj: &'a Obj,
    id: Option<KeyId>,
    parent: Option<&'a Obj>,
    update: bool,
}

impl<'a> StoreCommand<'a> {
    pub fn id(mut self, id: impl Into<KeyId>) -> StoreCommand<'a> {
        self.id = Some(id.into());
        self
    }

    pub fn parent(mut self, parent: &'a Obj) -> StoreCommand<'a> {
        self.parent = Some(parent);
        self
    }

    /// Put under the existing key instead of storing fresh.
    pub fn update(mut self) -> StoreCommand<'a> {
        self.update = true;
        self
    }

    pub fn now(self) -> Result<Key, MapperError> {
        if self.update {
            return self.session.update(self.obj);
        }
        match (self.id, self.parent) {
            (Some(id), None) => self.session.store_with_id(self.obj, id),
            (None, Some(parent)) => self.session.store_child(self.obj, parent),
            (None, None) => self.session.store(self.obj),
            (Some(_), Some(_)) => Err(MapperError::Assignment {
                at: "store".into(),
                reason: "explicit id and parent cannot be combined".into(),
            }),
        }
    }
}

/// Fluent alternative to `load`/`load_all`.
pub struct LoadCommand<'a, T> {
    session: &'a mut ObjectDatastore,
    _target: PhantomData<T>,
}

impl<T: 'static> LoadCommand<'_, T> {
    pub fn id(self, id: impl Into<KeyId>) -> Result<Option<Obj>, MapperError> {
        self.session.load::<T>(id)
    }

    pub fn ids(
        self,
        ids: impl IntoIterator<Item = impl Into<KeyId>>,
    ) -> Result<Vec<Option<Obj>>, MapperError> {
        self.session.load_all::<T>(ids)
    }

    pub fn key(self, key: &Key) -> Result<Option<Obj>, MapperError> {
        self.session.load_key(key)
    }
}

/// Fluent alternative to `find`/`find_filtered` with fetch tuning and
/// ancestor restriction.
pub struct FindCommand<'a> {
    session: &'a mut ObjectDatastore,
    kind: String,
    ancestor: Option<Key>,
    filter: Option<(String, FilterOp<NativeValue>)>,
    fetch: FetchOptions,
}

impl<'a> FindCommand<'a> {
    pub fn filter(mut self, field: impl Into<String>, op: FilterOp<NativeValue>) -> FindCommand<'a> {
        self.filter = Some((field.into(), op));
        self
    }

    pub fn ancestor(mut self, ancestor: Key) -> FindCommand<'a> {
        self.ancestor = Some(ancestor);
        self
    }

    pub fn fetch_options(mut self, fetch: FetchOptions) -> FindCommand<'a> {
        self.fetch = fetch;
        self
    }

    pub fn now(self) -> Result<FindIterator<'a>, MapperError> {
        let mut query = KindQuery::kind(self.kind);
        if let Some(ancestor) = self.ancestor {
            query = query.with_ancestor(ancestor);
        }
        if let Some((field, op)) = self.filter {
            query = query.with_filter(field, op);
        }
        self.session.find_query(query, self.fetch)
    }
}

impl ObjectDatastore {
    pub fn store_cmd<'a>(&'a mut self, obj: &'a Obj) -> StoreCommand<'a> {
        StoreCommand { session: self, obj, id: None, parent: None, update: false }
    }

    pub fn load_cmd<T: 'static>(&mut self) -> LoadCommand<'_, T> {
        LoadCommand { session: self, _target: PhantomData }
    }

    pub fn find_cmd<T: 'static>(&mut self) -> Result<FindCommand<'_>, MapperError> {
        let kind = self.configuration().type_to_kind(TypeId::of::<T>())?;
        Ok(FindCommand {
            session: self,
            kind,
            ancestor: None,
            filter: None,
            fetch: FetchOptions::default(),
        })
    }
}
