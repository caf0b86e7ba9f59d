use crate::client::Key;
use chrono::{DateTime, Utc};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Host-side dynamic value bridging user records and the translators.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    Key(Key),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
    Object(Obj),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::DateTime(_) => "datetime",
            Value::Key(_) => "key",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Value::Key(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Obj> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Scalar types the conversion chain can target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    I64,
    F64,
    Str,
    Bytes,
    DateTime,
    Key,
}

/// Declared type of a field, driving decode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclaredKind {
    Scalar(ScalarKind),
    List(Box<DeclaredKind>),
    Map(Box<DeclaredKind>),
    Object(TypeId),
    /// Polymorphic slot; the concrete type comes from the discriminator.
    Dynamic,
}

impl DeclaredKind {
    pub fn list_of(inner: DeclaredKind) -> DeclaredKind {
        DeclaredKind::List(Box::new(inner))
    }

    pub fn map_of(inner: DeclaredKind) -> DeclaredKind {
        DeclaredKind::Map(Box::new(inner))
    }

    pub fn object<T: 'static>() -> DeclaredKind {
        DeclaredKind::Object(TypeId::of::<T>())
    }
}

/// Shared handle to a live instance. The erased payload is `RefCell<T>`;
/// identity is `Rc` pointer identity, which is what the session cache keys
/// on. Holding `Rc` makes every containing type `!Send`, so a session can
/// only ever be driven from the thread that created it.
#[derive(Clone)]
pub struct Obj {
    type_id: TypeId,
    inner: Rc<dyn Any>,
}

impl Obj {
    pub fn new<T: 'static>(value: T) -> Obj {
        Obj { type_id: TypeId::of::<T>(), inner: Rc::new(RefCell::new(value)) }
    }

    pub fn from_rc<T: 'static>(rc: Rc<RefCell<T>>) -> Obj {
        Obj { type_id: TypeId::of::<T>(), inner: rc }
    }

    /// TypeId of the wrapped `T`.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    pub fn same(&self, other: &Obj) -> bool {
        self.addr() == other.addr()
    }

    pub fn cell<T: 'static>(&self) -> Option<&RefCell<T>> {
        self.inner.downcast_ref::<RefCell<T>>()
    }

    pub fn downcast<T: 'static>(&self) -> Option<Rc<RefCell<T>>> {
        Rc::clone(&self.inner).downcast::<RefCell<T>>().ok()
    }

    /// Clones the wrapped value out of the handle.
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.cell::<T>().map(|c| c.borrow().clone())
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obj({:p})", Rc::as_ptr(&self.inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obj_identity_follows_the_rc() {
        let a = Obj::new(5i64);
        let b = a.clone();
        let c = Obj::new(5i64);
        assert!(a.same(&b));
        assert!(!a.same(&c));
    }

    #[test]
    fn obj_downcasts_to_the_wrapped_type() {
        let o = Obj::new(String::from("hi"));
        assert_eq!(o.type_id(), TypeId::of::<String>());
        assert_eq!(o.get::<String>().as_deref(), Some("hi"));
        assert!(o.get::<i64>().is_none());
        let rc = o.downcast::<String>().unwrap();
        rc.borrow_mut().push('!');
        assert_eq!(o.get::<String>().as_deref(), Some("hi!"));
    }
}
