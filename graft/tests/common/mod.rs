#![allow(dead_code)]

use graft::client::memory::MemoryDatastore;
use graft::model::{FieldDef, FieldRole, Registry, TypeModel};
use graft::value::{DeclaredKind, Obj, ScalarKind, Value};
use graft::{DatastoreClient, Key, MapperError, ObjectDatastore};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Person {
    pub id: Option<i64>,
    pub name: String,
    pub tags: Vec<String>,
    pub scores: Vec<Option<i64>>,
    pub address: Option<Address>,
    pub employer: Option<Obj>,
}

#[derive(Clone, Default)]
pub struct Address {
    pub line: String,
    pub zip: i64,
}

#[derive(Clone, Default)]
pub struct Company {
    pub id: Option<i64>,
    pub name: String,
}

#[derive(Clone, Default)]
pub struct Album {
    pub id: Option<i64>,
    pub title: String,
    pub cover: Option<Obj>,
}

#[derive(Clone, Default)]
pub struct Photo {
    pub id: Option<i64>,
    pub caption: String,
    pub album: Option<Obj>,
}

#[derive(Clone, Default)]
pub struct Node {
    pub id: Option<i64>,
    pub name: String,
    pub next: Option<Obj>,
}

#[derive(Clone, Default)]
pub struct Canvas {
    pub id: Option<i64>,
    pub paint: Option<Obj>,
}

#[derive(Clone, Default)]
pub struct Circle {
    pub radius: i64,
}

#[derive(Clone, Default)]
pub struct Square {
    pub side: i64,
}

#[derive(Clone, Default)]
pub struct Tag {
    pub key: Option<Key>,
    pub label: String,
}

#[derive(Clone, Default)]
pub struct Product {
    pub id: Option<i64>,
    pub attrs: Vec<(String, String)>,
}

// registered without a constructor, so decode must fail
#[derive(Clone)]
pub struct Opaque {
    pub id: Option<i64>,
    pub secret: String,
}

// embeds an entity instance, which encode must reject once it is associated
#[derive(Clone, Default)]
pub struct Wrapper {
    pub id: Option<i64>,
    pub inner: Option<Obj>,
}

fn bad_assignment(at: &str, value: &Value) -> MapperError {
    MapperError::Assignment { at: at.to_string(), reason: value.kind_name().to_string() }
}

fn id_field<T: 'static>(
    get: fn(&T) -> Value,
    set: fn(&mut T, Value) -> Result<(), MapperError>,
) -> FieldDef {
    FieldDef::new::<T>("id", FieldRole::Id, DeclaredKind::Scalar(ScalarKind::I64), get, set)
}

fn relation_value(slot: &Option<Obj>) -> Value {
    slot.clone().map(Value::Object).unwrap_or(Value::Null)
}

fn set_relation(slot: &mut Option<Obj>, value: Value, at: &str) -> Result<(), MapperError> {
    match value {
        Value::Null => {
            *slot = None;
            Ok(())
        }
        Value::Object(obj) => {
            *slot = Some(obj);
            Ok(())
        }
        other => Err(bad_assignment(at, &other)),
    }
}

pub fn registry() -> Arc<Registry> {
    let person = TypeModel::new::<Person>("Person")
        .constructed_by(|| Obj::new(Person::default()))
        .with_field(id_field::<Person>(
            |p| p.id.map(Value::I64).unwrap_or(Value::Null),
            |p, v| {
                p.id = v.as_i64();
                Ok(())
            },
        ))
        .with_field(FieldDef::new::<Person>(
            "name",
            FieldRole::Default,
            DeclaredKind::Scalar(ScalarKind::Str),
            |p| Value::Str(p.name.clone()),
            |p, v| match v {
                Value::Str(s) => {
                    p.name = s;
                    Ok(())
                }
                Value::Null => Ok(()),
                other => Err(bad_assignment("name", &other)),
            },
        ))
        .with_field(FieldDef::new::<Person>(
            "tags",
            FieldRole::Default,
            DeclaredKind::list_of(DeclaredKind::Scalar(ScalarKind::Str)),
            |p| Value::List(p.tags.iter().map(|t| Value::Str(t.clone())).collect()),
            |p, v| match v {
                Value::Null => Ok(()),
                Value::List(items) => {
                    p.tags = items
                        .into_iter()
                        .filter_map(|i| match i {
                            Value::Str(s) => Some(s),
                            _ => None,
                        })
                        .collect();
                    Ok(())
                }
                other => Err(bad_assignment("tags", &other)),
            },
        ))
        .with_field(FieldDef::new::<Person>(
            "scores",
            FieldRole::Default,
            DeclaredKind::list_of(DeclaredKind::Scalar(ScalarKind::I64)),
            |p| {
                Value::List(
                    p.scores.iter().map(|s| s.map(Value::I64).unwrap_or(Value::Null)).collect(),
                )
            },
            |p, v| match v {
                Value::Null => Ok(()),
                Value::List(items) => {
                    p.scores = items.into_iter().map(|i| i.as_i64()).collect();
                    Ok(())
                }
                other => Err(bad_assignment("scores", &other)),
            },
        ))
        .with_field(FieldDef::new::<Person>(
            "address",
            FieldRole::Embedded,
            DeclaredKind::object::<Address>(),
            |p| p.address.clone().map(|a| Value::Object(Obj::new(a))).unwrap_or(Value::Null),
            |p, v| match v {
                Value::Null => {
                    p.address = None;
                    Ok(())
                }
                Value::Object(obj) => {
                    p.address = obj.get::<Address>();
                    Ok(())
                }
                other => Err(bad_assignment("address", &other)),
            },
        ))
        .with_field(FieldDef::new::<Person>(
            "employer",
            FieldRole::Independent,
            DeclaredKind::object::<Company>(),
            |p| relation_value(&p.employer),
            |p, v| set_relation(&mut p.employer, v, "employer"),
        ));

    let address = TypeModel::new::<Address>("Address")
        .constructed_by(|| Obj::new(Address::default()))
        .with_field(FieldDef::new::<Address>(
            "line",
            FieldRole::Default,
            DeclaredKind::Scalar(ScalarKind::Str),
            |a| Value::Str(a.line.clone()),
            |a, v| match v {
                Value::Str(s) => {
                    a.line = s;
                    Ok(())
                }
                Value::Null => Ok(()),
                other => Err(bad_assignment("line", &other)),
            },
        ))
        .with_field(FieldDef::new::<Address>(
            "zip",
            FieldRole::Default,
            DeclaredKind::Scalar(ScalarKind::I64),
            |a| Value::I64(a.zip),
            |a, v| {
                a.zip = v.as_i64().unwrap_or(0);
                Ok(())
            },
        ));

    let company = TypeModel::new::<Company>("Company")
        .constructed_by(|| Obj::new(Company::default()))
        .with_field(id_field::<Company>(
            |c| c.id.map(Value::I64).unwrap_or(Value::Null),
            |c, v| {
                c.id = v.as_i64();
                Ok(())
            },
        ))
        .with_field(FieldDef::new::<Company>(
            "name",
            FieldRole::Default,
            DeclaredKind::Scalar(ScalarKind::Str),
            |c| Value::Str(c.name.clone()),
            |c, v| match v {
                Value::Str(s) => {
                    c.name = s;
                    Ok(())
                }
                Value::Null => Ok(()),
                other => Err(bad_assignment("name", &other)),
            },
        ));

    let album = TypeModel::new::<Album>("Album")
        .constructed_by(|| Obj::new(Album::default()))
        .with_field(id_field::<Album>(
            |a| a.id.map(Value::I64).unwrap_or(Value::Null),
            |a, v| {
                a.id = v.as_i64();
                Ok(())
            },
        ))
        .with_field(FieldDef::new::<Album>(
            "title",
            FieldRole::Default,
            DeclaredKind::Scalar(ScalarKind::Str),
            |a| Value::Str(a.title.clone()),
            |a, v| match v {
                Value::Str(s) => {
                    a.title = s;
                    Ok(())
                }
                Value::Null => Ok(()),
                other => Err(bad_assignment("title", &other)),
            },
        ))
        .with_field(FieldDef::new::<Album>(
            "cover",
            FieldRole::Child,
            DeclaredKind::object::<Photo>(),
            |a| relation_value(&a.cover),
            |a, v| set_relation(&mut a.cover, v, "cover"),
        ));

    let photo = TypeModel::new::<Photo>("Photo")
        .constructed_by(|| Obj::new(Photo::default()))
        .with_field(id_field::<Photo>(
            |p| p.id.map(Value::I64).unwrap_or(Value::Null),
            |p, v| {
                p.id = v.as_i64();
                Ok(())
            },
        ))
        .with_field(FieldDef::new::<Photo>(
            "caption",
            FieldRole::Default,
            DeclaredKind::Scalar(ScalarKind::Str),
            |p| Value::Str(p.caption.clone()),
            |p, v| match v {
                Value::Str(s) => {
                    p.caption = s;
                    Ok(())
                }
                Value::Null => Ok(()),
                other => Err(bad_assignment("caption", &other)),
            },
        ))
        .with_field(FieldDef::new::<Photo>(
            "album",
            FieldRole::Parent,
            DeclaredKind::object::<Album>(),
            |p| relation_value(&p.album),
            |p, v| set_relation(&mut p.album, v, "album"),
        ));

    let node = TypeModel::new::<Node>("Node")
        .constructed_by(|| Obj::new(Node::default()))
        .with_field(id_field::<Node>(
            |n| n.id.map(Value::I64).unwrap_or(Value::Null),
            |n, v| {
                n.id = v.as_i64();
                Ok(())
            },
        ))
        .with_field(FieldDef::new::<Node>(
            "name",
            FieldRole::Default,
            DeclaredKind::Scalar(ScalarKind::Str),
            |n| Value::Str(n.name.clone()),
            |n, v| match v {
                Value::Str(s) => {
                    n.name = s;
                    Ok(())
                }
                Value::Null => Ok(()),
                other => Err(bad_assignment("name", &other)),
            },
        ))
        .with_field(FieldDef::new::<Node>(
            "next",
            FieldRole::Independent,
            DeclaredKind::object::<Node>(),
            |n| relation_value(&n.next),
            |n, v| set_relation(&mut n.next, v, "next"),
        ));

    let canvas = TypeModel::new::<Canvas>("Canvas")
        .constructed_by(|| Obj::new(Canvas::default()))
        .with_field(id_field::<Canvas>(
            |c| c.id.map(Value::I64).unwrap_or(Value::Null),
            |c, v| {
                c.id = v.as_i64();
                Ok(())
            },
        ))
        .with_field(FieldDef::new::<Canvas>(
            "paint",
            FieldRole::PolymorphicEmbedded,
            DeclaredKind::Dynamic,
            |c| relation_value(&c.paint),
            |c, v| set_relation(&mut c.paint, v, "paint"),
        ));

    let circle = TypeModel::new::<Circle>("Circle")
        .constructed_by(|| Obj::new(Circle::default()))
        .with_field(FieldDef::new::<Circle>(
            "radius",
            FieldRole::Default,
            DeclaredKind::Scalar(ScalarKind::I64),
            |c| Value::I64(c.radius),
            |c, v| {
                c.radius = v.as_i64().unwrap_or(0);
                Ok(())
            },
        ));

    let square = TypeModel::new::<Square>("Square")
        .constructed_by(|| Obj::new(Square::default()))
        .with_field(FieldDef::new::<Square>(
            "side",
            FieldRole::Default,
            DeclaredKind::Scalar(ScalarKind::I64),
            |s| Value::I64(s.side),
            |s, v| {
                s.side = v.as_i64().unwrap_or(0);
                Ok(())
            },
        ));

    let tag = TypeModel::new::<Tag>("Tag")
        .constructed_by(|| Obj::new(Tag::default()))
        .with_field(FieldDef::new::<Tag>(
            "key",
            FieldRole::Key,
            DeclaredKind::Scalar(ScalarKind::Key),
            |t| t.key.clone().map(Value::Key).unwrap_or(Value::Null),
            |t, v| match v {
                Value::Null => Ok(()),
                Value::Key(k) => {
                    t.key = Some(k);
                    Ok(())
                }
                other => Err(bad_assignment("key", &other)),
            },
        ))
        .with_field(FieldDef::new::<Tag>(
            "label",
            FieldRole::Default,
            DeclaredKind::Scalar(ScalarKind::Str),
            |t| Value::Str(t.label.clone()),
            |t, v| match v {
                Value::Str(s) => {
                    t.label = s;
                    Ok(())
                }
                Value::Null => Ok(()),
                other => Err(bad_assignment("label", &other)),
            },
        ));

    let product = TypeModel::new::<Product>("Product")
        .constructed_by(|| Obj::new(Product::default()))
        .with_field(id_field::<Product>(
            |p| p.id.map(Value::I64).unwrap_or(Value::Null),
            |p, v| {
                p.id = v.as_i64();
                Ok(())
            },
        ))
        .with_field(FieldDef::new::<Product>(
            "attrs",
            FieldRole::Default,
            DeclaredKind::map_of(DeclaredKind::Scalar(ScalarKind::Str)),
            |p| {
                Value::Map(
                    p.attrs.iter().map(|(k, v)| (k.clone(), Value::Str(v.clone()))).collect(),
                )
            },
            |p, v| match v {
                Value::Null => Ok(()),
                Value::Map(entries) => {
                    p.attrs = entries
                        .into_iter()
                        .filter_map(|(k, v)| match v {
                            Value::Str(s) => Some((k, s)),
                            _ => None,
                        })
                        .collect();
                    Ok(())
                }
                other => Err(bad_assignment("attrs", &other)),
            },
        ));

    let opaque = TypeModel::new::<Opaque>("Opaque")
        .with_field(id_field::<Opaque>(
            |o| o.id.map(Value::I64).unwrap_or(Value::Null),
            |o, v| {
                o.id = v.as_i64();
                Ok(())
            },
        ))
        .with_field(FieldDef::new::<Opaque>(
            "secret",
            FieldRole::Default,
            DeclaredKind::Scalar(ScalarKind::Str),
            |o| Value::Str(o.secret.clone()),
            |o, v| match v {
                Value::Str(s) => {
                    o.secret = s;
                    Ok(())
                }
                Value::Null => Ok(()),
                other => Err(bad_assignment("secret", &other)),
            },
        ));

    let wrapper = TypeModel::new::<Wrapper>("Wrapper")
        .constructed_by(|| Obj::new(Wrapper::default()))
        .with_field(id_field::<Wrapper>(
            |w| w.id.map(Value::I64).unwrap_or(Value::Null),
            |w, v| {
                w.id = v.as_i64();
                Ok(())
            },
        ))
        .with_field(FieldDef::new::<Wrapper>(
            "inner",
            FieldRole::Embedded,
            DeclaredKind::object::<Node>(),
            |w| relation_value(&w.inner),
            |w, v| set_relation(&mut w.inner, v, "inner"),
        ));

    Arc::new(
        Registry::builder()
            .register(person)
            .register(address)
            .register(company)
            .register(album)
            .register(photo)
            .register(node)
            .register(canvas)
            .register(circle)
            .register(square)
            .register(tag)
            .register(product)
            .register(opaque)
            .register(wrapper)
            .build()
            .expect("Failed to build the test registry"),
    )
}

pub fn memory_session() -> (Arc<MemoryDatastore>, ObjectDatastore) {
    let client = Arc::new(MemoryDatastore::new());
    let session =
        ObjectDatastore::new(Arc::clone(&client) as Arc<dyn DatastoreClient>, registry());
    (client, session)
}

pub fn person(name: &str) -> Obj {
    Obj::new(Person { name: name.to_string(), ..Person::default() })
}
