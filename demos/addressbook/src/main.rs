use graft::model::{FieldDef, FieldRole, Registry, TypeModel};
use graft::value::{DeclaredKind, Obj, ScalarKind, Value};
use graft::{info, FilterOp, MapperError, NativeValue, ObjectDatastore, RedbDatastore};
use std::sync::Arc;

#[derive(Clone, Default)]
struct Contact {
    id: Option<i64>,
    name: String,
    email: String,
    home: Option<Address>,
}

#[derive(Clone, Default)]
struct Address {
    city: String,
    zip: i64,
}

fn registry() -> Result<Arc<Registry>, MapperError> {
    let contact = TypeModel::new::<Contact>("Contact")
        .constructed_by(|| Obj::new(Contact::default()))
        .with_field(FieldDef::new::<Contact>(
            "id",
            FieldRole::Id,
            DeclaredKind::Scalar(ScalarKind::I64),
            |c| c.id.map(Value::I64).unwrap_or(Value::Null),
            |c, v| {
                c.id = v.as_i64();
                Ok(())
            },
        ))
        .with_field(FieldDef::new::<Contact>(
            "name",
            FieldRole::Default,
            DeclaredKind::Scalar(ScalarKind::Str),
            |c| Value::Str(c.name.clone()),
            |c, v| {
                c.name = v.as_str().unwrap_or_default().to_string();
                Ok(())
            },
        ))
        .with_field(FieldDef::new::<Contact>(
            "email",
            FieldRole::Default,
            DeclaredKind::Scalar(ScalarKind::Str),
            |c| Value::Str(c.email.clone()),
            |c, v| {
                c.email = v.as_str().unwrap_or_default().to_string();
                Ok(())
            },
        ))
        .with_field(FieldDef::new::<Contact>(
            "home",
            FieldRole::Embedded,
            DeclaredKind::object::<Address>(),
            |c| c.home.clone().map(|a| Value::Object(Obj::new(a))).unwrap_or(Value::Null),
            |c, v| {
                c.home = v.as_object().and_then(|o| o.get::<Address>());
                Ok(())
            },
        ));

    let address = TypeModel::new::<Address>("Address")
        .constructed_by(|| Obj::new(Address::default()))
        .with_field(FieldDef::new::<Address>(
            "city",
            FieldRole::Default,
            DeclaredKind::Scalar(ScalarKind::Str),
            |a| Value::Str(a.city.clone()),
            |a, v| {
                a.city = v.as_str().unwrap_or_default().to_string();
                Ok(())
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

    Ok(Arc::new(Registry::builder().register(contact).register(address).build()?))
}

fn contact(name: &str, email: &str, city: &str, zip: i64) -> Obj {
    Obj::new(Contact {
        id: None,
        name: name.to_string(),
        email: email.to_string(),
        home: Some(Address { city: city.to_string(), zip }),
    })
}

fn main() -> Result<(), MapperError> {
    let client = Arc::new(RedbDatastore::temp("addressbook")?);
    let mut session = ObjectDatastore::new(client, registry()?);

    let keys = session.store_all(&[
        contact("Ada Lovelace", "ada@example.org", "London", 10001),
        contact("Grace Hopper", "grace@example.org", "Arlington", 22201),
        contact("Edsger Dijkstra", "edsger@example.org", "Nuenen", 55674),
    ])?;
    info!("stored {} contacts", keys.len());

    session.disassociate_all();
    for loaded in session.load_all::<Contact>(vec![1i64, 2, 3])?.into_iter().flatten() {
        let c = loaded.get::<Contact>().expect("contact expected");
        let city = c.home.map(|h| h.city).unwrap_or_default();
        info!("{} <{}> from {}", c.name, c.email, city);
    }

    let hits: Vec<Obj> = session
        .find_filtered::<Contact>("name", FilterOp::Eq(NativeValue::Str("Grace Hopper".into())))?
        .collect::<Result<_, _>>()?;
    info!("found {} contact(s) named Grace Hopper", hits.len());

    if let Some(grace) = hits.first() {
        grace
            .downcast::<Contact>()
            .expect("contact expected")
            .borrow_mut()
            .email = "grace@navy.mil".into();
        session.update(grace)?;
        info!("updated {}", session.associated_key(grace).expect("associated"));
    }

    Ok(())
}
