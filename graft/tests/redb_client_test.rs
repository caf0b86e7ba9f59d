mod common;

use common::*;
use graft::client::redb_store::RedbDatastore;
use graft::value::Obj;
use graft::{DatastoreClient, Key, ObjectDatastore};
use std::sync::Arc;

fn redb_session(name: &str) -> ObjectDatastore {
    let client = RedbDatastore::temp(name).expect("Failed to open a temp database");
    ObjectDatastore::new(Arc::new(client), registry())
}

#[test]
fn it_should_round_trip_through_redb() {
    let mut session = redb_session("mapper_roundtrip");
    let p = Obj::new(Person {
        name: "Ada".into(),
        tags: vec!["math".into(), "code".into()],
        address: Some(Address { line: "1 Loop Rd".into(), zip: 12345 }),
        ..Person::default()
    });
    let key = session.store(&p).expect("Failed to store");
    assert_eq!(key, Key::with_id("Person", 1));

    session.disassociate_all();
    let loaded = session.load_key(&key).unwrap().expect("Failed to reload");
    let loaded_person = loaded.get::<Person>().unwrap();
    assert_eq!(loaded_person.name, "Ada");
    assert_eq!(loaded_person.tags, vec!["math", "code"]);
    assert_eq!(loaded_person.address.unwrap().zip, 12345);
}

#[test]
fn it_should_query_one_kind_through_redb() {
    let mut session = redb_session("mapper_query");
    for name in ["Ada", "Bob"] {
        session.store(&person(name)).unwrap();
    }
    session.store(&Obj::new(Company { id: None, name: "Acme".into() })).unwrap();
    session.disassociate_all();

    let people: Vec<_> =
        session.find::<Person>().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(people.len(), 2);
}

#[test]
fn it_should_keep_relations_across_sessions() {
    let client = Arc::new(RedbDatastore::temp("mapper_sessions").unwrap());
    let a_key;
    {
        let mut writer =
            ObjectDatastore::new(Arc::clone(&client) as Arc<dyn DatastoreClient>, registry());
        let a = Obj::new(Node { name: "a".into(), ..Node::default() });
        let b = Obj::new(Node { name: "b".into(), ..Node::default() });
        a.downcast::<Node>().unwrap().borrow_mut().next = Some(b);
        a_key = writer.store(&a).expect("Failed to store");
    }

    let mut reader = ObjectDatastore::new(client, registry());
    let a2 = reader.load_key(&a_key).unwrap().expect("Failed to load in a fresh session");
    let b2 = a2.get::<Node>().unwrap().next.expect("relation lost");
    assert_eq!(b2.get::<Node>().unwrap().name, "b");
}
