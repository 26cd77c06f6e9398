mod common;

use std::collections::BTreeSet;

use common::User;
use sql_mapper::prelude::*;

#[test]
fn abstract_containers_get_concrete_types() -> Result<(), Box<dyn std::error::Error>> {
    let factory = DefaultObjectFactory::new();

    for key in [TypeKey::Iterable, TypeKey::Collection, TypeKey::List] {
        assert!(matches!(factory.create(&key)?, Object::Sequence(_)), "{key}");
    }
    assert!(matches!(factory.create(&TypeKey::Map)?, Object::Map(_)));
    assert!(matches!(factory.create(&TypeKey::Set)?, Object::Set(_)));
    assert!(matches!(factory.create(&TypeKey::SortedSet)?, Object::SortedSet(_)));
    Ok(())
}

#[test]
fn sorted_set_iterates_in_natural_order() -> Result<(), Box<dyn std::error::Error>> {
    let factory = DefaultObjectFactory::new();
    let mut set = factory.create(&TypeKey::SortedSet)?;
    for name in ["carol", "alice", "bob", "alice"] {
        set.push(Object::Value(RowValues::Text(name.into())))?;
    }

    let Object::SortedSet(inner) = set else {
        panic!("expected a sorted set");
    };
    let expected: BTreeSet<ObjectKey> = ["alice", "bob", "carol"].into_iter().map(ObjectKey::from).collect();
    assert_eq!(inner, expected);
    let ordered: Vec<ObjectKey> = inner.into_iter().collect();
    assert_eq!(ordered.first(), Some(&ObjectKey::from("alice")));
    assert_eq!(ordered.last(), Some(&ObjectKey::from("carol")));
    Ok(())
}

#[test]
fn containers_accept_an_initial_capacity() -> Result<(), Box<dyn std::error::Error>> {
    let factory = DefaultObjectFactory::new();
    let list = factory.create_with(&TypeKey::List, &[ScalarKind::Int], &[RowValues::Int(16)])?;
    assert!(list.is_empty());

    let err = factory
        .create_with(&TypeKey::List, &[ScalarKind::Int], &[RowValues::Int(-1)])
        .unwrap_err();
    assert_eq!(err.type_name, "List");
    assert_eq!(err.arg_types, ["Int"]);
    assert!(err.cause.contains("illegal capacity"), "{err}");
    Ok(())
}

#[test]
fn registered_beans_are_built_by_name() -> Result<(), Box<dyn std::error::Error>> {
    let mut factory = DefaultObjectFactory::new();
    factory.register_default::<User>("User");
    factory.register(
        "User",
        Constructor::public([ScalarKind::Int, ScalarKind::Text], |args| {
            match args {
                [RowValues::Int(id), RowValues::Text(name)] => {
                    Ok(Box::new(User::new(*id, name, None)) as Box<dyn Bean>)
                }
                other => Err(format!("unexpected arguments {other:?}")),
            }
        }),
    );

    let empty = factory.create(&TypeKey::named("User"))?;
    assert_eq!(empty.as_bean::<User>(), Some(&User::default()));

    let built = factory.create_with(
        &TypeKey::named("User"),
        &[ScalarKind::Int, ScalarKind::Text],
        &[RowValues::Int(7), RowValues::Text("gil".into())],
    )?;
    assert_eq!(built.into_bean::<User>(), Some(User::new(7, "gil", None)));
    Ok(())
}

#[test]
fn failures_carry_type_argument_types_and_values() {
    let factory = DefaultObjectFactory::new();

    let err = factory.create(&TypeKey::named("Ghost")).unwrap_err();
    assert_eq!(err.type_name, "Ghost");
    assert!(err.arg_types.is_empty());
    assert!(err.cause.contains("no default constructor"), "{err}");

    let err = factory
        .create_with(
            &TypeKey::named("Ghost"),
            &[ScalarKind::Int, ScalarKind::Text],
            &[RowValues::Int(1), RowValues::Text("boo".into())],
        )
        .unwrap_err();
    assert_eq!(err.arg_types, ["Int", "Text"]);
    assert_eq!(err.arg_values.len(), 2);
    let message = err.to_string();
    assert!(message.starts_with("Error instantiating Ghost with invalid types (Int,Text)"), "{message}");
}

#[test]
fn private_constructors_need_private_access() {
    let mut factory = DefaultObjectFactory::new().with_private_access(false);
    factory.register(
        "Secret",
        Constructor::private(Vec::new(), |_| Ok(Box::new(User::default()) as Box<dyn Bean>)),
    );
    let err = factory.create(&TypeKey::named("Secret")).unwrap_err();
    assert!(err.cause.contains("private access is disabled"), "{err}");

    let factory = factory.with_private_access(true);
    assert!(factory.create(&TypeKey::named("Secret")).is_ok());
}

#[test]
fn only_collection_types_report_as_collections() {
    let factory = DefaultObjectFactory::new();
    for key in [TypeKey::Collection, TypeKey::List, TypeKey::Set, TypeKey::SortedSet] {
        assert!(factory.is_collection(&key), "{key}");
    }
    for key in [TypeKey::Map, TypeKey::Scalar(ScalarKind::Int), TypeKey::named("User")] {
        assert!(!factory.is_collection(&key), "{key}");
    }
}
