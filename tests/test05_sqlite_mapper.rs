#![cfg(feature = "sqlite")]

mod common;

use std::path::Path;
use std::sync::Arc;

use common::{User, user_factory};
use sql_mapper::binding::BoxFuture;
use sql_mapper::prelude::*;

const COLUMNS: &str = "id, name, email_address";

fn create_schema(path: &Path) -> Result<(), rusqlite::Error> {
    let conn = rusqlite::Connection::open(path)?;
    conn.execute_batch(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email_address TEXT
        );",
    )
}

fn count_users(
    session: &mut SqlSession,
    _args: Vec<Arg>,
) -> BoxFuture<'_, Result<ReturnValue, SqlMapperError>> {
    Box::pin(async move {
        session
            .select_one("UserMapper.count", ())
            .await
            .map(ReturnValue::One)
    })
}

fn user_mapper() -> Contract {
    Contract::new("UserMapper")
        .operation(OperationDecl::new("findById", ReturnShape::One).param("id"))
        .operation(OperationDecl::new("findAll", ReturnShape::Many))
        .operation(OperationDecl::new(
            "indexed",
            ReturnShape::Map { key: "id".into() },
        ))
        .operation(OperationDecl::new("insert", ReturnShape::RowCount).unnamed_param())
        .operation(
            OperationDecl::new("rename", ReturnShape::Flag)
                .param("id")
                .param("name"),
        )
        .operation(OperationDecl::new("countAll", ReturnShape::One).default_body(count_users))
}

fn mapper_statements() -> Result<Vec<MappedStatement>, SqlMapperError> {
    Ok(vec![
        MappedStatement::builder(
            "UserMapper.findById",
            SqlCommandType::Select,
            format!("SELECT {COLUMNS} FROM users WHERE id = #{{id}}"),
        )
        .result(ResultShape::bean("User"))
        .build()?,
        MappedStatement::builder(
            "UserMapper.findAll",
            SqlCommandType::Select,
            format!("SELECT {COLUMNS} FROM users ORDER BY id"),
        )
        .result(ResultShape::bean("User"))
        .build()?,
        MappedStatement::builder(
            "UserMapper.indexed",
            SqlCommandType::Select,
            format!("SELECT {COLUMNS} FROM users"),
        )
        .result(ResultShape::bean("User"))
        .build()?,
        MappedStatement::builder(
            "UserMapper.count",
            SqlCommandType::Select,
            "SELECT count(*) FROM users",
        )
        .result(ResultShape::scalar(ScalarKind::Int))
        .build()?,
        MappedStatement::builder(
            "UserMapper.insert",
            SqlCommandType::Insert,
            "INSERT INTO users (id, name, email_address) VALUES (#{id}, #{name}, #{emailAddress})",
        )
        .build()?,
        MappedStatement::builder(
            "UserMapper.rename",
            SqlCommandType::Update,
            "UPDATE users SET name = #{name} WHERE id = #{id}",
        )
        .build()?,
    ])
}

async fn session_factory(path: &Path) -> Result<SqlSessionFactory, Box<dyn std::error::Error>> {
    pooled_session_factory(path, 2).await
}

async fn pooled_session_factory(
    path: &Path,
    pool_size: u32,
) -> Result<SqlSessionFactory, Box<dyn std::error::Error>> {
    create_schema(path)?;
    let data_source = SqliteOptionsBuilder::new(path.to_string_lossy().into_owned())
        .pool_size(pool_size)
        .build()
        .await?;
    let settings = Settings {
        map_underscore_to_camel_case: true,
        ..Settings::default()
    };
    let configuration = Configuration::builder()
        .settings(settings)
        .environment(
            Environment::new("sqlite", Arc::new(data_source))
                .with_transaction_factory(Arc::new(DriverTransactionFactory)),
        )
        .object_factory(user_factory())
        .statements(mapper_statements()?)
        .mapper(user_mapper())
        .build()?;
    Ok(SqlSessionFactory::new(configuration))
}

fn user_arg(user: User) -> Arg {
    Arg::from(Box::new(user) as Box<dyn Bean>)
}

async fn seed(factory: &SqlSessionFactory) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = factory.open_session().await?;
    let mut users = session.get_mapper("UserMapper")?;
    for user in [User::new(42, "zed", Some("zed@example.com")), User::new(7, "amy", None)] {
        assert_eq!(users.invoke("insert", vec![user_arg(user)]).await?.row_count()?, 1);
    }
    session.commit().await?;
    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn mapper_reads_what_a_committed_session_wrote() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let factory = session_factory(&dir.path().join("users.db")).await?;
    seed(&factory).await?;

    let mut session = factory.open_session().await?;
    let mut users = session.get_mapper("UserMapper")?;

    let found: Option<User> = users.invoke("findById", vec![Arg::from(42_i64)]).await?.into_one()?;
    assert_eq!(found, Some(User::new(42, "zed", Some("zed@example.com"))));

    let missing: Option<User> = users.invoke("findById", vec![Arg::from(999_i64)]).await?.into_one()?;
    assert_eq!(missing, None);

    let all: Vec<User> = users.invoke("findAll", Vec::new()).await?.into_many()?;
    assert_eq!(all, [User::new(7, "amy", None), User::new(42, "zed", Some("zed@example.com"))]);

    let indexed = users.invoke("indexed", Vec::new()).await?.into_map()?;
    assert_eq!(indexed.len(), 2);
    let amy = indexed.get(&ObjectKey::Int(7)).and_then(|object| object.as_bean::<User>());
    assert_eq!(amy.map(|user| user.name.as_str()), Some("amy"));

    let count: Option<i64> = users.invoke("countAll", Vec::new()).await?.into_one()?;
    assert_eq!(count, Some(2));

    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn rollback_and_unclean_close_discard_writes() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let factory = session_factory(&dir.path().join("users.db")).await?;
    seed(&factory).await?;

    let mut session = factory.open_session().await?;
    let mut users = session.get_mapper("UserMapper")?;
    let renamed = users
        .invoke("rename", vec![Arg::from(42_i64), Arg::from("changed")])
        .await?
        .flag()?;
    assert!(renamed);
    assert!(session.is_dirty());
    session.rollback().await?;
    assert!(!session.is_dirty());

    let mut users = session.get_mapper("UserMapper")?;
    users
        .invoke("insert", vec![user_arg(User::new(99, "temp", None))])
        .await?;
    session.close().await?;

    let mut session = factory.open_session().await?;
    let zed: Option<User> = session.select_one_as("UserMapper.findById", 42_i64).await?;
    assert_eq!(zed.map(|user| user.name), Some("zed".to_string()));
    let temp: Option<User> = session.select_one_as("UserMapper.findById", 99_i64).await?;
    assert_eq!(temp, None);
    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn auto_commit_sessions_persist_without_commit() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let factory = session_factory(&dir.path().join("users.db")).await?;

    let mut session = factory
        .open_session_with(ExecutorType::Reuse, None, true)
        .await?;
    session
        .insert("UserMapper.insert", Box::new(User::new(1, "solo", None)) as Box<dyn Bean>)
        .await?;
    session.close().await?;

    let mut session = factory.open_session().await?;
    let count: Option<i64> = session.select_one_as("UserMapper.count", ()).await?;
    assert_eq!(count, Some(1));
    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn cursor_streams_rows_from_sqlite() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let factory = session_factory(&dir.path().join("users.db")).await?;
    seed(&factory).await?;

    let mut session = factory.open_session().await?;
    let mut cursor = session.select_cursor("UserMapper.findAll", ()).await?;
    let first = cursor.fetch_next().await?.and_then(Object::into_bean::<User>);
    assert_eq!(first.map(|user| user.id), Some(7));
    let rest = cursor.fetch_all().await?;
    assert_eq!(rest.len(), 1);
    assert!(cursor.is_consumed().await);
    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn dropped_sessions_hand_back_a_clean_connection() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let factory = pooled_session_factory(&dir.path().join("users.db"), 1).await?;
    seed(&factory).await?;

    {
        let mut session = factory.open_session().await?;
        let mut users = session.get_mapper("UserMapper")?;
        users
            .invoke("insert", vec![user_arg(User::new(5, "dropped", None))])
            .await?;
        // neither committed nor closed
    }

    let mut session = factory
        .open_session_with(ExecutorType::Simple, None, true)
        .await?;
    let count: Option<i64> = session.select_one_as("UserMapper.count", ()).await?;
    assert_eq!(count, Some(2));
    session.close().await?;

    let mut session = factory.open_session().await?;
    session
        .insert("UserMapper.insert", Box::new(User::new(6, "kept", None)) as Box<dyn Bean>)
        .await?;
    session.commit().await?;
    session.close().await?;

    let mut session = factory.open_session().await?;
    let ids: Vec<User> = session.select_list_as("UserMapper.findAll", ()).await?;
    assert_eq!(ids.iter().map(|user| user.id).collect::<Vec<_>>(), [6, 7, 42]);
    session.close().await?;
    Ok(())
}
