mod common;

use common::{environment, rename, user_factory, users_source};
use sql_mapper::prelude::*;
use sql_mapper::test_utils::MockDataSource;

fn cached_configuration(
    source: &MockDataSource,
    settings: Settings,
) -> Result<std::sync::Arc<Configuration>, SqlMapperError> {
    Configuration::builder()
        .settings(settings)
        .environment(environment(source))
        .object_factory(user_factory())
        .perpetual_cache("users")
        .statement(
            MappedStatement::builder(
                "users.findAll",
                SqlCommandType::Select,
                "SELECT id, name FROM users",
            )
            .result(ResultShape::bean("User"))
            .cache_namespace("users")
            .build()?,
        )
        .statement(
            MappedStatement::builder(
                "users.uncached",
                SqlCommandType::Select,
                "SELECT id, name FROM users WHERE 1 = 1",
            )
            .result(ResultShape::bean("User"))
            .cache_namespace("users")
            .use_cache(false)
            .build()?,
        )
        .statement(
            MappedStatement::builder(
                "users.rename",
                SqlCommandType::Update,
                "UPDATE users SET name = #{name} WHERE id = #{id}",
            )
            .cache_namespace("users")
            .build()?,
        )
        .build()
}

fn selects(source: &MockDataSource) -> usize {
    source.stats().executions_of("FROM users")
}

#[tokio::test]
async fn committed_results_are_shared_between_sessions() -> Result<(), Box<dyn std::error::Error>> {
    let source = users_source();
    let factory = SqlSessionFactory::new(cached_configuration(&source, Settings::default())?);

    let mut first = factory.open_session().await?;
    assert_eq!(first.select_list("users.findAll", ()).await?.len(), 3);
    first.commit().await?;
    first.close().await?;
    assert_eq!(selects(&source), 1);

    let mut second = factory.open_session().await?;
    assert_eq!(second.select_list("users.findAll", ()).await?.len(), 3);
    assert_eq!(selects(&source), 1);
    second.close().await?;
    Ok(())
}

#[tokio::test]
async fn staged_results_stay_private_until_commit() -> Result<(), Box<dyn std::error::Error>> {
    let source = users_source();
    let factory = SqlSessionFactory::new(cached_configuration(&source, Settings::default())?);

    let mut writer = factory.open_session().await?;
    let mut reader = factory.open_session().await?;

    writer.select_list("users.findAll", ()).await?;
    reader.select_list("users.findAll", ()).await?;
    assert_eq!(selects(&source), 2);

    writer.commit().await?;
    let mut late = factory.open_session().await?;
    late.select_list("users.findAll", ()).await?;
    assert_eq!(selects(&source), 2);

    for mut session in [writer, reader, late] {
        session.close().await?;
    }
    Ok(())
}

#[tokio::test]
async fn flushing_writes_invalidate_the_namespace() -> Result<(), Box<dyn std::error::Error>> {
    let source = users_source();
    let factory = SqlSessionFactory::new(cached_configuration(&source, Settings::default())?);

    let mut session = factory.open_session().await?;
    session.select_list("users.findAll", ()).await?;
    session.commit().await?;
    session.close().await?;

    let mut session = factory.open_session().await?;
    session.update("users.rename", rename(1, "ada")).await?;
    session.commit().await?;
    session.close().await?;

    let mut session = factory.open_session().await?;
    session.select_list("users.findAll", ()).await?;
    assert_eq!(selects(&source), 2);
    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn rolled_back_sessions_publish_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let source = users_source();
    let factory = SqlSessionFactory::new(cached_configuration(&source, Settings::default())?);

    let mut session = factory.open_session().await?;
    session.select_list("users.findAll", ()).await?;
    session.rollback_with(true).await?;
    session.close().await?;

    let mut session = factory.open_session().await?;
    session.select_list("users.findAll", ()).await?;
    assert_eq!(selects(&source), 2);
    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn opted_out_statements_and_disabled_caching_always_execute()
-> Result<(), Box<dyn std::error::Error>> {
    let source = users_source();
    let factory = SqlSessionFactory::new(cached_configuration(&source, Settings::default())?);
    for _ in 0..2 {
        let mut session = factory.open_session().await?;
        session.select_list("users.uncached", ()).await?;
        session.close().await?;
    }
    assert_eq!(source.stats().executions_of("WHERE 1 = 1"), 2);

    let source = users_source();
    let settings = Settings {
        cache_enabled: false,
        ..Settings::default()
    };
    let factory = SqlSessionFactory::new(cached_configuration(&source, settings)?);
    for _ in 0..2 {
        let mut session = factory.open_session().await?;
        session.select_list("users.findAll", ()).await?;
        session.commit().await?;
        session.close().await?;
    }
    assert_eq!(selects(&source), 2);
    Ok(())
}

#[test]
fn statements_must_name_a_registered_cache() -> Result<(), Box<dyn std::error::Error>> {
    let err = Configuration::builder()
        .statement(
            MappedStatement::builder("orders.all", SqlCommandType::Select, "SELECT * FROM orders")
                .cache_namespace("orders")
                .build()?,
        )
        .build()
        .unwrap_err();
    assert!(
        matches!(&err, SqlMapperError::ConfigError(msg) if msg.contains("No cache for namespace 'orders'")),
        "{err}"
    );

    let err = Configuration::builder()
        .perpetual_cache("users")
        .lru_cache("users", 8)
        .build()
        .unwrap_err();
    assert!(matches!(err, SqlMapperError::ConfigError(_)), "{err}");
    Ok(())
}
