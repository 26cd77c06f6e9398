mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{CallLog, Recording, rename, user_configuration, users_source};
use sql_mapper::cache::CacheKey;
use sql_mapper::mapping::BoundSql;
use sql_mapper::plugin::{Pluggable, wrap};
use sql_mapper::prelude::*;

#[derive(Default)]
struct NullExecutor {
    updates: usize,
}

impl Pluggable for NullExecutor {
    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::Executor]
    }
}

#[async_trait]
impl Executor for NullExecutor {
    async fn update(
        &mut self,
        _statement: &Arc<MappedStatement>,
        _parameter: &Parameter,
    ) -> Result<u64, SqlMapperError> {
        self.updates += 1;
        Ok(5)
    }

    async fn query(
        &mut self,
        _statement: &Arc<MappedStatement>,
        _parameter: &Parameter,
        _bounds: RowBounds,
    ) -> Result<Vec<Object>, SqlMapperError> {
        Ok(vec![Object::Value(RowValues::Int(1))])
    }

    async fn query_cursor(
        &mut self,
        _statement: &Arc<MappedStatement>,
        _parameter: &Parameter,
        _bounds: RowBounds,
    ) -> Result<Cursor, SqlMapperError> {
        Err(SqlMapperError::Other("no cursors here".into()))
    }

    async fn flush_statements(
        &mut self,
        _is_rollback: bool,
    ) -> Result<Vec<BatchResult>, SqlMapperError> {
        Ok(Vec::new())
    }

    async fn commit(&mut self, _required: bool) -> Result<(), SqlMapperError> {
        Ok(())
    }

    async fn rollback(&mut self, _required: bool) -> Result<(), SqlMapperError> {
        Ok(())
    }

    async fn close(&mut self, _force_rollback: bool) -> Result<(), SqlMapperError> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn clear_local_cache(&mut self) {}

    fn create_cache_key(
        &self,
        _statement: &MappedStatement,
        _bounds: RowBounds,
        _bound_sql: &BoundSql,
    ) -> CacheKey {
        CacheKey::new()
    }
}

fn address(executor: &dyn Executor) -> *const () {
    std::ptr::from_ref(executor).cast::<()>()
}

fn select_one() -> Result<Arc<MappedStatement>, SqlMapperError> {
    Ok(Arc::new(
        MappedStatement::builder("probe.select", SqlCommandType::Select, "SELECT 1").build()?,
    ))
}

fn update_one() -> Result<Arc<MappedStatement>, SqlMapperError> {
    Ok(Arc::new(
        MappedStatement::builder("probe.update", SqlCommandType::Update, "UPDATE t SET a = 1")
            .build()?,
    ))
}

#[tokio::test]
async fn unmatched_capability_returns_the_same_target() -> Result<(), Box<dyn std::error::Error>> {
    let log = CallLog::default();
    let interceptor: Arc<dyn Interceptor> =
        Recording::new("H", &log, &[statement_handler_ops::PREPARE]);

    let target: Box<dyn Executor> = Box::new(NullExecutor::default());
    let before = address(target.as_ref());
    let mut wrapped = wrap(target, &interceptor)?;
    assert_eq!(before, address(wrapped.as_ref()));

    assert_eq!(wrapped.update(&update_one()?, &Parameter::None).await?, 5);
    assert!(log.entries().is_empty());
    Ok(())
}

#[tokio::test]
async fn only_declared_operations_are_intercepted() -> Result<(), Box<dyn std::error::Error>> {
    let log = CallLog::default();
    let interceptor: Arc<dyn Interceptor> = Recording::new("Q", &log, &[executor_ops::QUERY]);

    let target: Box<dyn Executor> = Box::new(NullExecutor::default());
    let before = address(target.as_ref());
    let mut wrapped = wrap(target, &interceptor)?;
    assert_ne!(before, address(wrapped.as_ref()));

    assert_eq!(wrapped.update(&update_one()?, &Parameter::None).await?, 5);
    assert!(log.entries().is_empty());

    let rows = wrapped
        .query(&select_one()?, &Parameter::None, RowBounds::default())
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(log.entries(), ["Q-before-query", "Q-after-query"]);
    Ok(())
}

#[tokio::test]
async fn last_registered_interceptor_runs_outermost() -> Result<(), Box<dyn std::error::Error>> {
    let source = users_source();
    let log = CallLog::default();
    let configuration = user_configuration(&source)?
        .interceptor(Recording::new("B", &log, &[executor_ops::UPDATE]))
        .interceptor(Recording::new("A", &log, &[executor_ops::UPDATE]))
        .interceptor(Recording::new("H", &log, &[statement_handler_ops::UPDATE]))
        .build()?;
    let factory = SqlSessionFactory::new(configuration);

    let mut session = factory.open_session().await?;
    assert_eq!(session.update("users.rename", rename(1, "ada")).await?, 1);
    session.close().await?;

    assert_eq!(
        log.entries(),
        [
            "A-before-update",
            "B-before-update",
            "H-before-update",
            "H-after-update",
            "B-after-update",
            "A-after-update",
        ]
    );
    assert_eq!(source.stats().executions_of("UPDATE users"), 1);
    Ok(())
}

struct FirstRowOnly;

#[async_trait]
impl Interceptor for FirstRowOnly {
    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::of(&executor_ops::QUERY)]
    }

    async fn intercept(&self, mut invocation: Invocation<'_>) -> Result<Outcome, SqlMapperError> {
        if let Some(bounds) = invocation.bounds_mut() {
            *bounds = RowBounds::new(0, 1);
        }
        invocation.proceed().await
    }
}

struct FixedTimeout(Duration);

#[async_trait]
impl Interceptor for FixedTimeout {
    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::of(&statement_handler_ops::PREPARE)]
    }

    async fn intercept(&self, mut invocation: Invocation<'_>) -> Result<Outcome, SqlMapperError> {
        if let Some(timeout) = invocation.timeout_mut() {
            *timeout = Some(self.0);
        }
        invocation.proceed().await
    }
}

#[tokio::test]
async fn rewritten_arguments_reach_the_target() -> Result<(), Box<dyn std::error::Error>> {
    let source = users_source();
    let configuration = user_configuration(&source)?
        .interceptor(Arc::new(FirstRowOnly))
        .interceptor(Arc::new(FixedTimeout(Duration::from_secs(5))))
        .build()?;
    let factory = SqlSessionFactory::new(configuration);

    let mut session = factory.open_session().await?;
    let users = session.select_list("users.findAll", ()).await?;
    session.close().await?;

    assert_eq!(users.len(), 1);
    let stats = source.stats();
    assert_eq!(stats.timeouts, [Some(Duration::from_secs(5))]);
    assert_eq!(stats.rows_fetched, 1);
    Ok(())
}

/// Answers deletes itself and refuses inserts.
struct Guard;

#[async_trait]
impl Interceptor for Guard {
    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::of(&executor_ops::UPDATE)]
    }

    async fn intercept(&self, invocation: Invocation<'_>) -> Result<Outcome, SqlMapperError> {
        let id = invocation
            .statement()
            .map(|statement| statement.id().to_string())
            .unwrap_or_default();
        if id.ends_with(".delete") {
            return Ok(Outcome::Count(99));
        }
        if id.ends_with(".insert") {
            return Err(SqlMapperError::Other("inserts are disabled".into()));
        }
        invocation.proceed().await
    }
}

#[tokio::test]
async fn interceptors_may_short_circuit_or_fail() -> Result<(), Box<dyn std::error::Error>> {
    let source = users_source();
    let configuration = user_configuration(&source)?
        .interceptor(Arc::new(Guard))
        .build()?;
    let factory = SqlSessionFactory::new(configuration);
    let mut session = factory.open_session().await?;

    assert_eq!(session.delete("users.delete", Parameter::map().with("id", 1)).await?, 99);

    let err = session
        .insert("users.insert", Parameter::map().with("id", 4).with("name", "dee"))
        .await
        .unwrap_err();
    assert!(matches!(&err, SqlMapperError::Other(msg) if msg == "inserts are disabled"), "{err}");

    assert_eq!(session.update("users.rename", rename(2, "bo")).await?, 1);
    session.close().await?;

    let stats = source.stats();
    assert_eq!(stats.prepared.len(), 1);
    assert_eq!(stats.executions_of("DELETE"), 0);
    assert_eq!(stats.executions_of("INSERT"), 0);
    Ok(())
}

struct Misdeclared(Vec<Signature>);

#[async_trait]
impl Interceptor for Misdeclared {
    fn signatures(&self) -> Vec<Signature> {
        self.0.clone()
    }

    async fn intercept(&self, invocation: Invocation<'_>) -> Result<Outcome, SqlMapperError> {
        invocation.proceed().await
    }
}

#[test]
fn invalid_signatures_fail_configuration() {
    let wrong_params = Misdeclared(vec![Signature::new(
        Capability::Executor,
        "update",
        &[ParamType::Statement],
    )]);
    let err = Configuration::builder()
        .interceptor(Arc::new(wrong_params))
        .build()
        .unwrap_err();
    assert!(
        matches!(&err, SqlMapperError::ConfigError(msg) if msg.starts_with("Could not find method on Executor named update")),
        "{err}"
    );

    let unknown = Misdeclared(vec![Signature::new(
        Capability::StatementHandler,
        "explain",
        &[ParamType::Handle],
    )]);
    assert!(matches!(
        Configuration::builder().interceptor(Arc::new(unknown)).build(),
        Err(SqlMapperError::ConfigError(_))
    ));

    let err = Configuration::builder()
        .interceptor(Arc::new(Misdeclared(Vec::new())))
        .build()
        .unwrap_err();
    assert!(
        matches!(&err, SqlMapperError::ConfigError(msg) if msg == "interceptor declares no signatures"),
        "{err}"
    );
}

#[tokio::test]
async fn wrap_reports_invalid_signatures() {
    let interceptor: Arc<dyn Interceptor> = Arc::new(Misdeclared(Vec::new()));
    let target: Box<dyn Executor> = Box::new(NullExecutor::default());
    assert!(matches!(
        wrap(target, &interceptor),
        Err(SqlMapperError::ConfigError(_))
    ));
}
