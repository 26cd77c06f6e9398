use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::CacheKey;
use crate::driver::{Connection, Handle};
use crate::error::{BatchResult, SqlMapperError};
use crate::executor::{Cursor, Executor, StatementHandler};
use crate::mapping::{BoundSql, MappedStatement, Parameter};
use crate::reflection::Object;
use crate::types::RowBounds;

use super::Pluggable;
use super::invocation::{Args, Interceptor, Invocation, Outcome, Target};
use super::signature::{
    Capability, Operation, SignatureMap, executor_ops, statement_handler_ops,
};

/// A component kind the interceptor chain can wrap.
pub trait Proxyable: Pluggable + Send {
    const CAPABILITY: Capability;

    fn proxy(
        self: Box<Self>,
        interceptor: Arc<dyn Interceptor>,
        signatures: Arc<SignatureMap>,
    ) -> Box<Self>;
}

impl Proxyable for dyn Executor {
    const CAPABILITY: Capability = Capability::Executor;

    fn proxy(
        self: Box<Self>,
        interceptor: Arc<dyn Interceptor>,
        signatures: Arc<SignatureMap>,
    ) -> Box<Self> {
        Box::new(ExecutorProxy {
            target: self,
            interceptor,
            signatures,
        })
    }
}

impl Proxyable for dyn StatementHandler {
    const CAPABILITY: Capability = Capability::StatementHandler;

    fn proxy(
        self: Box<Self>,
        interceptor: Arc<dyn Interceptor>,
        signatures: Arc<SignatureMap>,
    ) -> Box<Self> {
        Box::new(StatementHandlerProxy {
            target: self,
            interceptor,
            signatures,
        })
    }
}

/// Executor routed through one interceptor.
pub struct ExecutorProxy {
    target: Box<dyn Executor>,
    interceptor: Arc<dyn Interceptor>,
    signatures: Arc<SignatureMap>,
}

impl ExecutorProxy {
    async fn invoke<'a>(
        &'a mut self,
        operation: Operation,
        args: Args<'a>,
    ) -> Result<Outcome, SqlMapperError> {
        let invocation = Invocation::new(Target::Executor(self.target.as_mut()), operation, args);
        self.interceptor.intercept(invocation).await
    }

    async fn flag(&mut self, operation: Operation, flag: bool) -> Result<Outcome, SqlMapperError> {
        self.invoke(operation, Args::Flag(flag)).await
    }
}

impl Pluggable for ExecutorProxy {
    fn capabilities(&self) -> Vec<Capability> {
        self.target.capabilities()
    }
}

#[async_trait]
impl Executor for ExecutorProxy {
    async fn update(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
    ) -> Result<u64, SqlMapperError> {
        if !self.signatures.matches(&executor_ops::UPDATE) {
            return self.target.update(statement, parameter).await;
        }
        self.invoke(executor_ops::UPDATE, Args::Update { statement, parameter })
            .await?
            .into_count()
    }

    async fn query(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
    ) -> Result<Vec<Object>, SqlMapperError> {
        if !self.signatures.matches(&executor_ops::QUERY) {
            return self.target.query(statement, parameter, bounds).await;
        }
        let args = Args::Query {
            statement,
            parameter,
            bounds,
        };
        self.invoke(executor_ops::QUERY, args).await?.into_objects()
    }

    async fn query_cursor(
        &mut self,
        statement: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
    ) -> Result<Cursor, SqlMapperError> {
        if !self.signatures.matches(&executor_ops::QUERY_CURSOR) {
            return self.target.query_cursor(statement, parameter, bounds).await;
        }
        let args = Args::Query {
            statement,
            parameter,
            bounds,
        };
        self.invoke(executor_ops::QUERY_CURSOR, args)
            .await?
            .into_cursor()
    }

    async fn flush_statements(
        &mut self,
        is_rollback: bool,
    ) -> Result<Vec<BatchResult>, SqlMapperError> {
        if !self.signatures.matches(&executor_ops::FLUSH_STATEMENTS) {
            return self.target.flush_statements(is_rollback).await;
        }
        self.flag(executor_ops::FLUSH_STATEMENTS, is_rollback)
            .await?
            .into_batch_results()
    }

    async fn commit(&mut self, required: bool) -> Result<(), SqlMapperError> {
        if !self.signatures.matches(&executor_ops::COMMIT) {
            return self.target.commit(required).await;
        }
        self.flag(executor_ops::COMMIT, required).await?.into_unit()
    }

    async fn rollback(&mut self, required: bool) -> Result<(), SqlMapperError> {
        if !self.signatures.matches(&executor_ops::ROLLBACK) {
            return self.target.rollback(required).await;
        }
        self.flag(executor_ops::ROLLBACK, required).await?.into_unit()
    }

    async fn close(&mut self, force_rollback: bool) -> Result<(), SqlMapperError> {
        if !self.signatures.matches(&executor_ops::CLOSE) {
            return self.target.close(force_rollback).await;
        }
        self.flag(executor_ops::CLOSE, force_rollback)
            .await?
            .into_unit()
    }

    fn is_closed(&self) -> bool {
        self.target.is_closed()
    }

    fn clear_local_cache(&mut self) {
        self.target.clear_local_cache();
    }

    fn create_cache_key(
        &self,
        statement: &MappedStatement,
        bounds: RowBounds,
        bound_sql: &BoundSql,
    ) -> CacheKey {
        self.target.create_cache_key(statement, bounds, bound_sql)
    }
}

/// Statement handler routed through one interceptor.
pub struct StatementHandlerProxy {
    target: Box<dyn StatementHandler>,
    interceptor: Arc<dyn Interceptor>,
    signatures: Arc<SignatureMap>,
}

impl StatementHandlerProxy {
    async fn invoke<'a>(
        &'a mut self,
        operation: Operation,
        args: Args<'a>,
    ) -> Result<Outcome, SqlMapperError> {
        let invocation = Invocation::new(
            Target::StatementHandler(self.target.as_mut()),
            operation,
            args,
        );
        self.interceptor.intercept(invocation).await
    }
}

impl Pluggable for StatementHandlerProxy {
    fn capabilities(&self) -> Vec<Capability> {
        self.target.capabilities()
    }
}

#[async_trait]
impl StatementHandler for StatementHandlerProxy {
    fn statement(&self) -> &Arc<MappedStatement> {
        self.target.statement()
    }

    fn bound_sql(&self) -> &BoundSql {
        self.target.bound_sql()
    }

    async fn prepare(
        &mut self,
        connection: &mut dyn Connection,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn Handle>, SqlMapperError> {
        if !self.signatures.matches(&statement_handler_ops::PREPARE) {
            return self.target.prepare(connection, timeout).await;
        }
        let args = Args::Prepare {
            connection,
            timeout,
        };
        self.invoke(statement_handler_ops::PREPARE, args)
            .await?
            .into_handle()
    }

    async fn parameterize(&mut self, handle: &mut dyn Handle) -> Result<(), SqlMapperError> {
        if !self.signatures.matches(&statement_handler_ops::PARAMETERIZE) {
            return self.target.parameterize(handle).await;
        }
        self.invoke(statement_handler_ops::PARAMETERIZE, Args::Handle(handle))
            .await?
            .into_unit()
    }

    async fn update(&mut self, handle: &mut dyn Handle) -> Result<u64, SqlMapperError> {
        if !self.signatures.matches(&statement_handler_ops::UPDATE) {
            return self.target.update(handle).await;
        }
        self.invoke(statement_handler_ops::UPDATE, Args::Handle(handle))
            .await?
            .into_count()
    }

    async fn query(&mut self, handle: &mut dyn Handle) -> Result<Vec<Object>, SqlMapperError> {
        if !self.signatures.matches(&statement_handler_ops::QUERY) {
            return self.target.query(handle).await;
        }
        self.invoke(statement_handler_ops::QUERY, Args::Handle(handle))
            .await?
            .into_objects()
    }

    async fn query_cursor(&mut self, handle: Box<dyn Handle>) -> Result<Cursor, SqlMapperError> {
        if !self.signatures.matches(&statement_handler_ops::QUERY_CURSOR) {
            return self.target.query_cursor(handle).await;
        }
        self.invoke(statement_handler_ops::QUERY_CURSOR, Args::OwnedHandle(handle))
            .await?
            .into_cursor()
    }

    async fn batch(&mut self, handle: &mut dyn Handle) -> Result<(), SqlMapperError> {
        if !self.signatures.matches(&statement_handler_ops::BATCH) {
            return self.target.batch(handle).await;
        }
        self.invoke(statement_handler_ops::BATCH, Args::Handle(handle))
            .await?
            .into_unit()
    }
}
