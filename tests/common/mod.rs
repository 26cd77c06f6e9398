#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use sql_mapper::plugin::Operation;
use sql_mapper::prelude::*;
use sql_mapper::test_utils::MockDataSource;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email_address: Option<String>,
}

impl User {
    pub fn new(id: i64, name: &str, email: Option<&str>) -> Self {
        Self {
            id,
            name: name.to_string(),
            email_address: email.map(ToString::to_string),
        }
    }
}

impl Bean for User {
    fn type_name(&self) -> &str {
        "User"
    }

    fn set_property(&mut self, name: &str, value: RowValues) -> Result<(), SqlMapperError> {
        match (name, value) {
            ("id", RowValues::Int(id)) => self.id = id,
            ("name", RowValues::Text(text)) => self.name = text,
            ("emailAddress", RowValues::Text(text)) => self.email_address = Some(text),
            ("emailAddress", RowValues::Null) => self.email_address = None,
            (other, value) => {
                return Err(SqlMapperError::Other(format!(
                    "User cannot take {value:?} for {other}"
                )));
            }
        }
        Ok(())
    }

    fn get_property(&self, name: &str) -> Option<RowValues> {
        match name {
            "id" => Some(RowValues::Int(self.id)),
            "name" => Some(RowValues::Text(self.name.clone())),
            "emailAddress" => Some(
                self.email_address
                    .clone()
                    .map_or(RowValues::Null, RowValues::Text),
            ),
            _ => None,
        }
    }

    fn has_property(&self, name: &str) -> bool {
        matches!(name, "id" | "name" | "emailAddress")
    }
}

pub fn user_factory() -> Arc<dyn ObjectFactory> {
    let mut factory = DefaultObjectFactory::new();
    factory.register_default::<User>("User");
    Arc::new(factory)
}

pub fn user_rows() -> Vec<Vec<RowValues>> {
    vec![
        vec![RowValues::Int(1), RowValues::Text("ann".into())],
        vec![RowValues::Int(2), RowValues::Text("bob".into())],
        vec![RowValues::Int(3), RowValues::Text("cy".into())],
    ]
}

/// Mock answering `FROM users` with three (id, name) rows.
pub fn users_source() -> MockDataSource {
    MockDataSource::new().with_rows("FROM users", &["id", "name"], user_rows())
}

pub fn environment(source: &MockDataSource) -> Environment {
    Environment::new("test", Arc::new(source.clone()))
}

pub fn driver_environment(source: &MockDataSource) -> Environment {
    environment(source).with_transaction_factory(Arc::new(DriverTransactionFactory))
}

/// `users.findAll`, `users.findById`, `users.rename`, `users.insert` and `users.delete`.
pub fn user_statements() -> Result<Vec<MappedStatement>, SqlMapperError> {
    Ok(vec![
        MappedStatement::builder(
            "users.findAll",
            SqlCommandType::Select,
            "SELECT id, name FROM users",
        )
        .result(ResultShape::bean("User"))
        .build()?,
        MappedStatement::builder(
            "users.findById",
            SqlCommandType::Select,
            "SELECT id, name FROM users WHERE id = #{id}",
        )
        .result(ResultShape::bean("User"))
        .build()?,
        MappedStatement::builder(
            "users.rename",
            SqlCommandType::Update,
            "UPDATE users SET name = #{name} WHERE id = #{id}",
        )
        .build()?,
        MappedStatement::builder(
            "users.insert",
            SqlCommandType::Insert,
            "INSERT INTO users (id, name) VALUES (#{id}, #{name})",
        )
        .build()?,
        MappedStatement::builder(
            "users.delete",
            SqlCommandType::Delete,
            "DELETE FROM users WHERE id = #{id}",
        )
        .build()?,
    ])
}

pub fn rename(id: i64, name: &str) -> Parameter {
    Parameter::map().with("id", id).with("name", name)
}

/// Builder preloaded with the user statements, the user factory and the mock's environment.
pub fn user_configuration(source: &MockDataSource) -> Result<ConfigurationBuilder, SqlMapperError> {
    Ok(Configuration::builder()
        .environment(environment(source))
        .object_factory(user_factory())
        .statements(user_statements()?))
}

/// Shared, ordered log written by test interceptors.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Logs `<label>-before` and `<label>-after` around every operation it declares.
pub struct Recording {
    pub label: &'static str,
    pub log: CallLog,
    pub signatures: Vec<Signature>,
}

impl Recording {
    pub fn new(label: &'static str, log: &CallLog, operations: &[Operation]) -> Arc<Self> {
        Arc::new(Self {
            label,
            log: log.clone(),
            signatures: operations.iter().map(Signature::of).collect(),
        })
    }
}

#[async_trait]
impl Interceptor for Recording {
    fn signatures(&self) -> Vec<Signature> {
        self.signatures.clone()
    }

    async fn intercept(&self, invocation: Invocation<'_>) -> Result<Outcome, SqlMapperError> {
        let name = invocation.operation().name;
        self.log.push(format!("{}-before-{name}", self.label));
        let outcome = invocation.proceed().await;
        self.log.push(format!("{}-after-{name}", self.label));
        outcome
    }
}
