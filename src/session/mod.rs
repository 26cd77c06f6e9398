//! Sessions and the configuration they run on.

pub mod configuration;
pub mod environment;
pub mod factory;
pub mod settings;
pub mod sql_session;

pub use configuration::{Configuration, ConfigurationBuilder};
pub use environment::Environment;
pub use factory::SqlSessionFactory;
pub use settings::{LocalCacheScope, Settings};
pub use sql_session::{ResultHandler, SqlSession};
