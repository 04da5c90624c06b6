//! Database access for the configuration schemas
//!
//! [`Database`] wraps one SQLite connection per logical schema and offers the
//! descriptor-driven row operations the repositories build on.
//! [`SchemaPool`] hands out shared connections by schema name.

mod database;
mod pool;

pub use database::Database;
pub use pool::SchemaPool;
