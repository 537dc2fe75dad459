//! Database access layer
//!
//! Pool bootstrap, fixed-table creation, schema introspection, and the row
//! models shared by the reporting services. The connection pool is always
//! passed explicitly; no module holds global database state.

pub mod init;
pub mod inspect;
pub mod models;

pub use init::init_database;
