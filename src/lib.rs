//! identlab - a MySQL identifier-injection lab.
//!
//! A small HTTP service contrasting an allow-listed column lookup with one
//! that splices a caller-supplied column name into the SQL text.

pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod query;
pub mod routes;
pub mod state;
pub mod store;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
pub use store::{FruitStore, MySqlStore, ParamMode};
