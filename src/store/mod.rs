//! Postgres-backed persistence: connection pool bootstrap and the link
//! store that backs the discovery lookup.

pub mod link_store;
pub mod pool;

pub use link_store::LinkStore;
pub use pool::build_pool;
