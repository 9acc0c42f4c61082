//! HTTP surface: state, wire types, and route wiring.

pub mod dto;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
