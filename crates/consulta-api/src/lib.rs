//! Consulta API Layer
//!
//! HTTP handlers and DTOs for the settlement core REST API.
//!
//! # Structure
//!
//! - `dto`: request and response types
//! - `handlers`: one module per resource
//! - `routes`: registration table mapping paths to handlers and access levels
//! - `state`: shared [`AppState`]

pub mod dto;
pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::configure;
pub use state::AppState;
