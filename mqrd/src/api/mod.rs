//! HTTP surface of the service.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! The only functional endpoint is `POST /micro-qrs/decode`; health, docs and metrics routes are
//! wired up in [`crate::build_router`].

pub mod handlers;
pub mod models;
