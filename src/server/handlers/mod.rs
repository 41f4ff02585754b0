//! HTTP handlers for the server.

pub mod layout;
pub mod parity;
pub mod render;
pub mod templates;
