//! HTTP transport: routes and server loop.

pub mod routes;
pub mod server;

pub use server::{ServerConfig, serve};
