//! # umbra-daemon — daemon RPC abstraction.
//!
//! The wallet engine talks to a blockchain daemon through the
//! [`DaemonClient`] trait: height and status queries, paged block fetch,
//! and transaction relay. Two implementations are provided:
//!
//! - [`HttpDaemonClient`] — JSON-RPC 2.0 over HTTP with basic auth and a
//!   mandatory request timeout.
//! - [`SimDaemon`] — an in-memory chain with failure injection, for tests
//!   and local development.

pub mod client;
pub mod error;
pub mod http;
pub mod sim;

pub use client::{DaemonClient, DaemonInfo, RpcConnection};
pub use error::DaemonError;
pub use http::HttpDaemonClient;
pub use sim::SimDaemon;
