//! Testing utilities and mock implementations
//!
//! This module provides mock transport collaborators for exercising the
//! handshake and subscription logic without sockets, TLS or a broker.

pub mod mocks;

pub use mocks::*;
