//! Adapters - Concrete implementations of ports plus the HTTP inbound side.

pub mod cmd;
pub mod forward;
pub mod fs;
pub mod http;

#[cfg(feature = "probe")]
pub mod probe;
