//! Application layer - services that use ports.

pub mod pipeline;
