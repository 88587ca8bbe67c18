//! Domain layer - job drafting and session state.

pub mod job;
pub mod session;
