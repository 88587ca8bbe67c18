//! Ports - traits the pipeline depends on.

pub mod forwarder;
pub mod runner;
