//! Domain layer: message and audit types, routing rules, path expressions
//! and the outbound ports the pipeline depends on.

pub mod message;
pub mod path;
pub mod ports;
pub mod routing;
