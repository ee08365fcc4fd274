//! Application layer containing the message pipeline.
//!
//! `MessageGateway` is the entry point: it sequences normalization, field
//! extraction, routing, duplicate detection, auditing and publishing for one
//! message at a time, with `ErrorRouter` as the fallback path for anything
//! that cannot be parsed or classified.

pub mod audit;
pub mod dedup;
pub mod error_router;
pub mod extractor;
pub mod gateway;
pub mod key_lock;
pub mod normalizer;
pub mod projection;
pub mod resolver;
