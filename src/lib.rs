//! Floodgate - Distributed Request-Admission Gate
//!
//! This crate decides in O(1) time whether a request from a given client
//! identifier may proceed, combining an instantaneous burst limit (token
//! bucket) with a long-term sustained-rate limit (sliding window counter),
//! both backed by a shared Redis store so the decision holds across every
//! serving process. An optional adaptive governor scales a separate global
//! throughput ceiling from service health metrics.

pub mod adaptive;
pub mod config;
pub mod error;
pub mod health;
pub mod limiter;
pub mod store;
