//! Shared utilities for the Kobeya collaborative code room server.
//!
//! Currently holds time helpers (JST timestamps, clock abstraction) and
//! logging setup used by the server binary and its tests.

pub mod logger;
pub mod time;
