//! Data Transfer Objects for the collaborative code room server.
//!
//! DTOs are organized by protocol:
//! - `websocket`: WebSocket event DTOs
//! - `http`: HTTP API response DTOs

pub mod http;
pub mod websocket;
