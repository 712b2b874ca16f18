//! Realtime collaborative code room server.
//!
//! Participants join named rooms over WebSocket, edit a shared code buffer
//! and language tag (last write wins), see each other's presence and typing
//! activity, and run the buffer against an external execution provider.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
