//! Infrastructure layer: session hub, wire DTOs, and the execution client.

pub mod dto;
pub mod execution;
pub mod hub;

pub use execution::PistonExecutionGateway;
pub use hub::SessionHub;
