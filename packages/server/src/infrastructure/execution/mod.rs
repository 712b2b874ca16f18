//! Execution provider implementations.
//!
//! - `piston`: HTTP client for the Piston execution API

pub mod piston;

pub use piston::PistonExecutionGateway;
