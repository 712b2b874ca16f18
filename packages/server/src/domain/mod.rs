//! Domain model: rooms, participants, and the execution provider seam.

mod execution;
mod room;

pub use execution::{ExecutionError, ExecutionGateway, ExecutionRequest};
#[cfg(test)]
pub use execution::MockExecutionGateway;
pub use room::{
    ConnectionId, DomainError, Room, RoomId, UserName, DEFAULT_CODE, DEFAULT_LANGUAGE,
};
