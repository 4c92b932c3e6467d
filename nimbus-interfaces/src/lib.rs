//! # Nimbus Interfaces
//!
//! Abstractions the task engine consumes but does not implement itself.
//!
//! ## Main Interfaces
//!
//! - [`TaskRepository`] - create, update and list persisted task records
//! - [`NodeClient`] - the node RPC surface used to delegate sub-tasks
//! - [`NodeCapability`] - what a cluster node can execute

pub mod database;
pub mod node;

// Re-export commonly used types
pub use database::{DatabaseError, DatabaseResult, Repository, TaskRepository};
pub use node::{
    ApiResponse, CreateTaskRequest, NodeCapability, NodeClient, NodeError, NodeResult,
    RemoteTaskSnapshot,
};
