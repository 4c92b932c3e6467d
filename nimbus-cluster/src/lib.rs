//! Node delegation for Nimbus
//!
//! A master keeps the persisted record of a logical task and hands part of
//! the work to a slave node advertising the required [`NodeCapability`]:
//!
//! - [`NodePool`] picks a capable node, round-robin.
//! - [`HttpNodeClient`] talks to a remote node over its JSON API.
//! - [`SlaveTaskHost`] is the slave side: it runs requested sub-tasks on a
//!   non-persistent queue and answers status polls.
//! - [`DelegatedTask`] is the master-side workflow that creates the remote
//!   task and polls it until it finishes.
//!
//! [`NodeCapability`]: nimbus_interfaces::NodeCapability

pub mod client;
pub mod delegate;
pub mod error;
pub mod pool;
pub mod slave;

pub use client::HttpNodeClient;
pub use delegate::{DelegatedState, DelegatedTask, DelegationPhase, DELEGATED_TASK_TYPE};
pub use error::{ClusterError, ClusterResult};
pub use pool::{ClusterNode, NodePool};
pub use slave::SlaveTaskHost;
