//! Task record storage for Nimbus
//!
//! [`InMemoryTaskRepository`] implements the engine's persistence interface
//! without an external database. Embedders that keep tasks in their own
//! database implement [`nimbus_interfaces::TaskRepository`] instead.

pub mod memory;

#[cfg(feature = "testing")]
pub mod testing;

pub use memory::InMemoryTaskRepository;
