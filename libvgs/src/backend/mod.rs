//! [`ObjectStore`](crate::ObjectStore) implementations.
//!
//! The controller is generic over the store; production deployments plug in
//! a control-plane client, while [`memory::MemoryStore`] backs tests and
//! single-process setups.

pub mod memory;
