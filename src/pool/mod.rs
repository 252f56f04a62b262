//! Managed node-pool operations
//!
//! - **api**: the pool API contract (desired size, scale, member eviction)
//! - **capacity**: grow a pool and wait for the new member to join
//! - **evict**: remove one drained node's instance from its pool

pub mod api;
pub mod capacity;
pub mod evict;

pub use api::{NodePool, NodepoolApi, PoolError};
pub use capacity::CapacityController;
pub use evict::PoolMembershipEvictor;
