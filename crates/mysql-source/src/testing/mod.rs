//! Testing utilities for the MySQL backend
//!
//! Docker container management and a seeded primary/replica fixture.

pub mod container;
pub mod fixture;

pub use container::MySQLContainer;
pub use fixture::{bootstrap_replication, ReplicationPair};
