//! Outbound adapters implementing the domain ports.
//!
//! - **persistence**: PostgreSQL repositories built on Diesel.
//! - **memory**: a single in-process store backing every port, used by tests
//!   and local tooling.
//!
//! Adapters translate between domain types and storage rows. Progress rules
//! stay in the domain.

pub mod memory;
pub mod persistence;
