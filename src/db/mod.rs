//! Database module for the school management server
//!
//! The `Store` trait is the persistence seam handlers depend on. `PgStore`
//! backs it with PostgreSQL; `MemoryStore` keeps everything in process.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use models::{Class, FeeFrequency, FeeStructure, ParentStudent, Role, Section, Subject};
pub use postgres::PgStore;
pub use store::{PoolStatus, Store};
