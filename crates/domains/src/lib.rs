//! quorum/crates/domains/src/lib.rs
//!
//! The central domain logic and interface definitions for Quorum:
//! content models, the error taxonomy, domain events, and the port
//! traits every adapter implements.

pub mod error;
pub mod events;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use error::*;
pub use events::*;
pub use models::*;
pub use ports::*;
