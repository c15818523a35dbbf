//! Configuration types shared across the outreach crates.

pub mod timeouts;

pub use timeouts::AdapterTimeouts;
