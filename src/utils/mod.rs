//! Utils Module - Helper Functions & Shared Utilities
//!
//! Bounded requests, the snapshot cache, address handling and constants.

pub mod address;
pub mod bounded;
pub mod cache;
pub mod constants;

pub use address::*;
pub use bounded::*;
pub use cache::*;
pub use constants::*;
