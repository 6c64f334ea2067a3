//! Core Module - Fallback Logic & Heuristics
//!
//! Provider mux state machine and the offline heuristic engine.

pub mod heuristic;
pub mod mux;

pub use mux::*;
