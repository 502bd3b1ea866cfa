//! onetimeshare — encrypted secrets that can be read exactly once.
//!
//! The binary wires these modules into an HTTP server; integration tests in
//! `tests/` drive them directly.

pub mod api;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod keygen;
pub mod store;
pub mod vault;
