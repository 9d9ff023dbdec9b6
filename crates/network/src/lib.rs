// crates/network/src/lib.rs
//! Reachability probing
//!
//! [`ConnectivityChecker::spawn_probe`] is the production source of the
//! online/offline signal the sync engine reacts to.

mod client;
mod connectivity;
mod error;

pub use client::{Client, ClientConfig};
pub use connectivity::{ConnectivityChecker, DEFAULT_PROBE_URLS};
pub use error::{NetworkError, NetworkResult};
