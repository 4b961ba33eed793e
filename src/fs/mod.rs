//! Filesystem utilities for clusterops.
//!
//! The file-backed task store relies on these to replace documents without ever
//! exposing a half-written record to readers.

pub mod atomic;

pub use atomic::atomic_write;
