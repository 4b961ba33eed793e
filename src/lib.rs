//! Clusterops: task execution engine and advisory entity locks for
//! storage-cluster management.
//!
//! A management service launches long-running operations (installing a node,
//! creating a cluster, expanding a pool) through the [`task::TaskManager`]. Each
//! operation runs on its own thread with a [`task::Task`] handle it uses to
//! report progress and, finally, its outcome. Every task is mirrored into a
//! [`store::TaskStore`] document so progress can be queried from anywhere,
//! including later process lifetimes.
//!
//! Before touching managed entities the caller reserves them through the
//! [`locks::LockManager`]. Locks are advisory, in-memory and all-or-nothing.
//!
//! [`context::ServiceContext`] wires the store, task manager and lock table
//! from a [`config::Config`]; the `clusterops` binary drives it from the CLI.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod locks;
pub mod store;
pub mod task;

#[cfg(test)]
mod test_support;
