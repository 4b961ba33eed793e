//! CLI argument parsing for clusterops.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Clusterops: run and inspect long-running cluster management tasks.
///
/// Task records live in the configured document store (a directory of JSON
/// documents by default), so `list` and `show` see tasks from earlier runs.
#[derive(Parser, Debug)]
#[command(name = "clusterops")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file (default: ./clusterops.yaml if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for clusterops.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List persisted tasks.
    ///
    /// Shows id, name, owner and outcome for every record in the store.
    List,

    /// Show details of a specific task.
    ///
    /// Prints the record metadata and its full status history.
    Show(ShowArgs),

    /// Delete a task record from the store.
    Remove(RemoveArgs),

    /// Run a command as a tracked task.
    ///
    /// Each line the command writes to stdout or stderr becomes a status
    /// entry. The task succeeds when the command exits with status 0.
    Exec(ExecArgs),
}

/// Arguments for the `show` command.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Task ID to show.
    pub task_id: String,
}

/// Arguments for the `remove` command.
#[derive(Parser, Debug)]
pub struct RemoveArgs {
    /// Task ID to remove.
    pub task_id: String,
}

/// Arguments for the `exec` command.
#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// Task name (defaults to the command line).
    #[arg(long)]
    pub name: Option<String>,

    /// Task owner (defaults to user@host).
    #[arg(long)]
    pub owner: Option<String>,

    /// Tag entries as key=value.
    #[arg(long = "tag", value_name = "KEY=VALUE")]
    pub tags: Vec<String>,

    /// Entities to lock while the task runs, as uuid=reason.
    #[arg(long = "lock", value_name = "ENTITY=REASON")]
    pub locks: Vec<String>,

    /// Force the task into timedout after this many seconds (0 disables).
    ///
    /// Overrides `exec_timeout_secs` from the config.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// The command to run.
    #[arg(last = true, required = true, num_args = 1..)]
    pub command: Vec<String>,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
