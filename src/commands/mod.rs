//! Command implementations for clusterops.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Every command runs against a [`ServiceContext`] built from
//! the resolved config.

mod exec;
mod list;
mod remove;
mod show;


use crate::cli::Command;
use crate::config::Config;
use crate::context::ServiceContext;
use crate::error::Result;

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. Each command
/// is routed to its handler function.
pub fn dispatch(config: &Config, command: Command) -> Result<()> {
    let ctx = ServiceContext::from_config(config)?;

    match command {
        Command::List => list::cmd_list(&ctx),
        Command::Show(args) => show::cmd_show(&ctx, args),
        Command::Remove(args) => remove::cmd_remove(&ctx, args),
        Command::Exec(args) => exec::cmd_exec(&ctx, args),
    }
}
