//! Implementation of the `clusterops list` command.

use crate::context::ServiceContext;
use crate::error::Result;
use crate::task::TaskRecord;
use log::warn;

/// Print one line per persisted task.
pub fn cmd_list(ctx: &ServiceContext) -> Result<()> {
    let ids = ctx.tasks.list()?;

    if ids.is_empty() {
        println!("No tasks.");
        return Ok(());
    }

    println!("{:<36}  {:<9}  {:<20}  NAME", "ID", "STATE", "OWNER");
    for id in ids {
        match ctx.tasks.get_task(&id) {
            Ok(record) => println!(
                "{:<36}  {:<9}  {:<20}  {}",
                record.id,
                state_label(&record),
                record.owner,
                record.name
            ),
            // Removed between list and get
            Err(e) => warn!("Skipping task {}: {}", id, e),
        }
    }

    Ok(())
}

/// Short state for listings: the outcome once completed, otherwise progress.
pub(super) fn state_label(record: &TaskRecord) -> &'static str {
    if record.completed {
        record.status.as_str()
    } else if record.started {
        "running"
    } else {
        "pending"
    }
}
