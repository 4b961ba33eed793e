//! Implementation of the `clusterops show` command.
//!
//! Displays the metadata and status history of a specific task.

use super::list::state_label;
use crate::cli::ShowArgs;
use crate::context::ServiceContext;
use crate::error::Result;
use crate::task::TaskId;

/// Execute the `clusterops show` command.
pub fn cmd_show(ctx: &ServiceContext, args: ShowArgs) -> Result<()> {
    let id: TaskId = args.task_id.parse()?;
    let record = ctx.tasks.get_task(&id)?;

    println!("================================================================================");
    println!("{} [{}]", record.id, state_label(&record));
    println!("================================================================================");
    println!();

    println!("Name:       {}", record.name);
    println!("Owner:      {}", record.owner);
    println!("Updated:    {}", record.last_updated.format("%Y-%m-%d %H:%M:%S UTC"));

    if let Some(parent) = record.parent_id {
        println!("Parent:     {}", parent);
    }

    if !record.tag.is_empty() {
        println!();
        println!("Tags:");
        for (key, value) in &record.tag {
            println!("  {}={}", key, value);
        }
    }

    if !record.sub_tasks.is_empty() {
        println!();
        println!("Subtasks:");
        for child in &record.sub_tasks {
            println!("  {}", child);
        }
    }

    println!();
    println!("Status history ({}):", record.status_list.len());
    for entry in &record.status_list {
        println!(
            "  {}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.message
        );
    }

    Ok(())
}
