//! Implementation of the `clusterops remove` command.

use crate::cli::RemoveArgs;
use crate::context::ServiceContext;
use crate::error::Result;
use crate::task::TaskId;

pub fn cmd_remove(ctx: &ServiceContext, args: RemoveArgs) -> Result<()> {
    let id: TaskId = args.task_id.parse()?;
    ctx.tasks.remove(&id)?;
    println!("Removed task {}", id);
    Ok(())
}
