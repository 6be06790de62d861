use std::process::Command;

use chrono::Utc;

use crate::{
    error::Error,
    operate::{Context, Flow, Operate},
};

// Nanoseconds since the Unix epoch.
pub(super) fn time(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    ctx.push_value(now.to_string());
    Ok(Flow::Next)
}

// Runs the popped command through `sh -c` and pushes its stdout. Blocks the
// interpreter until the child exits.
pub(super) fn system(op: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let command = ctx.pop_value()?;
    log::debug!("system: {command}");

    let output = match Command::new("sh").arg("-c").arg(&command).output() {
        Ok(output) => String::from_utf8_lossy(&output.stdout)
            .trim_end_matches('\n')
            .to_string(),
        Err(e) => {
            op.console.print_line(&format!("system {command}: {e}"));
            String::new()
        }
    };
    ctx.push_value(output);
    Ok(Flow::Next)
}
