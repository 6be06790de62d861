use crate::{
    error::Error,
    operate::{Context, Flow, Operate},
};

pub(super) fn dup(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let top = ctx.top_value()?.to_string();
    ctx.push_value(top);
    Ok(Flow::Next)
}

pub(super) fn swap(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let a = ctx.pop_value()?;
    let b = ctx.pop_value()?;
    ctx.push_value(a);
    ctx.push_value(b);
    Ok(Flow::Next)
}

pub(super) fn size(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let size = ctx.values.len();
    ctx.push_value(size.to_string());
    Ok(Flow::Next)
}

// Leaves the stack as it is.
pub(super) fn print(op: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    op.console.print_line(&ctx.values.join(" "));
    Ok(Flow::Next)
}

pub(super) fn print_limit(op: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let n = ctx.pop_integer()?.max(0) as usize;
    let start = ctx.values.len().saturating_sub(n);
    op.console.print_line(&ctx.values[start..].join(" "));
    Ok(Flow::Next)
}

pub(super) fn drop(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let n = ctx.pop_integer()?;
    for _ in 0..n {
        ctx.pop_value()?;
    }
    Ok(Flow::Next)
}

pub(super) fn drop_one(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    ctx.pop_value()?;
    Ok(Flow::Next)
}
