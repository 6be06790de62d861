use crate::{
    error::Error,
    operate::{Context, Flow, Operate},
};

// `a` is the top of the stack, `b` the entry below it.

pub(super) fn minus(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let a = ctx.pop_integer()?;
    let b = ctx.pop_integer()?;
    ctx.push_value(b.wrapping_sub(a).to_string());
    Ok(Flow::Next)
}

pub(super) fn add(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let a = ctx.pop_integer()?;
    let b = ctx.pop_integer()?;
    ctx.push_value(a.wrapping_add(b).to_string());
    Ok(Flow::Next)
}

pub(super) fn greater(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let a = ctx.pop_integer()?;
    let b = ctx.pop_integer()?;
    ctx.push_value(truth(b > a));
    Ok(Flow::Next)
}

// Compares raw strings, so "01" and "1" differ.
pub(super) fn equal(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let a = ctx.pop_value()?;
    let b = ctx.pop_value()?;
    ctx.push_value(truth(b == a));
    Ok(Flow::Next)
}

pub(super) fn concat(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let a = ctx.pop_value()?;
    let b = ctx.pop_value()?;
    ctx.push_value(a + &b);
    Ok(Flow::Next)
}

fn truth(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}
