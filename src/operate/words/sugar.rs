// Macros: each replaces the whole line with a longer token sequence that
// travels through the hub and back. Tokens are listed bottom to top, so the
// last one runs first.

use crate::{
    consts::{CLOSE_BRACKET, OPEN_BRACKET, SELF_REFERENCE},
    error::Error,
    operate::{Context, Flow, Operate},
};

// Asks the hub for its peer listing and prints the reply here.
pub(super) fn list_host(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let binding = ctx.binding;
    let own = binding.client("@list_host")?.hostname();

    ctx.actions.clear();
    ctx.values.clear();
    ctx.push_actions(["print", "->", own.as_str(), "list_host", "->>"]);
    Ok(Flow::Next)
}

// `@ping <host>`: stamps the time, bounces through <host> and back, then
// prints "<elapsed> ns from <host>". The bracketed `this` is resolved by
// <host> itself.
pub(super) fn ping(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let binding = ctx.binding;
    let own = binding.client("@ping")?.hostname();
    let target = ctx.pop_value()?;

    ctx.actions.clear();
    ctx.values.clear();
    ctx.push_actions([
        "print",
        OPEN_BRACKET,
        SELF_REFERENCE,
        CLOSE_BRACKET,
        "from",
        "ns",
        "-",
        "swap",
        "time",
        "->",
        own.as_str(),
        "->>",
        "->",
        target.as_str(),
        "->>",
        "time",
    ]);
    Ok(Flow::Next)
}
