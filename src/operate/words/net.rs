use crate::{
    error::Error,
    operate::{Binding, Context, Flow, Operate, registration},
    package::Package,
};

// Names the session this line arrived on.
pub(super) fn reg(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let binding = ctx.binding;
    let (session, _) = binding.server("reg")?;
    let hostname = ctx.pop_value()?;
    log::info!("[Session {}] registered as {hostname}", session.id());
    session.set_hostname(hostname);
    Ok(Flow::Next)
}

// Sends the rest of the line to one named peer.
pub(super) fn to(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let binding = ctx.binding;
    let (_, server) = binding.server("to")?;
    let hostname = ctx.pop_value()?;
    server.sent_to(Package::command(&ctx.pack()), &hostname);
    Ok(Flow::Stop)
}

// Sends the rest of the line to every peer not named by the popped value.
pub(super) fn broadcast(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let binding = ctx.binding;
    let (_, server) = binding.server("broadcast")?;
    let excluded = ctx.pop_value()?;
    let sent = server.broadcast(Package::command(&ctx.pack()), |session| {
        session.hostname() != excluded
    });
    log::debug!("[Server] broadcast to {sent} session(s), excluding {excluded}");
    Ok(Flow::Stop)
}

// Sends the rest of the line upstream. The hub has no upstream.
pub(super) fn forward(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    match ctx.binding {
        Binding::Peer(client) => {
            if let Err(e) = client.send(Package::command(&ctx.pack())) {
                log::warn!("[Client] forward dropped: {e}");
            }
        }
        Binding::Hub { .. } => log::debug!("forward on the hub is a no-op"),
    }
    Ok(Flow::Stop)
}

pub(super) fn set_hostname(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let binding = ctx.binding;
    let client = binding.client("set_hostname")?;
    let hostname = ctx.pop_value()?;
    client.set_hostname(hostname.as_str());
    if let Err(e) = client.send(registration(&hostname)) {
        log::warn!("[Client] registration dropped: {e}");
    }
    Ok(Flow::Stop)
}

// One `[address] hostname` line per session, as a single value.
pub(super) fn list_host(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let binding = ctx.binding;
    let (_, server) = binding.server("list_host")?;
    let listing = server
        .get_clients()
        .iter()
        .map(|session| format!("[{}] {}", session.peer(), session.hostname()))
        .collect::<Vec<_>>()
        .join("\n");
    ctx.push_value(listing);
    Ok(Flow::Next)
}

pub(super) fn push_host(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let binding = ctx.binding;
    let (_, server) = binding.server("push_host")?;
    for session in server.get_clients() {
        ctx.push_value(session.hostname());
    }
    Ok(Flow::Next)
}
