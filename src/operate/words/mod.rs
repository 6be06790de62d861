mod arith;
mod files;
mod flow;
mod host;
mod net;
mod stack;
mod sugar;

use std::collections::HashMap;

use crate::{
    error::Error,
    operate::{Context, Flow, Operate},
};

pub(crate) type Word = fn(&Operate, &mut Context<'_>) -> Result<Flow, Error>;

// The command dictionary. Several spellings map to one word.
pub(crate) fn dictionary() -> HashMap<&'static str, Word> {
    HashMap::from([
        // stack
        ("dup", stack::dup as Word),
        ("swap", stack::swap as Word),
        ("size", stack::size as Word),
        ("print", stack::print as Word),
        ("print_limit", stack::print_limit as Word),
        ("drop", stack::drop as Word),
        ("drop_one", stack::drop_one as Word),
        // arithmetic
        ("-", arith::minus as Word),
        ("+", arith::add as Word),
        (">", arith::greater as Word),
        ("==", arith::equal as Word),
        ("++", arith::concat as Word),
        // control flow
        ("if", flow::branch as Word),
        ("begin", flow::begin as Word),
        ("repeat", flow::begin as Word),
        ("exit", flow::exit as Word),
        // network
        ("reg", net::reg as Word),
        ("to", net::to as Word),
        ("->", net::to as Word),
        ("broadcast", net::broadcast as Word),
        ("forward", net::forward as Word),
        ("->>", net::forward as Word),
        ("set_hostname", net::set_hostname as Word),
        ("list_host", net::list_host as Word),
        ("push_host", net::push_host as Word),
        // host
        ("time", host::time as Word),
        ("system", host::system as Word),
        // files
        ("run", files::run as Word),
        ("tree", files::tree as Word),
        ("sft", files::send_file as Word),
        ("sf", files::send_file as Word),
        ("sendfile", files::send_file as Word),
        ("popfs", files::pop_file as Word),
        // sugar
        ("@list_host", sugar::list_host as Word),
        ("@ping", sugar::ping as Word),
    ])
}
