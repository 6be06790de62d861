use std::fmt;

use crate::{
    Client, Server, Session,
    consts::DELIMITER,
    error::Error,
    package::Package,
    staging::{Origin, UPSTREAM_ORIGIN},
};

/// Network side an interpreter invocation acts for.
///
/// On the hub a line always arrives through some session; on a peer it
/// arrives from (or is typed for) the upstream client.
#[derive(Clone)]
pub enum Binding {
    Hub { session: Session, server: Server },
    Peer(Client),
}

impl Binding {
    pub fn hub(session: Session, server: Server) -> Self {
        Binding::Hub { session, server }
    }

    pub fn peer(client: Client) -> Self {
        Binding::Peer(client)
    }

    /// What `this` resolves to: the hub's own name, or the peer's.
    pub fn hostname(&self) -> String {
        match self {
            Binding::Hub { server, .. } => server.hostname().to_string(),
            Binding::Peer(client) => client.hostname(),
        }
    }

    pub(crate) fn origin(&self) -> Origin {
        match self {
            Binding::Hub { session, .. } => session.id(),
            Binding::Peer(_) => UPSTREAM_ORIGIN,
        }
    }

    pub(crate) fn server(&self, word: &'static str) -> Result<(&Session, &Server), Error> {
        match self {
            Binding::Hub { session, server } => Ok((session, server)),
            Binding::Peer(_) => Err(Error::RequiresHub(word)),
        }
    }

    pub(crate) fn client(&self, word: &'static str) -> Result<&Client, Error> {
        match self {
            Binding::Peer(client) => Ok(client),
            Binding::Hub { .. } => Err(Error::RequiresPeer(word)),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Hub { session, .. } => f.debug_tuple("Hub").field(session).finish(),
            Binding::Peer(client) => f.debug_tuple("Peer").field(client).finish(),
        }
    }
}

// Execution state of one command line: pending tokens, operands, and what
// the line is bound to. Both stacks grow at the end.
pub struct Context<'a> {
    pub(crate) actions: Vec<String>,
    pub(crate) values: Vec<String>,
    pub(crate) package: Option<&'a Package>,
    pub(crate) binding: &'a Binding,
}

impl<'a> Context<'a> {
    pub(crate) fn new(tokens: Vec<String>, package: Option<&'a Package>, binding: &'a Binding) -> Self {
        Self {
            actions: tokens,
            values: Vec::new(),
            package,
            binding,
        }
    }

    pub(crate) fn pop_value(&mut self) -> Result<String, Error> {
        self.values.pop().ok_or(Error::StackUnderflow)
    }

    pub(crate) fn pop_integer(&mut self) -> Result<i64, Error> {
        let value = self.pop_value()?;
        value.trim().parse().map_err(|_| Error::NotANumber(value))
    }

    pub(crate) fn top_value(&self) -> Result<&str, Error> {
        self.values
            .last()
            .map(String::as_str)
            .ok_or(Error::StackUnderflow)
    }

    pub(crate) fn push_value(&mut self, value: impl Into<String>) {
        self.values.push(value.into());
    }

    pub(crate) fn push_actions<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.extend(tokens.into_iter().map(Into::into));
    }

    // Everything not yet consumed as one line: pending tokens bottom to top,
    // then operands top to bottom, so the receiver rebuilds the same stacks.
    pub(crate) fn pack(&self) -> String {
        let mut packed = String::new();
        for token in self.actions.iter().chain(self.values.iter().rev()) {
            if !packed.is_empty() {
                packed.push(DELIMITER);
            }
            packed.push_str(token);
        }
        packed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn pack_puts_actions_first_and_values_reversed() {
        let binding = Binding::peer(Client::new("alpha"));
        let mut ctx = Context::new(strings(&["print", "->"]), None, &binding);
        ctx.push_value("x");
        ctx.push_value("y");

        assert_eq!(ctx.pack(), "print$->$y$x");
    }

    #[test]
    fn pack_of_empty_stacks_is_empty() {
        let binding = Binding::peer(Client::new("alpha"));
        let ctx = Context::new(Vec::new(), None, &binding);
        assert_eq!(ctx.pack(), "");
    }

    #[test]
    fn integer_operands_are_checked() {
        let binding = Binding::peer(Client::new("alpha"));
        let mut ctx = Context::new(Vec::new(), None, &binding);
        ctx.push_value("12x");
        assert!(matches!(ctx.pop_integer(), Err(Error::NotANumber(v)) if v == "12x"));
        assert!(matches!(ctx.pop_integer(), Err(Error::StackUnderflow)));
    }

    #[test]
    fn hub_only_words_are_refused_on_a_peer() {
        let binding = Binding::peer(Client::new("alpha"));
        assert!(matches!(binding.server("reg"), Err(Error::RequiresHub("reg"))));
        assert_eq!(binding.hostname(), "alpha");
        assert_eq!(binding.origin(), UPSTREAM_ORIGIN);
    }
}
