use std::{collections::HashMap, hash::Hash, str::FromStr, sync::Arc};

use parking_lot::Mutex;

use crate::{Client, Server, Session, error::Error, package::Package};

/// Events raised by a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerEvent {
    /// A complete package arrived on one of the sessions.
    RecvPackage,
    /// A session left the set. Fires once per session, without a package.
    Disconnect,
}

/// Events raised by a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEvent {
    /// The outbound connection was established. Fires once.
    Connect,
    /// A complete package arrived from the server.
    RecvPackage,
    /// The connection was closed, locally or by failure. Fires once.
    Disconnect,
}

// `Connect` and `Disconnect` are raised without a package.
pub type ServerHandler = dyn Fn(Option<Package>, Session, Server) + Send + Sync;

pub type ClientHandler = dyn Fn(Option<Package>, Client) + Send + Sync;

// One handler per event; registering again replaces the previous one.
pub(crate) struct Handlers<E, H: ?Sized> {
    slots: Mutex<HashMap<E, Arc<H>>>,
}

impl<E: Eq + Hash, H: ?Sized> Handlers<E, H> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, event: E, handler: Arc<H>) {
        self.slots.lock().insert(event, handler);
    }

    // The handler is cloned out so it runs without the lock held.
    pub fn get(&self, event: &E) -> Option<Arc<H>> {
        self.slots.lock().get(event).cloned()
    }
}

impl FromStr for ServerEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recv_package" => Ok(ServerEvent::RecvPackage),
            "disconnect" => Ok(ServerEvent::Disconnect),
            _ => Err(Error::UnknownEvent(s.to_string())),
        }
    }
}

impl FromStr for ClientEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connect" => Ok(ClientEvent::Connect),
            "recv_package" => Ok(ClientEvent::RecvPackage),
            "disconnect" => Ok(ClientEvent::Disconnect),
            _ => Err(Error::UnknownEvent(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_twice_keeps_only_the_latest() {
        let handlers: Handlers<ClientEvent, dyn Fn() -> u8 + Send + Sync> = Handlers::new();
        handlers.set(ClientEvent::Connect, Arc::new(|| 1));
        handlers.set(ClientEvent::Connect, Arc::new(|| 2));

        assert_eq!(handlers.get(&ClientEvent::Connect).unwrap()(), 2);
        assert!(handlers.get(&ClientEvent::RecvPackage).is_none());
    }

    #[test]
    fn parses_event_names() {
        assert_eq!(
            "recv_package".parse::<ServerEvent>().unwrap(),
            ServerEvent::RecvPackage
        );
        assert_eq!("connect".parse::<ClientEvent>().unwrap(), ClientEvent::Connect);
        assert_eq!(
            "disconnect".parse::<ServerEvent>().unwrap(),
            ServerEvent::Disconnect
        );
        assert_eq!(
            "disconnect".parse::<ClientEvent>().unwrap(),
            ClientEvent::Disconnect
        );
        assert!("connect".parse::<ServerEvent>().is_err());
        assert!(matches!(
            "close".parse::<ClientEvent>(),
            Err(Error::UnknownEvent(name)) if name == "close"
        ));
    }
}
