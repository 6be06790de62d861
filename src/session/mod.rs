use std::{fmt, sync::Arc};

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};

use crate::{SessionId, error::Error, package::Package};

/// Server-side handle to one connected peer.
///
/// The socket itself is owned by the session's read and write tasks; this
/// handle only queues outbound packages and carries the peer's hostname.
/// Handles compare equal when they refer to the same connection, whatever
/// hostname either one has registered.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: SessionId,
    peer: String,
    hostname: RwLock<String>,

    package_tx: mpsc::UnboundedSender<Package>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Session {
    // The hostname starts out as the peer address until a `reg` arrives.
    pub(crate) fn new(
        id: SessionId,
        peer: String,
        package_tx: mpsc::UnboundedSender<Package>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id,
                hostname: RwLock::new(peer.clone()),
                peer,
                package_tx,
                shutdown_tx,
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Remote address of the connection.
    pub fn peer(&self) -> &str {
        &self.inner.peer
    }

    pub fn hostname(&self) -> String {
        self.inner.hostname.read().clone()
    }

    pub fn set_hostname(&self, hostname: impl Into<String>) {
        *self.inner.hostname.write() = hostname.into();
    }

    /// Queues a package behind any earlier ones for this connection.
    pub fn send(&self, package: Package) -> Result<(), Error> {
        self.inner
            .package_tx
            .send(package)
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Signals the read and write tasks to stop and release the socket.
    pub fn close(&self) {
        let _ = self.inner.shutdown_tx.send(());
    }

    pub fn is_closed(&self) -> bool {
        self.inner.package_tx.is_closed()
    }

    #[cfg(test)]
    pub(crate) fn detached(id: SessionId, peer: &str) -> (Self, mpsc::UnboundedReceiver<Package>) {
        let (package_tx, package_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);
        (Self::new(id, peer.to_string(), package_tx, shutdown_tx), package_rx)
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Session {}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("peer", &self.inner.peer)
            .field("hostname", &*self.inner.hostname.read())
            .finish_non_exhaustive()
    }
}
