use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use parking_lot::{Mutex, RwLock};
use tokio::{
    io,
    net::{TcpStream, ToSocketAddrs},
    sync::{broadcast, mpsc},
};

use crate::{
    error::Error,
    event::{ClientEvent, ClientHandler, Handlers},
    package::Package,
    task,
};

/// One outbound connection to a hub, plus this peer's hostname.
///
/// Packages sent before [`Client::connect`] completes are queued and written
/// once the connection is up. After a read or write failure the connection is
/// closed and no further events fire.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    hostname: RwLock<String>,
    handlers: Handlers<ClientEvent, ClientHandler>,

    package_tx: mpsc::UnboundedSender<Package>,
    // taken by `connect`
    package_rx: Mutex<Option<mpsc::UnboundedReceiver<Package>>>,

    shutdown_tx: broadcast::Sender<()>,
    closed: AtomicBool,
}

impl Client {
    pub fn new(hostname: impl Into<String>) -> Self {
        let (package_tx, package_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(ClientInner {
                hostname: RwLock::new(hostname.into()),
                handlers: Handlers::new(),
                package_tx,
                package_rx: Mutex::new(Some(package_rx)),
                shutdown_tx,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Connects to the hub, fires `Connect`, then starts reading.
    pub async fn connect(&self, addr: impl ToSocketAddrs) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        if self.inner.package_rx.lock().is_none() {
            return Err(Error::AlreadyConnected);
        }

        let conn = TcpStream::connect(addr).await?;
        conn.set_nodelay(true)?;
        let peer = conn.peer_addr()?;

        let package_rx = self
            .inner
            .package_rx
            .lock()
            .take()
            .ok_or(Error::AlreadyConnected)?;
        let (conn_reader, conn_writer) = io::split(conn);
        log::info!("[Client] connected to {peer}");

        let client = self.clone();
        let shutdown_rx = self.inner.shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) =
                task::start_package_write_loop(package_rx, conn_writer, shutdown_rx).await
            {
                log::warn!("[Client] write failed: {e}");
            }
            client.close();
        });

        if let Some(handler) = self.inner.handlers.get(&ClientEvent::Connect) {
            handler(None, self.clone());
        }

        let client = self.clone();
        let shutdown_rx = self.inner.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let result = task::start_package_read_loop(
                conn_reader,
                |package| client.dispatch(package),
                shutdown_rx,
            )
            .await;
            if let Err(e) = result {
                log::warn!("[Client] read failed: {e}");
            }
            client.close();
        });

        Ok(())
    }

    /// Registers the handler for `event`, replacing any previous one.
    pub fn on<F>(&self, event: ClientEvent, handler: F)
    where
        F: Fn(Option<Package>, Client) + Send + Sync + 'static,
    {
        self.inner.handlers.set(event, Arc::new(handler));
    }

    /// Queues `package` for the hub, behind any earlier ones.
    pub fn send(&self, package: Package) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        self.inner
            .package_tx
            .send(package)
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Closes the connection and fires `Disconnect` on the first call.
    pub fn close(&self) {
        let first = !self.inner.closed.swap(true, Ordering::AcqRel);
        let _ = self.inner.shutdown_tx.send(());
        if first {
            log::info!("[Client] connection closed");
            if let Some(handler) = self.inner.handlers.get(&ClientEvent::Disconnect) {
                handler(None, self.clone());
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Resolves once the connection has been closed, locally or by failure.
    pub async fn closed(&self) {
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        if self.is_closed() {
            return;
        }
        let _ = shutdown_rx.recv().await;
    }

    pub fn hostname(&self) -> String {
        self.inner.hostname.read().clone()
    }

    pub fn set_hostname(&self, hostname: impl Into<String>) {
        *self.inner.hostname.write() = hostname.into();
    }

    fn dispatch(&self, package: Package) {
        if self.is_closed() {
            return;
        }
        match self.inner.handlers.get(&ClientEvent::RecvPackage) {
            Some(handler) => handler(Some(package), self.clone()),
            None => log::debug!("[Client] no recv_package handler, package dropped"),
        }
    }

    // Hands out the outbound queue of an unconnected client.
    #[cfg(test)]
    pub(crate) fn take_outbound(&self) -> mpsc::UnboundedReceiver<Package> {
        self.inner
            .package_rx
            .lock()
            .take()
            .expect("client already connected")
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("hostname", &*self.inner.hostname.read())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
