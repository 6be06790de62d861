use std::{net::SocketAddr, sync::Arc};

use parking_lot::{Mutex, RwLock};
use tokio::{
    io::{self, AsyncRead, AsyncWrite},
    net::{TcpListener, ToSocketAddrs},
    select,
    sync::{broadcast, mpsc},
};

use crate::{
    Session,
    alloc::{FIRST_SESSION_ID, IdAllocator},
    error::Error,
    event::{Handlers, ServerEvent, ServerHandler},
    package::Package,
    task,
};

/// Accepts peer connections and routes packages between them.
///
/// Cloning yields another handle to the same server. Sessions are kept in
/// accept order; a session leaves the set on its first read or write error,
/// or when the peer closes.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    hostname: String,
    sessions: RwLock<Vec<Session>>,
    handlers: Handlers<ServerEvent, ServerHandler>,
    session_ids: IdAllocator,
    local_addr: Mutex<Option<SocketAddr>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    pub fn new(hostname: impl Into<String>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(ServerInner {
                hostname: hostname.into(),
                sessions: RwLock::new(Vec::new()),
                handlers: Handlers::new(),
                session_ids: IdAllocator::new(FIRST_SESSION_ID),
                local_addr: Mutex::new(None),
                shutdown_tx,
            }),
        }
    }

    /// The hub's own hostname.
    pub fn hostname(&self) -> &str {
        &self.inner.hostname
    }

    /// Binds `addr` and starts the accept loop. Returns the bound address.
    pub async fn start(&self, addr: impl ToSocketAddrs) -> Result<SocketAddr, Error> {
        if self.inner.local_addr.lock().is_some() {
            return Err(Error::AlreadyStarted);
        }

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        {
            let mut guard = self.inner.local_addr.lock();
            if guard.is_some() {
                return Err(Error::AlreadyStarted);
            }
            *guard = Some(local_addr);
        }

        log::info!("[Server] listening on {local_addr}");
        tokio::spawn(start_accept_loop(
            listener,
            self.clone(),
            self.inner.shutdown_tx.subscribe(),
        ));
        Ok(local_addr)
    }

    /// Registers the handler for `event`, replacing any previous one.
    pub fn on<F>(&self, event: ServerEvent, handler: F)
    where
        F: Fn(Option<Package>, Session, Server) + Send + Sync + 'static,
    {
        self.inner.handlers.set(event, Arc::new(handler));
    }

    /// Writes `package` to the first session registered as `hostname`.
    ///
    /// Hostnames are not unique; the earliest accepted match wins. An unknown
    /// hostname is a silent no-op. Returns whether a session matched.
    pub fn sent_to(&self, package: Package, hostname: &str) -> bool {
        match self.find(hostname) {
            Some(session) => {
                if let Err(e) = session.send(package) {
                    log::debug!("[Server] send to {hostname} dropped: {e}");
                }
                true
            }
            None => {
                log::debug!("[Server] no session named {hostname}");
                false
            }
        }
    }

    /// Writes `package` to every session accepted by `predicate`, in accept
    /// order. Returns how many sessions it was queued for.
    pub fn broadcast(&self, package: Package, predicate: impl Fn(&Session) -> bool) -> usize {
        let targets: Vec<Session> = self
            .inner
            .sessions
            .read()
            .iter()
            .filter(|session| predicate(session))
            .cloned()
            .collect();

        targets
            .iter()
            .filter(|session| session.send(package.clone()).is_ok())
            .count()
    }

    /// First session in accept order whose hostname is `hostname`.
    pub fn find(&self, hostname: &str) -> Option<Session> {
        self.inner
            .sessions
            .read()
            .iter()
            .find(|session| session.hostname() == hostname)
            .cloned()
    }

    /// Snapshot of the live sessions in accept order.
    pub fn get_clients(&self) -> Vec<Session> {
        self.inner.sessions.read().clone()
    }

    /// Stops accepting and closes every session.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(());
        for session in self.inner.sessions.write().drain(..) {
            session.close();
        }
    }

    // Registers a session for `conn` and spawns its read and write loops.
    pub(crate) fn open_session<C>(&self, conn: C, peer: String) -> Session
    where
        C: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (conn_reader, conn_writer) = io::split(conn);
        let (package_tx, package_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx1) = broadcast::channel(1);
        let shutdown_rx2 = shutdown_tx.subscribe();

        let session = Session::new(
            self.inner.session_ids.allocate(),
            peer,
            package_tx,
            shutdown_tx,
        );
        self.insert_session(session.clone());

        let server = self.clone();
        let writer_session = session.clone();
        tokio::spawn(async move {
            if let Err(e) =
                task::start_package_write_loop(package_rx, conn_writer, shutdown_rx1).await
            {
                log::warn!("[Session {}] write failed: {e}", writer_session.id());
            }
            server.remove_session(&writer_session);
        });

        let server = self.clone();
        let reader_session = session.clone();
        tokio::spawn(async move {
            let result = task::start_package_read_loop(
                conn_reader,
                |package| server.dispatch(package, &reader_session),
                shutdown_rx2,
            )
            .await;
            if let Err(e) = result {
                log::warn!("[Session {}] read failed: {e}", reader_session.id());
            }
            server.remove_session(&reader_session);
        });

        session
    }

    pub(crate) fn insert_session(&self, session: Session) {
        self.inner.sessions.write().push(session);
    }

    // Idempotent: both loops call this when they stop.
    pub(crate) fn remove_session(&self, session: &Session) {
        let removed = {
            let mut sessions = self.inner.sessions.write();
            let before = sessions.len();
            sessions.retain(|s| s != session);
            before != sessions.len()
        };
        session.close();
        if removed {
            log::info!(
                "[Server] session {} ({}) disconnected",
                session.id(),
                session.hostname()
            );
            if let Some(handler) = self.inner.handlers.get(&ServerEvent::Disconnect) {
                handler(None, session.clone(), self.clone());
            }
        }
    }

    fn dispatch(&self, package: Package, session: &Session) {
        match self.inner.handlers.get(&ServerEvent::RecvPackage) {
            Some(handler) => handler(Some(package), session.clone(), self.clone()),
            None => log::debug!("[Server] no recv_package handler, package dropped"),
        }
    }
}

async fn start_accept_loop(
    listener: TcpListener,
    server: Server,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((conn, addr)) => {
                        let _ = conn.set_nodelay(true);
                        let session = server.open_session(conn, addr.to_string());
                        log::info!("[Server] session {} connected from {addr}", session.id());
                    }
                    Err(e) => {
                        log::error!("[Server] accept error: {e}");
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                log::info!("[Server] accept loop stopped");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(server: &Server, id: u32, hostname: &str) -> mpsc::UnboundedReceiver<Package> {
        let (session, rx) = Session::detached(id, &format!("10.0.0.{id}:5000"));
        session.set_hostname(hostname);
        server.insert_session(session);
        rx
    }

    #[test]
    fn sent_to_picks_the_first_duplicate() {
        let server = Server::new("hub");
        let mut first = named(&server, 1, "twin");
        let mut second = named(&server, 2, "twin");

        assert!(server.sent_to(Package::command("hello"), "twin"));
        assert_eq!(first.try_recv().unwrap().text(), "hello");
        assert!(second.try_recv().is_err());
        assert_eq!(server.get_clients().len(), 2);
    }

    #[test]
    fn sent_to_unknown_host_is_a_no_op() {
        let server = Server::new("hub");
        let mut alpha = named(&server, 1, "alpha");

        assert!(!server.sent_to(Package::command("hello"), "nobody"));
        assert!(alpha.try_recv().is_err());
        assert_eq!(server.get_clients().len(), 1);
    }

    #[test]
    fn broadcast_skips_the_excluded_host() {
        let server = Server::new("hub");
        let mut a = named(&server, 1, "a");
        let mut b = named(&server, 2, "b");
        let mut c = named(&server, 3, "c");

        let sent = server.broadcast(Package::command("x"), |s| s.hostname() != "b");
        assert_eq!(sent, 2);
        assert!(a.try_recv().is_ok());
        assert!(b.try_recv().is_err());
        assert!(c.try_recv().is_ok());

        assert_eq!(server.broadcast(Package::command("y"), |s| s.hostname() != "z"), 3);
    }

    #[test]
    fn remove_session_keeps_order_of_the_rest() {
        let server = Server::new("hub");
        let _a = named(&server, 1, "a");
        let _b = named(&server, 2, "b");
        let _c = named(&server, 3, "c");

        let b = server.find("b").unwrap();
        server.remove_session(&b);
        server.remove_session(&b);

        let names: Vec<String> = server.get_clients().iter().map(Session::hostname).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn handler_registration_overwrites() {
        let server = Server::new("hub");
        let (session, _rx) = Session::detached(1, "10.0.0.1:5000");
        let hits = Arc::new(Mutex::new(Vec::new()));

        let first = hits.clone();
        server.on(ServerEvent::RecvPackage, move |_, _, _| first.lock().push(1));
        let second = hits.clone();
        server.on(ServerEvent::RecvPackage, move |_, _, _| second.lock().push(2));

        server.dispatch(Package::command("x"), &session);
        assert_eq!(*hits.lock(), [2]);
    }

    #[test]
    fn disconnect_fires_once_per_session() {
        let server = Server::new("hub");
        let _a = named(&server, 1, "a");
        let _b = named(&server, 2, "b");
        let gone = Arc::new(Mutex::new(Vec::new()));

        let seen = gone.clone();
        server.on(ServerEvent::Disconnect, move |package, session, _| {
            assert!(package.is_none());
            seen.lock().push(session.id());
        });

        let b = server.find("b").unwrap();
        server.remove_session(&b);
        server.remove_session(&b);
        assert_eq!(*gone.lock(), [2]);
        assert_eq!(server.get_clients().len(), 1);
    }
}
