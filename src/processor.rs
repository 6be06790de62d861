//! Wires the interpreter to the network.
//!
//! Handlers on the reactor only enqueue; a single `operate` thread drains the
//! queue, so no two lines are ever interpreted at once and a slow `system`
//! call stalls only the interpreter, never socket I/O.

use std::{sync::Arc, thread};

use tokio::sync::mpsc;

use crate::{
    Client, Server,
    error::Error,
    event::{ClientEvent, ServerEvent},
    operate::{Binding, Operate},
    package::Package,
    staging::{Origin, UPSTREAM_ORIGIN},
};

enum Job {
    Package(Package, Binding),
    Line(String, Binding),
    // the connection behind `Origin` is gone
    Abandon(Origin),
}

/// Handle to the interpreter thread.
#[derive(Debug, Clone)]
pub struct Processor {
    job_tx: mpsc::UnboundedSender<Job>,
}

impl Processor {
    /// Queues a locally typed line behind anything already received.
    pub fn submit_line(&self, line: impl Into<String>, binding: Binding) -> Result<(), Error> {
        self.job_tx
            .send(Job::Line(line.into(), binding))
            .map_err(|_| Error::ConnectionClosed)
    }
}

/// Starts the interpreter thread and installs `recv_package` and `disconnect`
/// handlers that feed it, on the server, the client, or both.
pub fn register_processor(
    operate: Arc<Operate>,
    server: Option<&Server>,
    client: Option<&Client>,
) -> Result<Processor, Error> {
    let (job_tx, mut job_rx) = mpsc::unbounded_channel::<Job>();

    thread::Builder::new()
        .name("operate".to_string())
        .spawn(move || {
            while let Some(job) = job_rx.blocking_recv() {
                match job {
                    Job::Package(package, binding) => operate.handle_package(&package, &binding),
                    Job::Line(line, binding) => operate.process(&line, None, &binding),
                    Job::Abandon(origin) => operate.abandon(origin),
                }
            }
            log::debug!("[Operate] job queue closed");
        })?;

    if let Some(server) = server {
        let package_tx = job_tx.clone();
        server.on(ServerEvent::RecvPackage, move |package, session, server| {
            let Some(package) = package else {
                return;
            };
            let binding = Binding::hub(session, server);
            if package_tx.send(Job::Package(package, binding)).is_err() {
                log::warn!("[Server] interpreter gone, package dropped");
            }
        });

        let job_tx = job_tx.clone();
        server.on(ServerEvent::Disconnect, move |_, session, _| {
            let _ = job_tx.send(Job::Abandon(session.id()));
        });
    }

    if let Some(client) = client {
        let package_tx = job_tx.clone();
        client.on(ClientEvent::RecvPackage, move |package, client| {
            let Some(package) = package else {
                return;
            };
            if package_tx.send(Job::Package(package, Binding::peer(client))).is_err() {
                log::warn!("[Client] interpreter gone, package dropped");
            }
        });

        let job_tx = job_tx.clone();
        client.on(ClientEvent::Disconnect, move |_, _| {
            let _ = job_tx.send(Job::Abandon(UPSTREAM_ORIGIN));
        });
    }

    Ok(Processor { job_tx })
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::{
        Session, TransferId,
        operate::{Capture, Settings},
    };

    fn wait_for(mut ready: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !ready() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn lines_run_on_the_interpreter_thread() {
        let dir = tempfile::tempdir().unwrap();
        let console = Arc::new(Capture::default());
        let operate = Operate::new(
            Settings {
                script_dir: dir.path().to_path_buf(),
                staging_dir: dir.path().join("staging"),
            },
            console.clone(),
        )
        .unwrap();

        let client = Client::new("alpha");
        let processor = register_processor(Arc::new(operate), None, Some(&client)).unwrap();
        processor
            .submit_line("print$+$2$1", Binding::peer(client.clone()))
            .unwrap();
        processor.submit_line("print$done", Binding::peer(client)).unwrap();

        wait_for(|| console.lines().len() == 2);
        assert_eq!(console.lines(), ["3", "done"]);
    }

    fn operate(dir: &tempfile::TempDir) -> Operate {
        Operate::new(
            Settings {
                script_dir: dir.path().to_path_buf(),
                staging_dir: dir.path().join("staging"),
            },
            Arc::new(Capture::default()),
        )
        .unwrap()
    }

    fn staged_files(dir: &tempfile::TempDir) -> usize {
        std::fs::read_dir(dir.path().join("staging")).unwrap().count()
    }

    fn half_chunk(transfer_id: TransferId) -> Package {
        Package::chunk(transfer_id, b"half", false).unwrap()
    }

    #[test]
    fn departed_session_loses_its_partial_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let operate = Arc::new(operate(&dir));
        let server = Server::new("hub");
        register_processor(operate.clone(), Some(&server), None).unwrap();

        let (session, _rx) = Session::detached(1, "10.0.0.1:5000");
        server.insert_session(session.clone());
        operate.handle_package(&half_chunk(1), &Binding::hub(session.clone(), server.clone()));
        assert_eq!(staged_files(&dir), 1);

        server.remove_session(&session);
        wait_for(|| staged_files(&dir) == 0);
    }

    #[test]
    fn closed_client_loses_its_partial_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let operate = Arc::new(operate(&dir));
        let client = Client::new("alpha");
        register_processor(operate.clone(), None, Some(&client)).unwrap();

        operate.handle_package(&half_chunk(1), &Binding::peer(client.clone()));
        assert_eq!(staged_files(&dir), 1);

        client.close();
        wait_for(|| staged_files(&dir) == 0);
    }
}
