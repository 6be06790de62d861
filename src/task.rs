use futures_util::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    select,
    sync::{broadcast, mpsc},
};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::{
    error::Error,
    package::{Package, PackageCodec},
};

// Drains the outbound queue of one connection onto the wire.
//
// Packages are written in submission order. Returns on shutdown, when every
// sender is gone, or on the first write error; the write half is shut down
// on the clean paths.
pub(crate) async fn start_package_write_loop(
    mut package_rx: mpsc::UnboundedReceiver<Package>,
    conn_writer: impl AsyncWrite + Unpin,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), Error> {
    let mut package_writer = FramedWrite::new(conn_writer, PackageCodec);
    loop {
        select! {
            package = package_rx.recv() => {
                match package {
                    Some(package) => package_writer.send(package).await?,
                    None => break,
                }
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }
    package_writer.close().await
}

// Decodes packages from one connection and hands each to `on_package`.
//
// Returns `Ok` when the peer closes cleanly or shutdown is signalled, and the
// framing or io error otherwise.
pub(crate) async fn start_package_read_loop(
    conn_reader: impl AsyncRead + Unpin,
    mut on_package: impl FnMut(Package),
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), Error> {
    let mut package_reader = FramedRead::new(conn_reader, PackageCodec);
    loop {
        select! {
            package = package_reader.next() => {
                match package {
                    Some(Ok(package)) => on_package(package),
                    Some(Err(e)) => return Err(e),
                    None => return Ok(()),
                }
            }
            _ = shutdown_rx.recv() => {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, duplex};

    #[tokio::test]
    async fn write_then_read_preserves_order() {
        let (near, far) = duplex(4096);
        let (package_tx, package_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);

        for text in ["one", "two", "three"] {
            package_tx.send(Package::command(text)).unwrap();
        }
        drop(package_tx);

        start_package_write_loop(package_rx, near, shutdown_tx.subscribe())
            .await
            .unwrap();

        let mut seen = Vec::new();
        start_package_read_loop(
            far,
            |package| seen.push(package.text().into_owned()),
            shutdown_tx.subscribe(),
        )
        .await
        .unwrap();

        assert_eq!(seen, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn read_loop_reports_a_truncated_frame() {
        let (mut near, far) = duplex(64);
        let (shutdown_tx, _) = broadcast::channel(1);

        // header promises 5 body bytes, only 2 arrive before close
        near.write_all(&[0, 1, 0, 0, 5, 0, 0, 0, 0, b'h', b'i'])
            .await
            .unwrap();
        drop(near);

        let result = start_package_read_loop(far, |_| {}, shutdown_tx.subscribe()).await;
        assert!(matches!(
            result,
            Err(Error::IncompleteFrame {
                expected: 14,
                available: 11
            })
        ));
    }
}
