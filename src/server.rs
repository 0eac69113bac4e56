//! LETHE - TCP Server
//! Line-oriented network front end. Each accepted connection gets its own
//! task and lives until the client sends EXIT/QUIT or disconnects.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};

use crate::engine::Lethe;
use crate::error::Result;
use crate::protocol::{handle_line, Dialect, Reply};

struct Listener {
    listener: TcpListener,
    store: Lethe,
}

struct Handler {
    stream: TcpStream,
    peer: SocketAddr,
    store: Lethe,
}

/// Serve `store` on `listener` until `shutdown` resolves.
///
/// In-flight connections are not drained; they are dropped together with
/// the runtime.
pub async fn run(listener: TcpListener, store: Lethe, shutdown: impl Future) {
    let mut server = Listener { listener, store };

    tokio::select! {
        _ = server.run() => {}
        _ = shutdown => {
            log::info!("shutting down server");
        }
    }
}

impl Listener {
    /// Accept loop. A failed accept is logged and the loop carries on.
    async fn run(&mut self) {
        if let Ok(addr) = self.listener.local_addr() {
            log::info!("Lethe server listening on {}", addr);
        }

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    log::warn!("failed to accept connection: {}", err);
                    // e.g. EMFILE; back off before the next accept
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };

            let mut handler = Handler {
                stream,
                peer,
                store: self.store.clone(),
            };

            tokio::spawn(async move {
                log::info!("client connected: {}", handler.peer);
                if let Err(err) = handler.run().await {
                    log::warn!("connection {} failed: {}", handler.peer, err);
                }
                log::info!("client disconnected: {}", handler.peer);
            });
        }
    }
}

impl Handler {
    async fn run(&mut self) -> Result<()> {
        let (reader, writer) = self.stream.split();
        let mut reader = BufReader::new(reader);
        let mut writer = BufWriter::new(writer);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            // Invalid UTF-8 becomes U+FFFD instead of ending the session.
            let line = String::from_utf8_lossy(&buf).into_owned();

            // Persistence commands block on the file system.
            let store = self.store.clone();
            let handled = tokio::task::spawn_blocking(move || handle_line(&store, &line))
                .await
                .unwrap_or_else(|err| Some((Reply::Error(err.to_string()), false)));

            let Some((reply, exit)) = handled else {
                continue;
            };

            writer.write_all(reply.render(Dialect::Network).as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;

            if exit {
                break;
            }
        }

        Ok(())
    }
}
