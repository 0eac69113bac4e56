//! LETHE - Interactive TCP Client
//! Sends typed lines to a server and echoes its answers prefixed with `< `.

use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::Result;

/// Connect to `addr` and relay stdin until EOF or EXIT/QUIT.
pub async fn run(addr: &str) -> Result<()> {
    let stream = TcpStream::connect(addr).await?;
    println!("Connected to server at {addr}");
    println!("Enter commands (type EXIT to quit):");

    let (reader, mut writer) = stream.into_split();

    let printer = tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            println!("< {line}");
        }
    });

    let mut input = BufReader::new(io::stdin()).lines();
    while let Some(line) = input.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;

        if line.eq_ignore_ascii_case("EXIT") || line.eq_ignore_ascii_case("QUIT") {
            break;
        }
    }

    // Let the server's goodbye arrive before hanging up.
    writer.shutdown().await?;
    let _ = printer.await;
    Ok(())
}
