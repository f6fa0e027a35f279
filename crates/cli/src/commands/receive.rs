//! `receive` command implementation.
//!
//! Stands in for the bulk indexer: binds a UDP port, parses every datagram
//! as bulk framing and reports what arrived.

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tracing::{info, warn};

use super::shutdown_signal;
use crate::cli::ReceiveArgs;

/// Larger than any UDP payload
const RECV_BUFFER: usize = 65_536;

#[derive(Debug, Default, PartialEq, Eq)]
struct ReceiveStats {
    datagrams: u64,
    documents: u64,
    parse_errors: u64,
}

pub async fn run_receive(args: &ReceiveArgs) -> Result<()> {
    let socket = UdpSocket::bind(&args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(addr = %socket.local_addr()?, "receiving bulk datagrams");

    let stats = tokio::select! {
        result = receive_loop(&socket, args.count, args.print) => result?,
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            return Ok(());
        }
    };

    info!(
        datagrams = stats.datagrams,
        documents = stats.documents,
        parse_errors = stats.parse_errors,
        "receiver stopped"
    );
    Ok(())
}

/// Receive until `limit` datagrams have arrived (0 = forever).
async fn receive_loop(socket: &UdpSocket, limit: u64, print: bool) -> Result<ReceiveStats> {
    let mut stats = ReceiveStats::default();
    let mut buf = vec![0u8; RECV_BUFFER];

    while limit == 0 || stats.datagrams < limit {
        let (len, from) = socket.recv_from(&mut buf).await?;
        stats.datagrams += 1;

        match bulk::parse_datagram(&buf[..len]) {
            Ok(documents) => {
                stats.documents += documents.len() as u64;
                info!(%from, bytes = len, documents = documents.len(), "datagram");
                if print {
                    for doc in &documents {
                        println!("{} {}", doc.index, doc.document);
                    }
                }
            }
            Err(e) => {
                stats.parse_errors += 1;
                warn!(%from, bytes = len, error = %e, "malformed datagram");
            }
        }
    }

    Ok(stats)
}
