//! Datagram transports
//!
//! `UdpTransport` resolves and connects lazily on the first send and reuses
//! the connected socket afterwards. A failed write drops the socket so the
//! next send starts from a fresh resolve.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use contracts::UdpEndpoint;
use tokio::net::{lookup_host, UdpSocket};
use tracing::debug;

use crate::error::TransportError;

/// Connectionless datagram output
#[trait_variant::make(BulkTransport: Send)]
pub trait LocalBulkTransport {
    /// Endpoint description for logs
    fn endpoint(&self) -> String;

    /// Send one datagram; returns the bytes written.
    async fn send(&mut self, datagram: &[u8]) -> Result<usize, TransportError>;
}

/// UDP transport to a `udp://host:port` endpoint
pub struct UdpTransport {
    endpoint: UdpEndpoint,
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    pub fn new(endpoint: UdpEndpoint) -> Self {
        Self {
            endpoint,
            socket: None,
        }
    }

    /// Whether a socket is currently established
    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    async fn connect(&self) -> Result<UdpSocket, TransportError> {
        let authority = self.endpoint.authority();
        let addr = lookup_host(&authority)
            .await
            .map_err(|e| TransportError::Resolve {
                endpoint: self.endpoint.to_string(),
                message: e.to_string(),
            })?
            .next()
            .ok_or_else(|| TransportError::Resolve {
                endpoint: self.endpoint.to_string(),
                message: "no addresses found".to_string(),
            })?;

        let local = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| TransportError::Connect {
                endpoint: self.endpoint.to_string(),
                source,
            })?;
        socket
            .connect(addr)
            .await
            .map_err(|source| TransportError::Connect {
                endpoint: self.endpoint.to_string(),
                source,
            })?;

        debug!(endpoint = %self.endpoint, remote = %addr, "udp socket connected");
        Ok(socket)
    }
}

impl BulkTransport for UdpTransport {
    fn endpoint(&self) -> String {
        self.endpoint.to_string()
    }

    async fn send(&mut self, datagram: &[u8]) -> Result<usize, TransportError> {
        let socket = match self.socket.take() {
            Some(socket) => socket,
            None => self.connect().await?,
        };

        let sent = socket
            .send(datagram)
            .await
            .map_err(|source| TransportError::Write {
                endpoint: self.endpoint.to_string(),
                source,
            })?;
        if sent < datagram.len() {
            return Err(TransportError::ShortWrite {
                endpoint: self.endpoint.to_string(),
                sent,
                len: datagram.len(),
            });
        }

        self.socket = Some(socket);
        Ok(sent)
    }
}

/// In-memory transport that records datagrams
///
/// Clones share state. Failures can be scripted with `fail_next`.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    sent: Arc<Mutex<Vec<Bytes>>>,
    fail_next: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every send
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make the next `n` sends fail as if the endpoint were unreachable
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|v| v.len()).unwrap_or(0)
    }
}

impl BulkTransport for MemoryTransport {
    fn endpoint(&self) -> String {
        "memory://".to_string()
    }

    async fn send(&mut self, datagram: &[u8]) -> Result<usize, TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::Resolve {
                endpoint: BulkTransport::endpoint(self),
                message: "endpoint unreachable".to_string(),
            });
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(Bytes::copy_from_slice(datagram));
        }
        Ok(datagram.len())
    }
}

#[cfg(test)]
mod tests {
    use super::{BulkTransport, Bytes, MemoryTransport, UdpEndpoint, UdpSocket, UdpTransport};

    #[tokio::test]
    async fn test_udp_transport_connects_lazily_and_reuses_socket() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let endpoint: UdpEndpoint = format!("udp://127.0.0.1:{port}").parse().unwrap();

        let mut transport = UdpTransport::new(endpoint);
        assert!(!transport.is_connected());

        transport.send(b"first\n").await.unwrap();
        assert!(transport.is_connected());
        transport.send(b"second\n").await.unwrap();

        let mut buf = [0u8; 64];
        let (n1, from1) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n1], b"first\n");
        let (n2, from2) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n2], b"second\n");
        assert_eq!(from1, from2);
    }

    #[tokio::test]
    async fn test_memory_transport_scripted_failure() {
        let mut transport = MemoryTransport::new();
        transport.fail_next(1);

        assert!(transport.send(b"a").await.is_err());
        assert_eq!(transport.send(b"b").await.unwrap(), 1);
        assert_eq!(transport.sent(), vec![Bytes::from_static(b"b")]);
    }
}
