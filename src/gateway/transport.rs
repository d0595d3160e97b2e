//! Per-transaction TCP client for the Algo_Domo field bus.
//!
//! Every request opens a fresh connection, writes its bytes, reads until a
//! full reply is assembled or the deadline elapses, then lets the socket
//! drop. There is no persistent connection, no retry, and no pooling — the
//! gateway side of this bridge talks to boards one request at a time.

use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::core::error::{BridgeError, Result};
use crate::core::frame::{extract_frame, Frame, FRAME_LEN};
use crate::core::model::{now_ms, GatewaySettings};

/// The outcome of the most recent transaction addressed to one board.
#[derive(Debug, Clone)]
pub struct LastTransaction {
    pub ok: bool,
    pub detail: String,
    pub at_ms: i64,
}

/// A per-request TCP client bound to one gateway endpoint.
///
/// The endpoint is held behind a lock rather than fixed at construction
/// because `POST /api/config` can replace the gateway host/port/timeout
/// wholesale; every handler reads the current settings at transaction time.
#[derive(Debug)]
pub struct GatewayClient {
    settings: RwLock<GatewaySettings>,
    last: DashMap<u8, LastTransaction>,
}

impl GatewayClient {
    pub fn new(settings: GatewaySettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            last: DashMap::new(),
        }
    }

    pub fn settings(&self) -> GatewaySettings {
        self.settings.read().clone()
    }

    /// Swap in a new endpoint, e.g. after a configuration POST.
    pub fn update_settings(&self, settings: GatewaySettings) {
        *self.settings.write() = settings;
    }

    /// Snapshot of the last transaction outcome per address, for diagnostics.
    pub fn last_transactions(&self) -> Vec<(u8, LastTransaction)> {
        self.last
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    fn record(&self, address: u8, result: &Result<Frame>) {
        let entry = match result {
            Ok(_) => LastTransaction {
                ok: true,
                detail: "ok".to_string(),
                at_ms: now_ms(),
            },
            Err(err) => LastTransaction {
                ok: false,
                detail: err.to_string(),
                at_ms: now_ms(),
            },
        };
        self.last.insert(address, entry);
    }

    /// Send a 14-byte frame and wait for a 14-byte framed reply.
    pub async fn transact(&self, request: &Frame) -> Result<Frame> {
        let address = request.address;
        let started = std::time::Instant::now();
        debug!(address, frame_out = %request.to_hex(), "gateway transaction started");
        let result = timeout(self.deadline(), self.transact_inner(request)).await;
        let result = match result {
            Ok(inner) => inner,
            Err(_) => Err(BridgeError::Timeout),
        };
        match &result {
            Ok(reply) => debug!(
                address,
                frame_in = %reply.to_hex(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "gateway transaction ok"
            ),
            Err(err) => debug!(
                address,
                error = %err,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "gateway transaction failed"
            ),
        }
        self.record(address, &result);
        result
    }

    async fn transact_inner(&self, request: &Frame) -> Result<Frame> {
        let mut stream = self.connect().await?;
        let bytes = request.encode();
        stream
            .write_all(&bytes)
            .await
            .map_err(|e| BridgeError::transport(e.to_string()))?;

        let mut buf = Vec::with_capacity(FRAME_LEN * 2);
        let mut chunk = [0u8; 64];
        loop {
            if let Some((frame, _consumed)) = extract_frame(&buf) {
                return Ok(frame);
            }
            let n = stream
                .read(&mut chunk)
                .await
                .map_err(|e| BridgeError::transport(e.to_string()))?;
            if n == 0 {
                return Err(BridgeError::protocol("connection closed before a full frame arrived"));
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Raw byte exchange for the address-programming handshake, which is
    /// not framed with start/end delimiters.
    pub async fn raw_exchange(&self, out: &[u8], expect: usize) -> Result<Vec<u8>> {
        debug!(bytes_out = out.len(), expect, "raw gateway exchange started");
        let fut = async {
            let mut stream = self.connect().await?;
            stream
                .write_all(out)
                .await
                .map_err(|e| BridgeError::transport(e.to_string()))?;
            let mut buf = vec![0u8; expect];
            stream.read_exact(&mut buf).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    BridgeError::no_reply(format!(
                        "connection closed before {expect} expected bytes arrived"
                    ))
                } else {
                    BridgeError::transport(e.to_string())
                }
            })?;
            Ok(buf)
        };
        let result = match timeout(self.deadline(), fut).await {
            Ok(inner) => inner,
            Err(_) => Err(BridgeError::Timeout),
        };
        match &result {
            Ok(bytes) => debug!(bytes_in = bytes.len(), "raw gateway exchange ok"),
            Err(err) => debug!(error = %err, "raw gateway exchange failed"),
        }
        result
    }

    async fn connect(&self) -> Result<TcpStream> {
        let settings = self.settings();
        let addr = format!("{}:{}", settings.host, settings.port);
        TcpStream::connect(&addr)
            .await
            .map_err(|e| BridgeError::transport(format!("{addr}: {e}")))
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(self.settings().timeout_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn echo_server_once(reply: Vec<u8>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut discard = [0u8; FRAME_LEN];
            let _ = socket.read_exact(&mut discard).await;
            let _ = socket.write_all(&reply).await;
        });
        port
    }

    #[tokio::test]
    async fn transact_assembles_a_framed_reply() {
        let request = Frame::poll(5);
        let reply = Frame::new(5, 0x40, &[0u8; 10]).encode();
        let port = echo_server_once(reply.to_vec()).await;

        let client = GatewayClient::new(GatewaySettings {
            host: "127.0.0.1".to_string(),
            port,
            timeout_ms: 500,
        });

        let reply_frame = client.transact(&request).await.unwrap();
        assert_eq!(reply_frame.address, 5);
        assert_eq!(reply_frame.command, 0x40);
        assert!(client.last_transactions()[0].1.ok);
    }

    #[tokio::test]
    async fn transact_times_out_when_nothing_replies() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = GatewayClient::new(GatewaySettings {
            host: "127.0.0.1".to_string(),
            port,
            timeout_ms: 50,
        });

        let err = client.transact(&Frame::poll(1)).await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout));
    }

    #[tokio::test]
    async fn connect_failure_is_reported_as_transport_error() {
        let client = GatewayClient::new(GatewaySettings {
            host: "127.0.0.1".to_string(),
            port: 1, // almost certainly refused
            timeout_ms: 500,
        });
        let err = client.transact(&Frame::poll(1)).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
    }

    #[tokio::test]
    async fn raw_exchange_reports_no_reply_when_peer_closes_early() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut discard = [0u8; 1];
            let _ = socket.read_exact(&mut discard).await;
            // Close immediately without writing the expected ack byte.
        });

        let client = GatewayClient::new(GatewaySettings {
            host: "127.0.0.1".to_string(),
            port,
            timeout_ms: 500,
        });
        let err = client.raw_exchange(&[5], 1).await.unwrap_err();
        assert!(matches!(err, BridgeError::NoReply(_)));
    }
}
