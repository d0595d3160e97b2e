//! `GET /api/cmd/program-address` (C6): the single-byte address-programming
//! handshake. Not a framed transaction — see spec §4.1/§9.

use serde::Serialize;

use crate::app::AppState;
use crate::core::error::Result;
use crate::http::query::{require_u8, RawQuery};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramAddressReply {
    pub ok: bool,
    pub ack: u8,
    pub ack_hex: String,
}

pub async fn handle(state: &AppState, query: &RawQuery) -> Result<ProgramAddressReply> {
    let address = require_u8(query, "address")?;
    let reply = {
        let _guard = state.locks.acquire(address).await;
        state.gateway.raw_exchange(&[address], 1).await?
    };
    let ack = reply[0];
    Ok(ProgramAddressReply {
        ok: true,
        ack,
        ack_hex: format!("0x{ack:02x}"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::app::AppState;
    use crate::core::model::GatewaySettings;
    use crate::gateway::{AddressLocks, GatewayClient};
    use crate::store::Store;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    async fn echo_one_byte() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut byte = [0u8; 1];
            let _ = socket.read_exact(&mut byte).await;
            let _ = socket.write_all(&byte).await;
        });
        port
    }

    #[tokio::test]
    async fn handshake_echoes_the_programmed_address() {
        let port = echo_one_byte().await;
        let dir = tempdir().unwrap();
        let store = Store::load(dir.path().to_path_buf()).await.unwrap();
        let gateway = Arc::new(GatewayClient::new(GatewaySettings {
            host: "127.0.0.1".to_string(),
            port,
            timeout_ms: 500,
        }));
        let locks = Arc::new(AddressLocks::new());
        let state = AppState::new(store, gateway, locks, dir.path().to_path_buf());

        let reply = handle(&state, &query(&[("address", "42")])).await.unwrap();
        assert_eq!(reply.ack, 42);
        assert_eq!(reply.ack_hex, "0x2a");
    }
}
