//! `GET /api/cmd/apply-inputs` (C6): push the input-configuration payload
//! (command `0x55`) for every enabled input of every matching board.
//!
//! This is the one collector (spec §7): per-input failures never abort the
//! sweep, they are accumulated and the top-level `ok` is their logical AND.

use serde::Serialize;

use crate::app::AppState;
use crate::core::error::Result;
use crate::core::frame::{Frame, CMD_INPUT_CONFIG};
use crate::http::query::{opt_str, opt_u8, RawQuery};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputResult {
    pub board_id: String,
    pub index: u8,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyInputsReply {
    pub ok: bool,
    pub results: Vec<InputResult>,
}

pub async fn handle(state: &AppState, query: &RawQuery) -> Result<ApplyInputsReply> {
    let board_filter = opt_str(query, "board").filter(|s| !s.is_empty());
    let address_filter = opt_u8(query, "address")?;

    let config = state.store.config().await;
    let mut results = Vec::new();

    for board in config.boards.iter().filter(|b| {
        board_filter.map_or(true, |id| b.id == id)
            && address_filter.map_or(true, |addr| b.address == addr)
    }) {
        let mut inputs: Vec<_> = board.inputs.iter().filter(|i| i.enabled).collect();
        inputs.sort_by_key(|i| i.index);

        for input in inputs {
            let frame = Frame::new(
                board.address,
                CMD_INPUT_CONFIG,
                &[input.index, input.g2, input.g3, input.g4, input.target_address],
            );
            let outcome = {
                let _guard = state.locks.acquire(board.address).await;
                state.gateway.transact(&frame).await
            };
            results.push(match outcome {
                Ok(_) => InputResult {
                    board_id: board.id.clone(),
                    index: input.index,
                    ok: true,
                    error: None,
                },
                Err(err) => InputResult {
                    board_id: board.id.clone(),
                    index: input.index,
                    ok: false,
                    error: Some(err.to_string()),
                },
            });
        }
    }

    let ok = results.iter().all(|r| r.ok);
    Ok(ApplyInputsReply { ok, results })
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

    async fn ack_only_gateway() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 14];
                if socket.read_exact(&mut buf).await.is_err() {
                    continue;
                }
                let _ = socket.write_all(&buf).await;
            }
        });
        port
    }

    async fn state_with_board(port: u16) -> AppState {
        let dir = tempdir().unwrap();
        let store = Store::load(dir.path().to_path_buf()).await.unwrap();
        store
            .replace_config(serde_json::json!({
                "boards": [{
                    "id": "board-1",
                    "address": 1,
                    "name": "Quadro",
                    "inputs": [
                        {"index": 1, "name": "Porta", "room": "", "enabled": true, "g2": 0, "g3": 0, "g4": 0, "targetAddress": 0},
                        {"index": 2, "name": "Finestra", "room": "", "enabled": false, "g2": 0, "g3": 0, "g4": 0, "targetAddress": 0}
                    ]
                }]
            }))
            .await
            .unwrap();
        let gateway = Arc::new(GatewayClient::new(GatewaySettings {
            host: "127.0.0.1".to_string(),
            port,
            timeout_ms: 500,
        }));
        let locks = Arc::new(AddressLocks::new());
        AppState::new(store, gateway, locks, dir.path().to_path_buf())
    }

    #[tokio::test]
    async fn only_enabled_inputs_are_pushed() {
        let port = ack_only_gateway().await;
        let state = state_with_board(port).await;
        let reply = handle(&state, &query(&[])).await.unwrap();
        assert!(reply.ok);
        assert_eq!(reply.results.len(), 1);
        assert_eq!(reply.results[0].index, 1);
    }

    #[tokio::test]
    async fn a_transaction_failure_does_not_abort_the_sweep() {
        // Nothing is listening on this port, so every transaction fails.
        let state = state_with_board(1).await;
        let reply = handle(&state, &query(&[])).await.unwrap();
        assert!(!reply.ok);
        assert_eq!(reply.results.len(), 1);
        assert!(!reply.results[0].ok);
        assert!(reply.results[0].error.is_some());
    }
}
