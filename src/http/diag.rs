//! `GET /api/diag`: additive, token-gated observability endpoint (not in
//! spec.md's route table — see SPEC_FULL.md §2). Present-tense state only,
//! no historical log, consistent with the Non-goal on historical readings.

use serde::Serialize;

use crate::app::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressOutcome {
    pub address: u8,
    pub ok: bool,
    pub detail: String,
    pub at_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagReply {
    pub ok: bool,
    pub uptime_secs: u64,
    pub boards_configured: usize,
    pub addresses_locked: usize,
    pub addresses_tracked: usize,
    pub last_transactions: Vec<AddressOutcome>,
}

pub async fn handle(state: &AppState) -> DiagReply {
    let config = state.store.config().await;
    let mut last_transactions: Vec<AddressOutcome> = state
        .gateway
        .last_transactions()
        .into_iter()
        .map(|(address, last)| AddressOutcome {
            address,
            ok: last.ok,
            detail: last.detail,
            at_ms: last.at_ms,
        })
        .collect();
    last_transactions.sort_by_key(|o| o.address);

    DiagReply {
        ok: true,
        uptime_secs: state.started_at.elapsed().as_secs(),
        boards_configured: config.boards.len(),
        addresses_locked: state.locks.held_count(),
        addresses_tracked: state.locks.tracked_addresses(),
        last_transactions,
    }
}
