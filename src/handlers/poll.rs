//! `GET /api/cmd/poll` (C6): standalone poll of one board address.

use crate::aggregator::poll_and_store;
use crate::app::AppState;
use crate::core::error::Result;
use crate::core::model::BoardSnapshot;
use crate::http::query::{require_u8, RawQuery};

pub async fn handle(state: &AppState, query: &RawQuery) -> Result<BoardSnapshot> {
    let address = require_u8(query, "address")?;
    poll_and_store(&state.gateway, &state.locks, &state.store, address).await
}
