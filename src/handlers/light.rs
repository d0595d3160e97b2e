//! `GET /api/cmd/light` (C6): relay on/off/pulse/toggle.

use serde::Serialize;

use crate::aggregator::{infer_light_state, poll_and_store};
use crate::app::AppState;
use crate::core::error::{BridgeError, Result};
use crate::core::frame::{relay_command, Frame, LightAction};
use crate::core::model::DerivedLightState;
use crate::entities::resolve_light;
use crate::http::query::{opt_str, opt_u8, opt_u8_small, require_str, RawQuery};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightReply {
    pub ok: bool,
    pub entity: EntityRef,
    pub action: String,
    pub is_on: Option<bool>,
    pub frame_hex: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub id: String,
    pub address: u8,
}

pub async fn handle(state: &AppState, query: &RawQuery) -> Result<LightReply> {
    let action_raw = require_str(query, "action")?;
    let action = LightAction::parse(action_raw)
        .ok_or_else(|| BridgeError::bad_request(format!("unknown light action: {action_raw}")))?;

    let config = state.store.config().await;
    let id = opt_str(query, "id");
    let address_param = opt_u8(query, "address")?;
    let relay_param = opt_u8_small(query, "relay", 8)?;
    let light = resolve_light(&config, id, address_param, relay_param)?.clone();

    let command = relay_command(light.relay)?;
    let frame = Frame::new(light.address, command, &[action.code()]);

    {
        let _guard = state.locks.acquire(light.address).await;
        state.gateway.transact(&frame).await?;
    }

    // Best-effort poll after the lock is released: a fresh snapshot is the
    // strongest signal for the inference rule, but its absence must never
    // fail the primary command.
    let snapshot = poll_and_store(&state.gateway, &state.locks, &state.store, light.address)
        .await
        .ok();

    let previous = state.store.state().await.lights.get(&light.id).and_then(|d| d.is_on);
    let is_on = infer_light_state(light.relay, snapshot.as_ref(), previous, Some(action));

    state
        .store
        .put_light_state(
            &light.id,
            DerivedLightState {
                is_on,
                updated_at: crate::core::model::now_ms(),
            },
        )
        .await;

    Ok(LightReply {
        ok: true,
        entity: EntityRef {
            id: light.id,
            address: light.address,
        },
        action: action.as_str().to_string(),
        is_on,
        frame_hex: frame.to_hex(),
    })
}
