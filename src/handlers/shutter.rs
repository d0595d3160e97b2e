//! `GET /api/cmd/shutter` (C6): roller-blind up/down/stop.

use serde::Serialize;

use crate::app::AppState;
use crate::core::error::{BridgeError, Result};
use crate::core::frame::{Frame, ShutterAction, CMD_SHUTTER};
use crate::core::model::{now_ms, DerivedShutterState, ShutterAction as DerivedAction};
use crate::entities::resolve_shutter;
use crate::handlers::light::EntityRef;
use crate::http::query::{opt_str, opt_u8, opt_u8_small, require_str, RawQuery};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutterReply {
    pub ok: bool,
    pub entity: EntityRef,
    pub action: String,
    pub frame_hex: String,
}

pub async fn handle(state: &AppState, query: &RawQuery) -> Result<ShutterReply> {
    let action_raw = require_str(query, "action")?;
    let action = ShutterAction::parse(action_raw)
        .ok_or_else(|| BridgeError::bad_request(format!("unknown shutter action: {action_raw}")))?;

    let config = state.store.config().await;
    let id = opt_str(query, "id");
    let address_param = opt_u8(query, "address")?;
    let channel_param = opt_u8_small(query, "channel", 4)?;
    let shutter = resolve_shutter(&config, id, address_param, channel_param)?.clone();

    let frame = Frame::new(shutter.address, CMD_SHUTTER, &[shutter.channel, action.code()]);
    {
        let _guard = state.locks.acquire(shutter.address).await;
        state.gateway.transact(&frame).await?;
    }

    let derived = match action {
        ShutterAction::Up => DerivedAction::Up,
        ShutterAction::Down => DerivedAction::Down,
        ShutterAction::Stop => DerivedAction::Stop,
    };
    state
        .store
        .put_shutter_state(
            &shutter.id,
            DerivedShutterState {
                last_action: derived,
                updated_at: now_ms(),
            },
        )
        .await;

    Ok(ShutterReply {
        ok: true,
        entity: EntityRef {
            id: shutter.id,
            address: shutter.address,
        },
        action: action.as_str().to_string(),
        frame_hex: frame.to_hex(),
    })
}
