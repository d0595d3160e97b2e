//! `GET /api/cmd/thermostat` (C6): push a setpoint.

use serde::Serialize;

use crate::aggregator::poll_and_store;
use crate::app::AppState;
use crate::core::error::Result;
use crate::core::frame::{split_setpoint, Frame, CMD_THERMOSTAT};
use crate::core::model::{now_ms, DerivedThermostatState};
use crate::entities::resolve_thermostat;
use crate::handlers::light::EntityRef;
use crate::http::query::{opt_str, opt_u8, require_f64, RawQuery};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatReply {
    pub ok: bool,
    pub entity: EntityRef,
    pub setpoint: f64,
    pub frame_hex: String,
}

pub async fn handle(state: &AppState, query: &RawQuery) -> Result<ThermostatReply> {
    let set = require_f64(query, "set")?;

    let config = state.store.config().await;
    let id = opt_str(query, "id");
    let address_param = opt_u8(query, "address")?;
    let thermostat = resolve_thermostat(&config, id, address_param)?.clone();

    // The wire cannot transmit a negative setpoint; only the magnitude is
    // split into integer/tenth (spec §4.6, testable property §8: `set=-0.04`
    // encodes as `(0,0)`).
    let (integer, tenth) = split_setpoint(set.abs())?;
    let frame = Frame::new(thermostat.address, CMD_THERMOSTAT, &[integer, tenth]);
    {
        let _guard = state.locks.acquire(thermostat.address).await;
        state.gateway.transact(&frame).await?;
    }

    let _ = poll_and_store(&state.gateway, &state.locks, &state.store, thermostat.address).await;

    state
        .store
        .put_thermostat_state(
            &thermostat.id,
            DerivedThermostatState {
                setpoint: Some(set),
                updated_at: now_ms(),
            },
        )
        .await;

    Ok(ThermostatReply {
        ok: true,
        entity: EntityRef {
            id: thermostat.id,
            address: thermostat.address,
        },
        setpoint: set,
        frame_hex: frame.to_hex(),
    })
}
