//! The status aggregator (C7): collects per-address polls, projects them
//! onto the configured entity model, infers light state when no fresh
//! poll is available, and groups everything by room.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::core::error::Result;
use crate::core::frame::{is_input_active, Frame};
use crate::core::model::{
    now_ms, BoardSnapshot, DerivedShutterState, ShutterAction as DerivedShutterAction,
};
use crate::gateway::{AddressLocks, GatewayClient};
use crate::store::Store;

/// Transact a poll with `address`, decode it, store the snapshot, and
/// return it. Shared by the aggregator's refresh pass and the standalone
/// poll command handler.
pub async fn poll_and_store(
    gateway: &GatewayClient,
    locks: &AddressLocks,
    store: &Store,
    address: u8,
) -> Result<BoardSnapshot> {
    let _guard = locks.acquire(address).await;
    let reply = gateway.transact(&Frame::poll(address)).await?;
    let decoded = crate::core::frame::decode_poll(&reply.g);
    let snapshot = BoardSnapshot::from_poll(address, decoded, reply.to_hex());
    store.put_snapshot(snapshot.clone()).await;
    Ok(snapshot)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightView {
    pub id: String,
    pub name: String,
    pub address: u8,
    pub relay: u8,
    pub is_on: Option<bool>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutterView {
    pub id: String,
    pub name: String,
    pub address: u8,
    pub channel: u8,
    pub last_action: DerivedShutterAction,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatView {
    pub id: String,
    pub name: String,
    pub address: u8,
    pub temperature: Option<f64>,
    pub setpoint: Option<f64>,
    pub board_setpoint: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputView {
    pub board_id: String,
    pub index: u8,
    pub name: String,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RoomGroup {
    pub room: String,
    #[serde(default)]
    pub lights: Vec<LightView>,
    #[serde(default)]
    pub shutters: Vec<ShutterView>,
    #[serde(default)]
    pub thermostats: Vec<ThermostatView>,
    #[serde(default)]
    pub inputs: Vec<InputView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshError {
    pub address: u8,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    pub ok: bool,
    pub updated_at: i64,
    pub refresh_errors: Vec<RefreshError>,
    pub rooms: Vec<RoomGroup>,
}

/// The light on/off inference rule (spec §4.7): a fresh snapshot always
/// wins; absent that, an explicit on/off action wins; absent that, a
/// toggle (including `toggle_no_ack`, per the open question on hardware
/// ack suppression) flips the previous value when it is known; otherwise
/// the previous value (or unknown) carries forward unchanged.
pub fn infer_light_state(
    relay: u8,
    snapshot: Option<&BoardSnapshot>,
    previous_is_on: Option<bool>,
    action: Option<crate::core::frame::LightAction>,
) -> Option<bool> {
    use crate::core::frame::LightAction;

    if let Some(snapshot) = snapshot {
        let bit = 1u8 << (relay - 1);
        return Some(snapshot.output_mask & bit != 0);
    }
    match action {
        Some(LightAction::On) => Some(true),
        Some(LightAction::Off) => Some(false),
        Some(LightAction::Toggle) | Some(LightAction::ToggleNoAck) => {
            previous_is_on.map(|v| !v).or(previous_is_on)
        }
        _ => previous_is_on,
    }
}

fn room_or_default(room: &str) -> String {
    let trimmed = room.trim();
    if trimmed.is_empty() {
        "Senza stanza".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Run the status aggregation described in spec §4.7.
pub async fn aggregate_status(
    gateway: &GatewayClient,
    locks: &AddressLocks,
    store: &Store,
    refresh: bool,
) -> StatusResult {
    let config = store.config().await;

    let mut addresses: BTreeSet<u8> = BTreeSet::new();
    for board in &config.boards {
        addresses.insert(board.address);
    }
    for light in &config.lights {
        addresses.insert(light.address);
    }
    for shutter in &config.shutters {
        addresses.insert(shutter.address);
    }
    for thermostat in &config.thermostats {
        addresses.insert(thermostat.address);
    }

    let mut refresh_errors = Vec::new();
    if refresh {
        for address in addresses.iter().copied() {
            if let Err(err) = poll_and_store(gateway, locks, store, address).await {
                refresh_errors.push(RefreshError {
                    address,
                    error: err.to_string(),
                });
            }
        }
    }

    let state = store.state().await;
    let mut rooms: BTreeMap<String, RoomGroup> = BTreeMap::new();

    for light in &config.lights {
        let snapshot = state.snapshot(light.address);
        let previous = state.lights.get(&light.id).and_then(|d| d.is_on);
        let is_on = infer_light_state(light.relay, snapshot, previous, None);
        let room = room_or_default(&light.room);
        rooms
            .entry(room.clone())
            .or_insert_with(|| RoomGroup {
                room,
                ..Default::default()
            })
            .lights
            .push(LightView {
                id: light.id.clone(),
                name: light.name.clone(),
                address: light.address,
                relay: light.relay,
                is_on,
                updated_at: state
                    .lights
                    .get(&light.id)
                    .map(|d| d.updated_at)
                    .unwrap_or_else(now_ms),
            });
    }

    for shutter in &config.shutters {
        let derived = state
            .shutters
            .get(&shutter.id)
            .cloned()
            .unwrap_or_else(|| DerivedShutterState {
                last_action: DerivedShutterAction::Unknown,
                updated_at: now_ms(),
            });
        let room = room_or_default(&shutter.room);
        rooms
            .entry(room.clone())
            .or_insert_with(|| RoomGroup {
                room,
                ..Default::default()
            })
            .shutters
            .push(ShutterView {
                id: shutter.id.clone(),
                name: shutter.name.clone(),
                address: shutter.address,
                channel: shutter.channel,
                last_action: derived.last_action,
                updated_at: derived.updated_at,
            });
    }

    for thermostat in &config.thermostats {
        let snapshot = state.snapshot(thermostat.address);
        let setpoint = state
            .thermostats
            .get(&thermostat.id)
            .and_then(|d| d.setpoint)
            .or(Some(thermostat.setpoint));
        let room = room_or_default(&thermostat.room);
        rooms
            .entry(room.clone())
            .or_insert_with(|| RoomGroup {
                room,
                ..Default::default()
            })
            .thermostats
            .push(ThermostatView {
                id: thermostat.id.clone(),
                name: thermostat.name.clone(),
                address: thermostat.address,
                temperature: snapshot.map(|s| s.temperature),
                setpoint,
                board_setpoint: snapshot.map(|s| s.setpoint as f64),
            });
    }

    for board in &config.boards {
        let snapshot = state.snapshot(board.address);
        for input in &board.inputs {
            let active = snapshot.map(|s| is_input_active(s.input_mask, input.index));
            let room = room_or_default(&input.room);
            rooms
                .entry(room.clone())
                .or_insert_with(|| RoomGroup {
                    room,
                    ..Default::default()
                })
                .inputs
                .push(InputView {
                    board_id: board.id.clone(),
                    index: input.index,
                    name: input.name.clone(),
                    active,
                });
        }
    }

    StatusResult {
        ok: true,
        updated_at: state.updated_at,
        refresh_errors,
        rooms: rooms.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::LightAction;

    fn snapshot_with_output(mask: u8) -> BoardSnapshot {
        let decoded = crate::core::frame::decode_poll(&{
            let mut g = [0u8; 10];
            g[1] = mask;
            g
        });
        BoardSnapshot::from_poll(1, decoded, String::new())
    }

    #[test]
    fn snapshot_wins_over_previous_and_action() {
        let snapshot = snapshot_with_output(0b0000_0100);
        let is_on = infer_light_state(3, Some(&snapshot), Some(false), Some(LightAction::Off));
        assert_eq!(is_on, Some(true));
    }

    #[test]
    fn explicit_on_off_wins_without_a_snapshot() {
        assert_eq!(
            infer_light_state(1, None, None, Some(LightAction::On)),
            Some(true)
        );
        assert_eq!(
            infer_light_state(1, None, Some(true), Some(LightAction::Off)),
            Some(false)
        );
    }

    #[test]
    fn toggle_flips_known_previous_value() {
        assert_eq!(
            infer_light_state(1, None, Some(true), Some(LightAction::Toggle)),
            Some(false)
        );
        assert_eq!(
            infer_light_state(1, None, Some(false), Some(LightAction::ToggleNoAck)),
            Some(true)
        );
    }

    #[test]
    fn toggle_with_unknown_previous_stays_unknown() {
        assert_eq!(infer_light_state(1, None, None, Some(LightAction::Toggle)), None);
    }

    #[test]
    fn pulse_carries_previous_value_forward() {
        assert_eq!(
            infer_light_state(1, None, Some(true), Some(LightAction::Pulse)),
            Some(true)
        );
        assert_eq!(infer_light_state(1, None, None, Some(LightAction::Pulse)), None);
    }

    #[test]
    fn empty_room_maps_to_default() {
        assert_eq!(room_or_default(""), "Senza stanza");
        assert_eq!(room_or_default("  "), "Senza stanza");
        assert_eq!(room_or_default("Cucina"), "Cucina");
    }
}
