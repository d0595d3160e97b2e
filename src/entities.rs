//! The entity resolver (C5): look up a light, shutter, thermostat, or
//! board by its id, or by an `(address, sub-index)` pair when no id is
//! given. Never mutates state.

use crate::core::error::{BridgeError, Result};
use crate::core::model::{Board, Configuration, Light, Shutter, Thermostat};

fn non_empty(id: Option<&str>) -> Option<&str> {
    id.filter(|s| !s.is_empty())
}

/// Resolve a light by `id`, or else by `(address, relay)`.
pub fn resolve_light<'a>(
    config: &'a Configuration,
    id: Option<&str>,
    address: Option<u8>,
    relay: Option<u8>,
) -> Result<&'a Light> {
    if let Some(id) = non_empty(id) {
        return config
            .lights
            .iter()
            .find(|l| l.id == id)
            .ok_or_else(|| BridgeError::not_found(format!("light '{id}'")));
    }
    let address = address.ok_or_else(|| BridgeError::bad_request("address or id required"))?;
    let relay = relay.ok_or_else(|| BridgeError::bad_request("relay or id required"))?;
    config
        .lights
        .iter()
        .find(|l| l.address == address && l.relay == relay)
        .ok_or_else(|| BridgeError::not_found(format!("light at {address}/{relay}")))
}

/// Resolve a shutter by `id`, or else by `(address, channel)`.
pub fn resolve_shutter<'a>(
    config: &'a Configuration,
    id: Option<&str>,
    address: Option<u8>,
    channel: Option<u8>,
) -> Result<&'a Shutter> {
    if let Some(id) = non_empty(id) {
        return config
            .shutters
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| BridgeError::not_found(format!("shutter '{id}'")));
    }
    let address = address.ok_or_else(|| BridgeError::bad_request("address or id required"))?;
    let channel = channel.ok_or_else(|| BridgeError::bad_request("channel or id required"))?;
    config
        .shutters
        .iter()
        .find(|s| s.address == address && s.channel == channel)
        .ok_or_else(|| BridgeError::not_found(format!("shutter at {address}/{channel}")))
}

/// Resolve a thermostat by `id`, or else by `address` alone.
pub fn resolve_thermostat<'a>(
    config: &'a Configuration,
    id: Option<&str>,
    address: Option<u8>,
) -> Result<&'a Thermostat> {
    if let Some(id) = non_empty(id) {
        return config
            .thermostats
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| BridgeError::not_found(format!("thermostat '{id}'")));
    }
    let address = address.ok_or_else(|| BridgeError::bad_request("address or id required"))?;
    config
        .thermostats
        .iter()
        .find(|t| t.address == address)
        .ok_or_else(|| BridgeError::not_found(format!("thermostat at {address}")))
}

/// Resolve a board by `id`, or else by `address` alone.
pub fn resolve_board<'a>(
    config: &'a Configuration,
    id: Option<&str>,
    address: Option<u8>,
) -> Result<&'a Board> {
    if let Some(id) = non_empty(id) {
        return config
            .boards
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| BridgeError::not_found(format!("board '{id}'")));
    }
    let address = address.ok_or_else(|| BridgeError::bad_request("address or id required"))?;
    config
        .boards
        .iter()
        .find(|b| b.address == address)
        .ok_or_else(|| BridgeError::not_found(format!("board at {address}")))
}
