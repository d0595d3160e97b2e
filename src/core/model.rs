//! The data model shared by the config/state store, the entity resolver,
//! the command handlers and the status aggregator (spec §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::frame::PollDecoded;

/// Current time as milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A configurable opto input on a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    pub index: u8,
    pub name: String,
    pub room: String,
    pub enabled: bool,
    pub g2: u8,
    pub g3: u8,
    pub g4: u8,
    pub target_address: u8,
}

/// A logical controller on the Algo_Domo bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub address: u8,
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<Input>,
}

/// A relay-driven light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Light {
    pub id: String,
    pub name: String,
    pub room: String,
    pub address: u8,
    pub relay: u8,
}

/// A roller-blind output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shutter {
    pub id: String,
    pub name: String,
    pub room: String,
    pub address: u8,
    pub channel: u8,
}

/// A thermostat setpoint channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thermostat {
    pub id: String,
    pub name: String,
    pub room: String,
    pub address: u8,
    pub setpoint: f64,
}

/// TCP gateway connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySettings {
    pub host: String,
    pub port: u16,
    pub timeout_ms: u32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1470,
            timeout_ms: 1200,
        }
    }
}

/// The full, user-authoritative configuration document (`config.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub boards: Vec<Board>,
    #[serde(default)]
    pub lights: Vec<Light>,
    #[serde(default)]
    pub shutters: Vec<Shutter>,
    #[serde(default)]
    pub thermostats: Vec<Thermostat>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            gateway: GatewaySettings::default(),
            api_token: String::new(),
            boards: Vec::new(),
            lights: Vec::new(),
            shutters: Vec::new(),
            thermostats: Vec::new(),
        }
    }
}

/// The decoded result of the most recent poll of one board address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub address: u8,
    pub board_type: u8,
    pub release: u8,
    pub output_mask: u8,
    pub input_mask: u8,
    /// Channel ("1".."8") to output-bit state, not inverted.
    pub outputs: HashMap<String, bool>,
    /// Channel ("1".."8") to input-bit state, not inverted — the wire's
    /// raw bit value. Electrical "active" is the *inverse* of this bit and
    /// is computed by the aggregator, never here.
    pub inputs: HashMap<String, bool>,
    pub dimmer: u8,
    pub temperature: f64,
    pub power_kw: f64,
    pub setpoint: u8,
    pub updated_at: i64,
    pub frame_hex: String,
}

impl BoardSnapshot {
    /// Build a snapshot from a decoded poll reply.
    pub fn from_poll(address: u8, decoded: PollDecoded, frame_hex: String) -> Self {
        let mut outputs = HashMap::with_capacity(8);
        let mut inputs = HashMap::with_capacity(8);
        for channel in 1..=8u8 {
            let bit = 1u8 << (channel - 1);
            outputs.insert(channel.to_string(), decoded.output_mask & bit != 0);
            inputs.insert(channel.to_string(), decoded.input_mask & bit != 0);
        }
        Self {
            address,
            board_type: decoded.board_type,
            release: decoded.release,
            output_mask: decoded.output_mask,
            input_mask: decoded.input_mask,
            outputs,
            inputs,
            dimmer: decoded.dimmer,
            temperature: decoded.temperature,
            power_kw: decoded.power_kw,
            setpoint: decoded.setpoint,
            updated_at: now_ms(),
            frame_hex,
        }
    }
}

/// Whether a relay-driven light is believed to be on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedLightState {
    pub is_on: Option<bool>,
    pub updated_at: i64,
}

impl Default for DerivedLightState {
    fn default() -> Self {
        Self {
            is_on: None,
            updated_at: now_ms(),
        }
    }
}

/// The last action commanded on a shutter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutterAction {
    Up,
    Down,
    Stop,
    Unknown,
}

impl Default for ShutterAction {
    fn default() -> Self {
        Self::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedShutterState {
    #[serde(default)]
    pub last_action: ShutterAction,
    pub updated_at: i64,
}

impl Default for DerivedShutterState {
    fn default() -> Self {
        Self {
            last_action: ShutterAction::Unknown,
            updated_at: now_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedThermostatState {
    pub setpoint: Option<f64>,
    pub updated_at: i64,
}

impl Default for DerivedThermostatState {
    fn default() -> Self {
        Self {
            setpoint: None,
            updated_at: now_ms(),
        }
    }
}

/// Process-wide persisted state (`state.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    /// Keyed by board address, formatted as a decimal string.
    #[serde(default)]
    pub boards: HashMap<String, BoardSnapshot>,
    #[serde(default)]
    pub lights: HashMap<String, DerivedLightState>,
    #[serde(default)]
    pub shutters: HashMap<String, DerivedShutterState>,
    #[serde(default)]
    pub thermostats: HashMap<String, DerivedThermostatState>,
    #[serde(default)]
    pub updated_at: i64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            boards: HashMap::new(),
            lights: HashMap::new(),
            shutters: HashMap::new(),
            thermostats: HashMap::new(),
            updated_at: now_ms(),
        }
    }
}

impl State {
    /// Record a board snapshot, keyed by its own address so the invariant
    /// `BoardSnapshot.address == key` always holds.
    pub fn put_snapshot(&mut self, snapshot: BoardSnapshot) {
        self.boards.insert(snapshot.address.to_string(), snapshot);
    }

    pub fn snapshot(&self, address: u8) -> Option<&BoardSnapshot> {
        self.boards.get(&address.to_string())
    }
}
