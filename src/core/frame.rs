//! The Algo_Domo v1.6 frame codec (C1).
//!
//! Every transaction with a board is a fixed 14-byte frame:
//!
//! ```text
//! offset 0   : START     = 0x49
//! offset 1   : address   (byte)
//! offset 2   : command   (byte)
//! offset 3-12: g[0..9]   (ten payload bytes)
//! offset 13  : END       = 0x46
//! ```
//!
//! The one exception is address programming, which exchanges a single raw
//! byte instead of a framed reply; that path lives in [`crate::gateway`] and
//! never touches [`decode_frame`].

use crate::core::error::{BridgeError, Result};

/// Total length of an Algo_Domo frame.
pub const FRAME_LEN: usize = 14;
/// Frame delimiter at offset 0.
pub const START: u8 = 0x49;
/// Frame delimiter at offset 13.
pub const END: u8 = 0x46;
/// Number of payload (`g`) bytes carried by a frame.
pub const G_LEN: usize = 10;

/// Extended polling command: no payload, returns a full board snapshot.
pub const CMD_POLL: u8 = 0x40;
/// Shutter command: `g[0]` = channel (1..4), `g[1]` = action code.
pub const CMD_SHUTTER: u8 = 0x5c;
/// Thermostat setpoint command: `g[0]` = integer part, `g[1]` = tenth.
pub const CMD_THERMOSTAT: u8 = 0x5a;
/// Input configuration push: `g[0]` = index, `g[1..3]` = g2/g3/g4, `g[4]` = target address.
pub const CMD_INPUT_CONFIG: u8 = 0x55;
/// Reserved: query input configuration. Not actively issued.
pub const CMD_INPUT_CONFIG_QUERY: u8 = 0x56;

/// A decoded or to-be-encoded Algo_Domo frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub address: u8,
    pub command: u8,
    pub g: [u8; G_LEN],
}

impl Frame {
    /// Build a frame, clamping address/g-bytes to their byte range (always
    /// true for a `u8`) and defaulting `command` to the poll command when
    /// unspecified by the caller.
    pub fn new(address: u8, command: u8, g: &[u8]) -> Self {
        let mut padded = [0u8; G_LEN];
        let n = g.len().min(G_LEN);
        padded[..n].copy_from_slice(&g[..n]);
        Self {
            address,
            command,
            g: padded,
        }
    }

    /// Build a poll frame (command `0x40`, empty payload) for `address`.
    pub fn poll(address: u8) -> Self {
        Self::new(address, CMD_POLL, &[])
    }

    /// Serialize to the wire representation.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut buf = [0u8; FRAME_LEN];
        buf[0] = START;
        buf[1] = self.address;
        buf[2] = self.command;
        buf[3..13].copy_from_slice(&self.g);
        buf[13] = END;
        buf
    }

    /// Parse a 14-byte slice known to already be delimited correctly.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != FRAME_LEN {
            return Err(BridgeError::protocol(format!(
                "frame must be {FRAME_LEN} bytes, got {}",
                buf.len()
            )));
        }
        if buf[0] != START || buf[FRAME_LEN - 1] != END {
            return Err(BridgeError::protocol("missing frame delimiters"));
        }
        let mut g = [0u8; G_LEN];
        g.copy_from_slice(&buf[3..13]);
        Ok(Self {
            address: buf[1],
            command: buf[2],
            g,
        })
    }

    /// Lowercase hex representation of the encoded frame, for debugging.
    pub fn to_hex(&self) -> String {
        self.encode().iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Light action codes (relay commands), case-insensitively keyed by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightAction {
    On,
    Off,
    Pulse,
    Toggle,
    ToggleNoAck,
}

impl LightAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            "pulse" => Some(Self::Pulse),
            "toggle" => Some(Self::Toggle),
            "toggle_no_ack" => Some(Self::ToggleNoAck),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::On => 0x41,
            Self::Off => 0x53,
            Self::Pulse => 0x50,
            Self::Toggle => 0x55,
            Self::ToggleNoAck => 0x54,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Pulse => "pulse",
            Self::Toggle => "toggle",
            Self::ToggleNoAck => "toggle_no_ack",
        }
    }
}

/// Shutter action codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterAction {
    Up,
    Down,
    Stop,
}

impl ShutterAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Up => 0x55,
            Self::Down => 0x44,
            Self::Stop => 0x53,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Stop => "stop",
        }
    }
}

/// Map a relay channel (1..8) to its command byte.
///
/// Channels 1..4 use `0x51..0x54`; channels 5..8 use `0x65..0x68`.
pub fn relay_command(relay: u8) -> Result<u8> {
    match relay {
        1..=4 => Ok(0x51 + (relay - 1)),
        5..=8 => Ok(0x65 + (relay - 5)),
        _ => Err(BridgeError::bad_request(format!(
            "relay out of range: {relay}"
        ))),
    }
}

/// Scan a buffer left to right for the first complete frame.
///
/// Returns the decoded frame and the offset one past its last byte (i.e.
/// how many leading bytes a caller should drop). The 12 middle bytes are
/// never inspected while framing.
pub fn extract_frame(buf: &[u8]) -> Option<(Frame, usize)> {
    let len = buf.len();
    for i in 0..len {
        if buf[i] != START {
            continue;
        }
        if i + FRAME_LEN > len {
            break;
        }
        if buf[i + FRAME_LEN - 1] == END {
            let frame = Frame::decode(&buf[i..i + FRAME_LEN]).ok()?;
            return Some((frame, i + FRAME_LEN));
        }
    }
    None
}

/// Decoded fields of a polling reply payload (the ten `g` bytes of a
/// command-`0x40` response).
///
/// Layout: `g[0]` board type/release, `g[1]` output mask, `g[2]` input mask,
/// `g[3]` dimmer, `g[4..7]` temperature, `g[7]` power, `g[8]` setpoint,
/// `g[9]` reserved (see DESIGN.md for how this layout was derived).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollDecoded {
    pub board_type: u8,
    pub release: u8,
    pub output_mask: u8,
    pub input_mask: u8,
    pub dimmer: u8,
    pub temperature: f64,
    pub power_kw: f64,
    pub setpoint: u8,
}

/// Decode the payload of a polling reply frame.
///
/// Sign detection uses strict equality: `g[6] == 0x2d` means minus, any
/// other byte (including the expected `0x2b`) means plus.
pub fn decode_poll(g: &[u8; G_LEN]) -> PollDecoded {
    let sign = if g[6] == 0x2d { -1.0 } else { 1.0 };
    let magnitude = g[4] as f64 + (g[5] as f64) / 10.0;
    PollDecoded {
        board_type: g[0] & 0x0f,
        release: (g[0] >> 4) & 0x0f,
        output_mask: g[1],
        input_mask: g[2],
        dimmer: g[3],
        temperature: sign * magnitude,
        power_kw: g[7] as f64 / 10.0,
        setpoint: g[8],
    }
}

/// Split an absolute setpoint magnitude into `(integer, tenth)` for the
/// thermostat command, rounding the tenth half-away-from-zero.
///
/// Negative setpoints are not transmissible on this wire; callers pass the
/// absolute value. Returns an error if the integer part does not fit in
/// `0..=99`.
pub fn split_setpoint(magnitude: f64) -> Result<(u8, u8)> {
    if !magnitude.is_finite() || magnitude < 0.0 {
        return Err(BridgeError::bad_request("setpoint must be a finite, non-negative number"));
    }
    let tenths = (magnitude * 10.0).round() as i64;
    let integer = tenths / 10;
    let tenth = tenths % 10;
    if !(0..=99).contains(&integer) {
        return Err(BridgeError::bad_request(format!(
            "setpoint integer part out of range: {integer}"
        )));
    }
    Ok((integer as u8, tenth as u8))
}

/// True when input `index` (1..8) is electrically active.
///
/// The wire uses an inverted convention: a *clear* bit means active. This
/// must be applied exactly once, at the boundary between a decoded
/// snapshot and the entity projection that presents it to clients.
pub fn is_input_active(input_mask: u8, index: u8) -> bool {
    debug_assert!((1..=8).contains(&index));
    let bit = 1u8 << (index - 1);
    input_mask & bit == 0
}
