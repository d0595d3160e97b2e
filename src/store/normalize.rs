//! Recursive normalisation of raw configuration documents: flexible
//! numeric encodings, clamping, slug generation, and the drop-vs-clamp
//! split between scalar settings and list entities.

use serde_json::Value;
use tracing::warn;

use crate::core::model::{Board, Configuration, GatewaySettings, Input, Light, Shutter, Thermostat};

/// Parse a JSON number, a decimal string, or a `0x`-prefixed hex string
/// into an integer. Anything else is unparseable.
fn numeric(value: Option<&Value>) -> Option<i64> {
    match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Some(Value::String(s)) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                i64::from_str_radix(hex, 16).ok()
            } else {
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
            }
        }
        _ => None,
    }
}

fn numeric_f64(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                i64::from_str_radix(hex, 16).ok().map(|n| n as f64)
            } else {
                s.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

/// Clamp a scalar setting into range, falling back to `default` when the
/// input cannot be parsed as a number at all.
fn clamp_or_default(value: Option<&Value>, min: i64, max: i64, default: i64) -> i64 {
    match numeric(value) {
        Some(n) => n.clamp(min, max),
        None => default,
    }
}

/// Validate a list-entity identifying field (address, relay, channel,
/// input index): out-of-range or unparseable means the entity itself is
/// rejected, not coerced to a neighbouring value.
fn validate_range(value: Option<&Value>, min: i64, max: i64) -> Option<i64> {
    numeric(value).filter(|n| (min..=max).contains(n))
}

fn byte_or(value: Option<&Value>, default: u8) -> u8 {
    numeric(value)
        .map(|n| n.clamp(0, 255) as u8)
        .unwrap_or(default)
}

fn bool_or_true(value: Option<&Value>) -> bool {
    !matches!(value, Some(Value::Bool(false)))
}

fn trimmed_or(value: Option<&Value>, fallback: impl Into<String>) -> String {
    match value.and_then(Value::as_str).map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => fallback.into(),
    }
}

/// Lower-case, replace anything outside `[a-z0-9_-]` with `-`, collapse
/// runs of `-`, trim the edges. Falls back to `role-<n>` when empty.
pub fn slugify(raw: &str, fallback_index: usize) -> String {
    let lowered = raw.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut last_was_dash = false;
    for ch in lowered.chars() {
        let mapped = if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-' {
            ch
        } else {
            '-'
        };
        if mapped == '-' {
            if last_was_dash {
                continue;
            }
            last_was_dash = true;
        } else {
            last_was_dash = false;
        }
        out.push(mapped);
    }
    let trimmed = out.trim_matches('-').to_string();
    if trimmed.is_empty() {
        format!("role-{fallback_index}")
    } else {
        trimmed
    }
}

/// Ensure every id in `ids` is unique, appending a deterministic `-<n>`
/// suffix to later duplicates. A generated candidate is itself re-checked
/// against every id seen so far (including earlier suffixed ones), so it
/// can never collide with a later explicit id — this is what keeps the
/// result both unique and idempotent under a second normalisation pass.
fn dedup_ids(ids: Vec<String>) -> Vec<String> {
    use std::collections::HashSet;
    let mut seen: HashSet<String> = HashSet::new();
    ids.into_iter()
        .map(|id| {
            if seen.insert(id.clone()) {
                return id;
            }
            let mut n = 1u32;
            loop {
                let candidate = format!("{id}-{n}");
                if seen.insert(candidate.clone()) {
                    break candidate;
                }
                n += 1;
            }
        })
        .collect()
}

fn object_field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.as_object().and_then(|m| m.get(key))
}

fn normalize_gateway(raw: Option<&Value>) -> GatewaySettings {
    let default = GatewaySettings::default();
    GatewaySettings {
        host: raw
            .and_then(|v| object_field(v, "host"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or(default.host),
        port: clamp_or_default(
            raw.and_then(|v| object_field(v, "port")),
            1,
            65535,
            default.port as i64,
        ) as u16,
        timeout_ms: clamp_or_default(
            raw.and_then(|v| object_field(v, "timeoutMs")),
            100,
            20000,
            default.timeout_ms as i64,
        ) as u32,
    }
}

fn normalize_input(raw: &Value, board_address: u8) -> Option<Input> {
    let index = validate_range(object_field(raw, "index"), 1, 8)? as u8;
    let target_address = clamp_or_default(
        object_field(raw, "targetAddress"),
        0,
        254,
        board_address as i64,
    ) as u8;
    Some(Input {
        index,
        name: trimmed_or(object_field(raw, "name"), format!("Ingresso {index}")),
        room: trimmed_or(object_field(raw, "room"), "Senza stanza"),
        enabled: bool_or_true(object_field(raw, "enabled")),
        g2: byte_or(object_field(raw, "g2"), 0),
        g3: byte_or(object_field(raw, "g3"), 0),
        g4: byte_or(object_field(raw, "g4"), 0),
        target_address,
    })
}

fn normalize_board(raw: &Value, position: usize) -> Option<Board> {
    let address = validate_range(object_field(raw, "address"), 0, 254)? as u8;
    let id_raw = object_field(raw, "id").and_then(Value::as_str).unwrap_or("");
    let id = slugify(id_raw, position);
    let name = trimmed_or(object_field(raw, "name"), format!("Scheda {address}"));

    let mut inputs: Vec<Input> = object_field(raw, "inputs")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|item| normalize_input(item, address))
                .collect()
        })
        .unwrap_or_default();
    inputs.sort_by_key(|input| input.index);
    inputs.dedup_by_key(|input| input.index);

    Some(Board {
        id,
        address,
        name,
        inputs,
    })
}

fn normalize_light(raw: &Value, position: usize) -> Option<Light> {
    let address = validate_range(object_field(raw, "address"), 0, 254)? as u8;
    let relay = validate_range(object_field(raw, "relay"), 1, 8)? as u8;
    let id_raw = object_field(raw, "id").and_then(Value::as_str).unwrap_or("");
    Some(Light {
        id: slugify(id_raw, position),
        name: trimmed_or(object_field(raw, "name"), format!("Luce {address}/{relay}")),
        room: trimmed_or(object_field(raw, "room"), "Senza stanza"),
        address,
        relay,
    })
}

fn normalize_shutter(raw: &Value, position: usize) -> Option<Shutter> {
    let address = validate_range(object_field(raw, "address"), 0, 254)? as u8;
    let channel = validate_range(object_field(raw, "channel"), 1, 4)? as u8;
    let id_raw = object_field(raw, "id").and_then(Value::as_str).unwrap_or("");
    Some(Shutter {
        id: slugify(id_raw, position),
        name: trimmed_or(
            object_field(raw, "name"),
            format!("Tapparella {address}/{channel}"),
        ),
        room: trimmed_or(object_field(raw, "room"), "Senza stanza"),
        address,
        channel,
    })
}

fn normalize_thermostat(raw: &Value, position: usize) -> Option<Thermostat> {
    let address = validate_range(object_field(raw, "address"), 0, 254)? as u8;
    let id_raw = object_field(raw, "id").and_then(Value::as_str).unwrap_or("");
    let setpoint = numeric_f64(object_field(raw, "setpoint")).unwrap_or(20.0);
    Some(Thermostat {
        id: slugify(id_raw, position),
        name: trimmed_or(object_field(raw, "name"), format!("Termostato {address}")),
        room: trimmed_or(object_field(raw, "room"), "Senza stanza"),
        address,
        setpoint,
    })
}

/// Normalise an arbitrary JSON document into a [`Configuration`], dropping
/// any board or entity whose identifying field is out of range, and
/// de-duplicating ids within each list.
pub fn normalize_configuration(raw: &Value) -> Configuration {
    let gateway = normalize_gateway(object_field(raw, "gateway"));
    let api_token = object_field(raw, "apiToken")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let mut boards: Vec<Board> = object_field(raw, "boards")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .enumerate()
                .filter_map(|(i, item)| {
                    let board = normalize_board(item, i);
                    if board.is_none() {
                        warn!(position = i, "dropping board with invalid address");
                    }
                    board
                })
                .collect()
        })
        .unwrap_or_default();
    let board_ids = dedup_ids(boards.iter().map(|b| b.id.clone()).collect());
    for (board, id) in boards.iter_mut().zip(board_ids) {
        board.id = id;
    }

    let mut lights: Vec<Light> = object_field(raw, "lights")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .enumerate()
                .filter_map(|(i, item)| normalize_light(item, i))
                .collect()
        })
        .unwrap_or_default();
    let light_ids = dedup_ids(lights.iter().map(|l| l.id.clone()).collect());
    for (light, id) in lights.iter_mut().zip(light_ids) {
        light.id = id;
    }

    let mut shutters: Vec<Shutter> = object_field(raw, "shutters")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .enumerate()
                .filter_map(|(i, item)| normalize_shutter(item, i))
                .collect()
        })
        .unwrap_or_default();
    let shutter_ids = dedup_ids(shutters.iter().map(|s| s.id.clone()).collect());
    for (shutter, id) in shutters.iter_mut().zip(shutter_ids) {
        shutter.id = id;
    }

    let mut thermostats: Vec<Thermostat> = object_field(raw, "thermostats")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .enumerate()
                .filter_map(|(i, item)| normalize_thermostat(item, i))
                .collect()
        })
        .unwrap_or_default();
    let thermostat_ids = dedup_ids(thermostats.iter().map(|t| t.id.clone()).collect());
    for (thermostat, id) in thermostats.iter_mut().zip(thermostat_ids) {
        thermostat.id = id;
    }

    Configuration {
        gateway,
        api_token,
        boards,
        lights,
        shutters,
        thermostats,
    }
}

/// Re-run normalisation on an already-normalised configuration by
/// round-tripping it through JSON. Used to prove idempotence.
pub fn renormalize(config: &Configuration) -> Configuration {
    let value = serde_json::to_value(config).expect("Configuration always serializes");
    normalize_configuration(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("  Cucina Luce!! ", 0), "cucina-luce");
        assert_eq!(slugify("###", 3), "role-3");
        assert_eq!(slugify("Already-ok_1", 0), "already-ok_1");
    }

    #[test]
    fn address_255_is_rejected_254_is_accepted() {
        let raw = json!({
            "boards": [
                {"id": "a", "address": 255, "name": "A"},
                {"id": "b", "address": 254, "name": "B"},
            ]
        });
        let config = normalize_configuration(&raw);
        assert_eq!(config.boards.len(), 1);
        assert_eq!(config.boards[0].address, 254);
    }

    #[test]
    fn relay_0_and_9_rejected_1_and_8_accepted() {
        let raw = json!({
            "lights": [
                {"id": "l0", "address": 1, "relay": 0},
                {"id": "l9", "address": 1, "relay": 9},
                {"id": "l1", "address": 1, "relay": 1},
                {"id": "l8", "address": 1, "relay": 8},
            ]
        });
        let config = normalize_configuration(&raw);
        let relays: Vec<u8> = config.lights.iter().map(|l| l.relay).collect();
        assert_eq!(relays, vec![1, 8]);
    }

    #[test]
    fn timeout_clamps_both_directions() {
        let raw = json!({"gateway": {"timeoutMs": 50}});
        assert_eq!(normalize_configuration(&raw).gateway.timeout_ms, 100);
        let raw = json!({"gateway": {"timeoutMs": 30000}});
        assert_eq!(normalize_configuration(&raw).gateway.timeout_ms, 20000);
    }

    #[test]
    fn hex_strings_are_tolerated() {
        let raw = json!({"gateway": {"port": "0x1ff"}});
        assert_eq!(normalize_configuration(&raw).gateway.port, 0x1ff);
    }

    #[test]
    fn duplicate_ids_get_suffixed() {
        let raw = json!({
            "lights": [
                {"id": "kitchen", "address": 1, "relay": 1},
                {"id": "kitchen", "address": 1, "relay": 2},
            ]
        });
        let config = normalize_configuration(&raw);
        assert_eq!(config.lights[0].id, "kitchen");
        assert_eq!(config.lights[1].id, "kitchen-1");
    }

    #[test]
    fn a_generated_suffix_never_collides_with_a_later_explicit_id() {
        let raw = json!({
            "lights": [
                {"id": "kitchen", "address": 1, "relay": 1},
                {"id": "kitchen", "address": 1, "relay": 2},
                {"id": "kitchen-1", "address": 1, "relay": 3},
            ]
        });
        let config = normalize_configuration(&raw);
        let ids: Vec<&str> = config.lights.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["kitchen", "kitchen-1", "kitchen-1-1"]);

        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());

        let twice = renormalize(&config);
        let ids_twice: Vec<&str> = twice.lights.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ids_twice);
    }

    #[test]
    fn normalisation_is_idempotent() {
        let raw = json!({
            "gateway": {"host": "10.0.0.5", "port": "0x5dc", "timeoutMs": 900},
            "apiToken": "secret",
            "boards": [{"id": "Board One!", "address": 3, "name": "  "}],
            "lights": [{"id": "", "address": 3, "relay": 2, "name": "Luce"}],
        });
        let once = normalize_configuration(&raw);
        let twice = renormalize(&once);
        assert_eq!(once, twice);
    }
}
