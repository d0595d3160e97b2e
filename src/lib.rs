//! # algodomo-bridge
//!
//! An HTTP bridge between a simple control API and a field bus of
//! Algo_Domo v1.6 home-automation boards reachable through a TCP gateway.
//!
//! Each board carries eight relays, eight opto-isolated inputs, a dimmer
//! channel, an analogue temperature input and a thermostat setpoint.
//! Clients issue plain HTTP GET requests naming a logical entity (a light,
//! a shutter, a thermostat, a board) and an action; this crate translates
//! them into 14-byte binary frames, transacts with the gateway over TCP,
//! and exposes the decoded board state as JSON.
//!
//! ## Layout
//!
//! - [`core`] — the wire codec (C1), the data model (§3) and the
//!   crate-wide error type.
//! - [`gateway`] — the per-transaction TCP client (C2) and the per-address
//!   lock registry (C3).
//! - [`store`] — config/state load, normalisation and atomic persistence
//!   (C4).
//! - [`entities`] — the entity resolver (C5).
//! - [`handlers`] — the command handlers (C6).
//! - [`aggregator`] — the status aggregator (C7).
//! - [`http`] — the axum route table, token gate and static file serving
//!   (C8).

pub mod aggregator;
pub mod app;
pub mod core;
pub mod entities;
pub mod gateway;
pub mod handlers;
pub mod http;
pub mod store;

pub use app::AppState;
pub use core::error::{BridgeError, Result};
