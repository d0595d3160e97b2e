//! Command handlers (C6): one module per `/api/cmd/*` route. Each follows
//! the same shape — parse → resolve → acquire address lock → build frame →
//! transact → decode → update state → reply — described in spec §4.6.

pub mod apply_inputs;
pub mod light;
pub mod poll;
pub mod program_address;
pub mod shutter;
pub mod thermostat;
