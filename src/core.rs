//! Core abstractions for the Algo_Domo bridge.
//!
//! This module holds the wire codec, the crate-wide error type, and the
//! data model shared by every other component.

pub mod error;
pub mod frame;
pub mod model;

pub use error::{BridgeError, Result};
