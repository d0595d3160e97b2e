//! The field-bus side of the bridge: a per-request TCP client and the
//! per-address lock registry that serialises transactions to the same
//! board.

pub mod locks;
pub mod transport;

pub use locks::AddressLocks;
pub use transport::{GatewayClient, LastTransaction};
