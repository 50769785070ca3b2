//! WebSocket bridge runtime connecting Warden to the bot gateway.

pub mod bridge_runtime;

pub use bridge_runtime::{run_warden_bridge, BridgeConfig};
