//! Switchboard Relay
//!
//! Connects the switchboard core to a live realtime websocket, and replays
//! recorded sessions offline.

pub mod bridge;
pub mod config;
pub mod manifest;
pub mod replay;
