//! # parley-channel
//!
//! Resilient duplex channel to the tutor service: bounded offline queue,
//! exponential reconnect, heartbeat, connectivity awareness and a typed
//! event bus.

#![deny(unsafe_code)]

pub mod bus;
pub mod channel;
pub mod config;
pub mod connectivity;
pub mod mock;
pub mod queue;
pub mod transport;

pub use bus::{EventBus, EventHandler};
pub use channel::{route_frame, ChannelBuilder, SessionChannel};
pub use config::ChannelConfig;
pub use connectivity::{Connectivity, ConnectivityMonitor, ConnectivitySubscription};
pub use queue::OfflineQueue;
pub use transport::{Connection, Connector, WsConnector};
