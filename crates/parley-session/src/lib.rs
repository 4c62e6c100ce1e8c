//! # parley-session
//!
//! Runs one learning session on top of a [`SessionChannel`](parley_channel::SessionChannel):
//! inbound conversation frames drive the turn processor, and proposal
//! changes are pushed to subscribers and optionally echoed back over the
//! channel.

#![deny(unsafe_code)]

pub mod error;
pub mod session;
pub mod update;

pub use error::{Result, SessionError};
pub use session::{LearningSession, SessionOptions, METRIC_TURNS_PROCESSED};
pub use update::{SessionSnapshot, SessionUpdate};
