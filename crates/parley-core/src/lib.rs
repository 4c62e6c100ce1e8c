pub mod errors;
pub mod events;
pub mod ids;
pub mod security;
pub mod wire;

pub use errors::TransportError;
pub use events::{ChannelEvent, ChannelEventKind, ConnectionState, OfflineReason};
pub use ids::{SessionId, SubscriptionId};
pub use security::BearerToken;
