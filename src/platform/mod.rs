// Platform client: roster/presence queries and role/message operations
// against the external messaging platform.

pub mod adapter;
pub mod gateway;
pub mod types;

pub use adapter::PlatformAdapter;
pub use gateway::GatewayAdapter;
pub use types::{Guild, PlatformError, Presence, RosterMember};
