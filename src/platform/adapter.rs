use crate::platform::types::{Guild, PlatformError, RosterMember};
use async_trait::async_trait;

/// Operations the reconciler needs from the messaging platform. The server
/// only ever talks to this trait; the HTTP gateway implements it and tests
/// substitute their own.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Guilds the connected account is a member of.
    async fn list_guilds(&self) -> Result<Vec<Guild>, PlatformError>;

    /// Full roster of a guild, presence included. Automated accounts are
    /// returned with `bot = true` and filtered by the caller.
    async fn list_members(&self, guild_id: &str) -> Result<Vec<RosterMember>, PlatformError>;

    async fn grant_role(
        &self,
        guild_id: &str,
        member_id: &str,
        role: &str,
    ) -> Result<(), PlatformError>;

    async fn revoke_role(
        &self,
        guild_id: &str,
        member_id: &str,
        role: &str,
    ) -> Result<(), PlatformError>;

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), PlatformError>;
}
