use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;

use super::decoder::SampleFrame;
use crate::error::{JoinError, TransportError};

/// Opens live voice connections, one per guild.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, JoinError>;
}

/// A live voice session that accepts frames at a 20ms cadence.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    async fn send_frame(&self, frame: SampleFrame) -> Result<(), TransportError>;

    /// Idempotent; frames sent afterwards fail with `TransportError::Closed`.
    async fn disconnect(&self);
}
