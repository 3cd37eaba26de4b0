pub mod buttons;
pub mod embeds;

use anyhow::Context as _;
use async_trait::async_trait;
use serenity::{
    builder::{CreateMessage, EditMessage},
    http::Http,
    model::id::{ChannelId, MessageId},
};
use std::sync::Arc;

use self::{buttons::create_player_controls, embeds::StatusView};

/// Where the status message lives.
#[async_trait]
pub trait StatusBoard: Send + Sync {
    async fn create(&self, channel_id: ChannelId, view: &StatusView) -> anyhow::Result<MessageId>;

    async fn edit(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        view: &StatusView,
    ) -> anyhow::Result<()>;
}

/// Status message posted through the Discord REST API.
pub struct SerenityStatusBoard {
    http: Arc<Http>,
}

impl SerenityStatusBoard {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl StatusBoard for SerenityStatusBoard {
    async fn create(&self, channel_id: ChannelId, view: &StatusView) -> anyhow::Result<MessageId> {
        let message = CreateMessage::new()
            .embed(view.to_embed())
            .components(vec![create_player_controls()]);

        let sent = channel_id
            .send_message(self.http.as_ref(), message)
            .await
            .with_context(|| format!("No se pudo enviar el estado a {}", channel_id))?;
        Ok(sent.id)
    }

    async fn edit(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        view: &StatusView,
    ) -> anyhow::Result<()> {
        let edit = EditMessage::new()
            .embed(view.to_embed())
            .components(vec![create_player_controls()]);

        channel_id
            .edit_message(self.http.as_ref(), message_id, edit)
            .await
            .with_context(|| format!("No se pudo editar el mensaje {}", message_id))?;
        Ok(())
    }
}
