use anyhow::{Context as _, Result};
use serenity::{
    all::{Cache, GetMessages, Http},
    builder::{CreateEmbed, CreateMessage},
    model::id::{ChannelId, GuildId, MessageId, UserId},
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

/// Discord's bulk delete limit.
const BULK_DELETE_LIMIT: usize = 100;

/// Sends `embed` to `channel_id` and deletes it after `ttl`.
pub async fn reply_timed(
    http: &Arc<Http>,
    channel_id: ChannelId,
    embed: CreateEmbed,
    ttl: Duration,
) -> Result<()> {
    let message = channel_id
        .send_message(http.as_ref(), CreateMessage::new().embed(embed))
        .await
        .context("No se pudo enviar la respuesta")?;

    let http = http.clone();
    let message_id = message.id;
    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        if let Err(e) = channel_id.delete_message(http.as_ref(), message_id).await {
            debug!("No se pudo borrar la respuesta {}: {:?}", message_id, e);
        }
    });

    Ok(())
}

/// Deletes up to the last 100 messages of the music channel.
pub async fn clear_channel(http: &Http, channel_id: ChannelId) -> Result<usize> {
    let messages = channel_id
        .messages(http, GetMessages::new().limit(BULK_DELETE_LIMIT as u8))
        .await
        .with_context(|| format!("No se pudieron leer los mensajes de {}", channel_id))?;

    let ids: Vec<MessageId> = messages.iter().map(|message| message.id).collect();

    match ids.as_slice() {
        [] => {}
        // El borrado masivo exige al menos dos mensajes
        [single] => channel_id.delete_message(http, *single).await?,
        _ => {
            for chunk in ids.chunks(BULK_DELETE_LIMIT) {
                if let Err(e) = channel_id.delete_messages(http, chunk).await {
                    warn!("⚠️ Borrado masivo falló en {}: {:?}", channel_id, e);
                }
            }
        }
    }

    info!("🧹 {} mensajes borrados en {}", ids.len(), channel_id);
    Ok(ids.len())
}

/// Voice channel the user is sitting in, from the gateway cache.
pub fn user_voice_channel(
    cache: &Arc<Cache>,
    guild_id: GuildId,
    user_id: UserId,
) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(cache)?;
    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id);
    channel_id
}
