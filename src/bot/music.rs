use anyhow::Result;
use serenity::{
    all::{ComponentInteraction, Context, Message, Ready},
    async_trait,
    builder::CreateInteractionResponse,
    model::id::GuildId,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    messages::{clear_channel, reply_timed, user_voice_channel},
    Feature, FeatureContext,
};
use crate::{
    audio::MusicPlayer,
    error::{MusicError, ResolveError},
    sources::MediaResolver,
    ui::{buttons::ControlAction, embeds::create_error_embed},
};

#[derive(Debug, Error)]
enum RequestError {
    #[error("el usuario no está en un canal de voz")]
    NoVoiceChannel,
    #[error(transparent)]
    Music(#[from] MusicError),
}

/// Music channel feature: plain messages are play requests and the status
/// message buttons drive the player.
pub struct MusicFeature {
    player: MusicPlayer,
    resolver: MediaResolver,
    reply_ttl: Duration,
}

impl MusicFeature {
    pub fn new(player: MusicPlayer, resolver: MediaResolver, reply_ttl: Duration) -> Self {
        Self {
            player,
            resolver,
            reply_ttl,
        }
    }

    async fn handle_request(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        message: &Message,
        query: &str,
    ) -> Result<(), RequestError> {
        let voice_channel = user_voice_channel(&ctx.cache, guild_id, message.author.id)
            .ok_or(RequestError::NoVoiceChannel)?;

        self.player.join_if_needed(guild_id, voice_channel).await?;

        let track = self
            .resolver
            .resolve(query)
            .await
            .map_err(MusicError::from)?;
        let title = track.title().to_string();
        let position = self.player.enqueue(guild_id, track).await?;

        info!(
            "🎶 {} pidió `{}` en guild {} (posición {})",
            message.author.name, title, guild_id, position
        );
        Ok(())
    }

    async fn reply_failure(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        message: &Message,
        error: &RequestError,
    ) {
        warn!("⚠️ Petición fallida en guild {}: {}", guild_id, error);

        let embed = create_error_embed(&user_message(error), &self.player.embed_colors(guild_id));
        if let Err(e) = reply_timed(&ctx.http, message.channel_id, embed, self.reply_ttl).await {
            warn!("⚠️ No se pudo responder en guild {}: {:?}", guild_id, e);
        }
    }
}

/// Texto que ve el usuario para cada fallo
fn user_message(error: &RequestError) -> String {
    match error {
        RequestError::NoVoiceChannel => {
            "Debes estar en un canal de voz para reproducir música.".to_string()
        }
        RequestError::Music(MusicError::Join(_)) => {
            "No pude conectarme a tu canal de voz.".to_string()
        }
        RequestError::Music(MusicError::Resolve(ResolveError::NotFound(query))) => {
            format!("No encontré nada para `{}`.", query)
        }
        RequestError::Music(MusicError::Resolve(ResolveError::Lookup(_))) => {
            "Error al buscar la canción, inténtalo de nuevo.".to_string()
        }
        RequestError::Music(MusicError::QueueFull(max)) => {
            format!("La cola está llena (máximo {} canciones).", max)
        }
        RequestError::Music(MusicError::NotConfigured(_) | MusicError::Disabled(_)) => {
            "La música no está disponible en este servidor.".to_string()
        }
    }
}

#[async_trait]
impl Feature for MusicFeature {
    fn name(&self) -> &'static str {
        "music"
    }

    async fn init(&self, ctx: &FeatureContext) -> Result<()> {
        let guilds = self.player.enabled_guilds();
        if guilds.is_empty() {
            anyhow::bail!("ninguna guild tiene la música activada");
        }

        for (guild_id, channel_id) in guilds {
            if let Err(e) = clear_channel(&ctx.http, channel_id).await {
                warn!("⚠️ No se pudo limpiar el canal de música de guild {}: {:?}", guild_id, e);
            }
        }
        Ok(())
    }

    async fn on_ready(&self, _ctx: &Context, _ready: &Ready) {
        let renders = self
            .player
            .enabled_guilds()
            .into_iter()
            .map(|(guild_id, _)| self.player.render(guild_id));
        futures::future::join_all(renders).await;
    }

    async fn on_message(&self, ctx: &Context, message: &Message) {
        if message.author.bot {
            return;
        }
        let Some(guild_id) = message.guild_id else {
            return;
        };
        if self.player.music_channel(guild_id) != Some(message.channel_id) {
            return;
        }

        let query = message.content.trim();
        if !query.is_empty() {
            match self.handle_request(ctx, guild_id, message, query).await {
                Ok(()) => {}
                Err(RequestError::Music(e)) if e.is_config() => {
                    debug!("🎵 Petición ignorada: {}", e);
                }
                Err(e) => self.reply_failure(ctx, guild_id, message, &e).await,
            }
        }

        // El canal de música solo contiene el mensaje de estado
        if let Err(e) = message.delete(ctx).await {
            debug!("No se pudo borrar la petición {}: {:?}", message.id, e);
        }
    }

    async fn on_component(&self, ctx: &Context, interaction: &ComponentInteraction) {
        let Some(action) = ControlAction::from_custom_id(&interaction.data.custom_id) else {
            return;
        };
        let Some(guild_id) = interaction.guild_id else {
            return;
        };
        if !self.player.is_enabled(guild_id) {
            return;
        }

        if let Err(e) = interaction
            .create_response(ctx, CreateInteractionResponse::Acknowledge)
            .await
        {
            warn!("⚠️ No se pudo confirmar la interacción: {:?}", e);
        }

        debug!("🎛️ {:?} en guild {} por {}", action, guild_id, interaction.user.name);
        match action {
            ControlAction::Play => self.player.resume(guild_id).await,
            ControlAction::Pause => self.player.pause(guild_id).await,
            ControlAction::Skip => self.player.skip(guild_id).await,
            ControlAction::Disconnect => self.player.disconnect(guild_id).await,
        }
    }
}
