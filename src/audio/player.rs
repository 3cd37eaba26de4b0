use serenity::model::id::{ChannelId, GuildId};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use super::{
    decoder::PcmDecoder,
    queue::{GuildMusicState, PlaybackSnapshot},
    registry::WorkerRegistry,
    transport::VoiceGateway,
    worker,
};
use crate::{
    config::{EmbedColors, GuildMusicConfig, MusicConfig},
    error::MusicError,
    sources::{StreamSource, Track},
    ui::{embeds::StatusView, StatusBoard},
};

/// Pause between tearing down a voice connection and opening the next one.
const VOICE_TEARDOWN: Duration = Duration::from_millis(100);

/// External collaborators of the player.
pub struct PlayerDeps {
    pub source: Arc<dyn StreamSource>,
    pub decoder: Arc<dyn PcmDecoder>,
    pub voice: Arc<dyn VoiceGateway>,
    pub board: Arc<dyn StatusBoard>,
    /// Capacity of the decoder -> send loop channel, in frames.
    pub frame_buffer: usize,
}

pub(super) struct GuildSession {
    pub(super) settings: GuildMusicConfig,
    pub(super) state: Mutex<GuildMusicState>,
    /// Wakes a parked send loop or worker after `resume`.
    pub(super) resumed: Notify,
    /// Wakes a send loop waiting for a voice connection.
    pub(super) connected: Notify,
    render_lock: Mutex<()>,
    join_lock: Mutex<()>,
}

pub(super) struct PlayerInner {
    guilds: HashMap<GuildId, Arc<GuildSession>>,
    pub(super) registry: WorkerRegistry,
    pub(super) source: Arc<dyn StreamSource>,
    pub(super) decoder: Arc<dyn PcmDecoder>,
    voice: Arc<dyn VoiceGateway>,
    board: Arc<dyn StatusBoard>,
    pub(super) frame_buffer: usize,
}

/// Playback controller: the only entry point that mutates guild music state
/// from outside the queue worker.
#[derive(Clone)]
pub struct MusicPlayer {
    inner: Arc<PlayerInner>,
}

impl MusicPlayer {
    pub fn new(config: &MusicConfig, deps: PlayerDeps) -> Self {
        let guilds = config
            .guilds
            .iter()
            .map(|settings| {
                let session = GuildSession {
                    settings: settings.clone(),
                    state: Mutex::new(GuildMusicState::default()),
                    resumed: Notify::new(),
                    connected: Notify::new(),
                    render_lock: Mutex::new(()),
                    join_lock: Mutex::new(()),
                };
                (settings.guild(), Arc::new(session))
            })
            .collect::<HashMap<_, _>>();

        info!("🎵 Música configurada para {} guild(s)", guilds.len());

        Self {
            inner: Arc::new(PlayerInner {
                guilds,
                registry: WorkerRegistry::default(),
                source: deps.source,
                decoder: deps.decoder,
                voice: deps.voice,
                board: deps.board,
                frame_buffer: deps.frame_buffer.max(1),
            }),
        }
    }

    pub fn is_enabled(&self, guild_id: GuildId) -> bool {
        self.inner.session(guild_id).is_ok()
    }

    /// Music channel of an enabled guild.
    pub fn music_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.inner
            .session(guild_id)
            .ok()
            .map(|session| session.settings.channel())
    }

    /// Every enabled guild with its music channel.
    pub fn enabled_guilds(&self) -> Vec<(GuildId, ChannelId)> {
        self.inner
            .guilds
            .iter()
            .filter(|(_, session)| session.settings.enabled)
            .map(|(guild_id, session)| (*guild_id, session.settings.channel()))
            .collect()
    }

    #[allow(dead_code)]
    pub async fn snapshot(&self, guild_id: GuildId) -> Result<PlaybackSnapshot, MusicError> {
        let session = self.inner.session(guild_id)?;
        let state = session.state.lock().await;
        Ok(state.snapshot())
    }

    #[allow(dead_code)]
    pub fn workers_started(&self, guild_id: GuildId) -> u64 {
        self.inner.registry.workers_started(guild_id)
    }

    /// Appends `track` and starts a worker when none is running.
    ///
    /// Returns the track's position in the pending queue.
    pub async fn enqueue(&self, guild_id: GuildId, track: Track) -> Result<usize, MusicError> {
        let session = self.inner.session(guild_id)?;

        let (position, started) = {
            let mut state = session.state.lock().await;
            let position = state.push(track, session.settings.queue_limit())?;

            let started = !self.inner.registry.is_running(guild_id);
            if started {
                self.spawn_worker(guild_id, session);
            }
            (position, started)
        };

        // El worker renderiza al tomar el track
        if !started {
            self.inner.render(guild_id, session).await;
        }

        Ok(position)
    }

    pub async fn pause(&self, guild_id: GuildId) {
        let Some(session) = self.active(guild_id, "pause") else {
            return;
        };

        {
            let mut state = session.state.lock().await;
            if !state.is_playing() {
                debug!("⏸️ Nada que pausar en guild {}", guild_id);
                return;
            }
            state.set_playing(false);
        }

        info!("⏸️ Reproducción pausada en guild {}", guild_id);
        self.inner.render(guild_id, session).await;
    }

    pub async fn resume(&self, guild_id: GuildId) {
        let Some(session) = self.active(guild_id, "resume") else {
            return;
        };

        {
            let mut state = session.state.lock().await;
            if !state.is_paused() {
                debug!("▶️ Nada que reanudar en guild {}", guild_id);
                return;
            }
            state.set_playing(true);

            if self.inner.registry.is_running(guild_id) {
                session.resumed.notify_waiters();
            } else {
                self.spawn_worker(guild_id, session);
            }
        }

        info!("▶️ Reproducción reanudada en guild {}", guild_id);
        self.inner.render(guild_id, session).await;
    }

    /// Drops the current track and lets a fresh worker pick the next one.
    pub async fn skip(&self, guild_id: GuildId) {
        let Some(session) = self.active(guild_id, "skip") else {
            return;
        };

        let mut state = session.state.lock().await;
        if !state.has_work() {
            debug!("⏭️ Nada que saltar en guild {}", guild_id);
            return;
        }

        if let Some(track) = state.currently_playing() {
            info!("⏭️ Saltando: {}", track.title());
        }
        self.inner.registry.abort(guild_id);
        state.finish();
        self.spawn_worker(guild_id, session);
    }

    /// Stops playback, empties the queue and leaves the voice channel.
    pub async fn disconnect(&self, guild_id: GuildId) {
        let Some(session) = self.active(guild_id, "disconnect") else {
            return;
        };

        let connection = {
            let mut state = session.state.lock().await;
            self.inner.registry.abort(guild_id);
            state.clear()
        };

        match connection {
            Some(connection) => connection.disconnect().await,
            None => debug!("🔇 Guild {} no tenía conexión de voz", guild_id),
        }

        info!("⏹️ Música detenida en guild {}", guild_id);
        self.inner.render(guild_id, session).await;
    }

    /// Makes sure the bot sits in `channel_id`, switching channels if needed.
    pub async fn join_if_needed(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), MusicError> {
        let session = self.inner.session(guild_id)?;
        let _joining = session.join_lock.lock().await;

        let previous = {
            let mut state = session.state.lock().await;
            match state.voice() {
                Some(current) if current.channel_id() == channel_id => return Ok(()),
                _ => state.replace_voice(None),
            }
        };

        if let Some(previous) = previous {
            info!(
                "🔀 Cambiando de canal de voz {} -> {} en guild {}",
                previous.channel_id(),
                channel_id,
                guild_id
            );
            previous.disconnect().await;
            tokio::time::sleep(VOICE_TEARDOWN).await;
        }

        let connection = self.inner.voice.connect(guild_id, channel_id).await?;
        session.state.lock().await.replace_voice(Some(connection));
        session.connected.notify_waiters();

        Ok(())
    }

    /// Renders the status message.
    pub async fn render(&self, guild_id: GuildId) {
        if let Some(session) = self.active(guild_id, "render") {
            self.inner.render(guild_id, session).await;
        }
    }

    /// Colors configured for the guild, defaults when unknown.
    pub fn embed_colors(&self, guild_id: GuildId) -> EmbedColors {
        self.inner
            .guilds
            .get(&guild_id)
            .map(|session| session.settings.embed_colors.clone())
            .unwrap_or_default()
    }

    fn active(&self, guild_id: GuildId, action: &str) -> Option<&Arc<GuildSession>> {
        match self.inner.session(guild_id) {
            Ok(session) => Some(session),
            Err(e) => {
                debug!("🎵 {} ignorado: {}", action, e);
                None
            }
        }
    }

    /// Must be called with the guild's state lock held.
    fn spawn_worker(&self, guild_id: GuildId, session: &Arc<GuildSession>) {
        let inner = self.inner.clone();
        let session = session.clone();
        self.inner.registry.start(guild_id, move |worker_id| {
            worker::run_queue(inner, guild_id, session, worker_id)
        });
    }
}

impl PlayerInner {
    fn session(&self, guild_id: GuildId) -> Result<&Arc<GuildSession>, MusicError> {
        let session = self
            .guilds
            .get(&guild_id)
            .ok_or(MusicError::NotConfigured(guild_id))?;

        if !session.settings.enabled {
            return Err(MusicError::Disabled(guild_id));
        }
        Ok(session)
    }

    /// Creates or edits the status message; failures are only logged.
    ///
    /// Runs on its own task, so aborting the caller never loses the id of a
    /// message that was just created.
    pub(super) async fn render(self: &Arc<Self>, guild_id: GuildId, session: &Arc<GuildSession>) {
        let inner = self.clone();
        let session = session.clone();
        let rendering = tokio::spawn(async move { inner.sync_status(guild_id, &session).await });

        if let Err(e) = rendering.await {
            warn!("⚠️ Renderizado interrumpido en guild {}: {:?}", guild_id, e);
        }
    }

    async fn sync_status(&self, guild_id: GuildId, session: &GuildSession) {
        let _rendering = session.render_lock.lock().await;

        let (snapshot, message) = {
            let state = session.state.lock().await;
            (state.snapshot(), state.status_message())
        };
        let view = StatusView::from_snapshot(&snapshot, &session.settings.embed_colors);
        let channel_id = session.settings.channel();

        match message {
            Some(message_id) => {
                if let Err(e) = self.board.edit(channel_id, message_id, &view).await {
                    warn!("⚠️ No se pudo actualizar el estado en guild {}: {:?}", guild_id, e);
                }
            }
            None => match self.board.create(channel_id, &view).await {
                Ok(message_id) => {
                    session.state.lock().await.set_status_message(message_id);
                }
                Err(e) => {
                    warn!("⚠️ No se pudo crear el mensaje de estado en guild {}: {:?}", guild_id, e);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{
        eventually, harness, harness_with, track, FakeDecoder, GUILD, MUSIC_CHANNEL,
    };
    use pretty_assertions::assert_eq;

    const VOICE_A: ChannelId = ChannelId::new(500);
    const VOICE_B: ChannelId = ChannelId::new(501);

    #[tokio::test]
    async fn test_tracks_play_in_enqueue_order() {
        let h = harness(FakeDecoder::frames(2));
        h.player.join_if_needed(GUILD, VOICE_A).await.unwrap();

        for title in ["a", "b", "c"] {
            h.player.enqueue(GUILD, track(title)).await.unwrap();
        }

        eventually(|| async { h.source.opened().len() == 3 }).await;
        let expected: Vec<String> = ["a", "b", "c"]
            .iter()
            .map(|title| track(title).url().to_string())
            .collect();
        assert_eq!(h.source.opened(), expected);

        eventually(|| async { h.player.snapshot(GUILD).await.unwrap() == PlaybackSnapshot::default() })
            .await;
        assert_eq!(h.voice.connection(0).frames(), 6);
    }

    #[tokio::test]
    async fn test_enqueue_while_playing_reuses_worker() {
        let h = harness(FakeDecoder::endless());
        h.player.join_if_needed(GUILD, VOICE_A).await.unwrap();

        h.player.enqueue(GUILD, track("a")).await.unwrap();
        eventually(|| async { h.player.snapshot(GUILD).await.unwrap().is_playing }).await;

        h.player.enqueue(GUILD, track("b")).await.unwrap();
        h.player.enqueue(GUILD, track("c")).await.unwrap();

        assert_eq!(h.player.workers_started(GUILD), 1);
    }

    #[tokio::test]
    async fn test_now_playing_then_queued() {
        let h = harness(FakeDecoder::endless());
        h.player.join_if_needed(GUILD, VOICE_A).await.unwrap();

        let a = Track::new("A", "https://example.com/a", Duration::from_secs(225));
        h.player.enqueue(GUILD, a.clone()).await.unwrap();

        eventually(|| async { h.player.snapshot(GUILD).await.unwrap().current.as_ref() == Some(&a) })
            .await;
        let snapshot = h.player.snapshot(GUILD).await.unwrap();
        assert!(snapshot.is_playing);
        eventually(|| async {
            h.board
                .last()
                .is_some_and(|view| view.description.contains("**Now Playing:** [A](https://example.com/a) (03:45)"))
        })
        .await;

        h.player.enqueue(GUILD, track("B")).await.unwrap();
        let snapshot = h.player.snapshot(GUILD).await.unwrap();
        assert_eq!(snapshot.current, Some(a));
        assert_eq!(snapshot.upcoming, vec![track("B")]);
    }

    #[tokio::test]
    async fn test_idle_transition_happens_once() {
        let h = harness(FakeDecoder::frames(5));
        h.player.join_if_needed(GUILD, VOICE_A).await.unwrap();

        h.player.enqueue(GUILD, track("a")).await.unwrap();
        h.player.enqueue(GUILD, track("b")).await.unwrap();

        eventually(|| async { h.source.opened().len() == 2 }).await;
        eventually(|| async { !h.player.snapshot(GUILD).await.unwrap().is_playing }).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let views = h.board.views();
        let first_playing = views
            .iter()
            .position(|view| view.is_playing)
            .expect("al menos una vista reproduciendo");
        let idle_after_playing = views[first_playing..]
            .iter()
            .filter(|view| !view.is_playing)
            .count();

        assert_eq!(idle_after_playing, 1);
        assert_eq!(h.player.workers_started(GUILD), 1);
    }

    #[tokio::test]
    async fn test_skip_on_idle_guild_is_noop() {
        let h = harness(FakeDecoder::endless());

        h.player.skip(GUILD).await;

        assert_eq!(h.player.workers_started(GUILD), 0);
        assert!(h.board.views().is_empty());
        assert_eq!(h.player.snapshot(GUILD).await.unwrap(), PlaybackSnapshot::default());
    }

    #[tokio::test]
    async fn test_skip_advances_to_next_track() {
        let h = harness(FakeDecoder::endless());
        h.player.join_if_needed(GUILD, VOICE_A).await.unwrap();

        h.player.enqueue(GUILD, track("a")).await.unwrap();
        h.player.enqueue(GUILD, track("b")).await.unwrap();
        eventually(|| async { h.source.opened().len() == 1 }).await;

        h.player.skip(GUILD).await;

        eventually(|| async {
            h.player.snapshot(GUILD).await.unwrap().current == Some(track("b"))
        })
        .await;
        assert_eq!(h.player.workers_started(GUILD), 2);
    }

    #[tokio::test]
    async fn test_disconnect_clears_everything() {
        let h = harness(FakeDecoder::endless());
        h.player.join_if_needed(GUILD, VOICE_A).await.unwrap();
        h.player.enqueue(GUILD, track("a")).await.unwrap();
        h.player.enqueue(GUILD, track("b")).await.unwrap();
        eventually(|| async { h.voice.connection(0).frames() > 0 }).await;

        h.player.disconnect(GUILD).await;

        assert_eq!(h.player.snapshot(GUILD).await.unwrap(), PlaybackSnapshot::default());
        assert!(h.voice.connection(0).is_closed());

        // El worker abortado ya no envía nada
        let sent = h.voice.connection(0).frames();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(h.voice.connection(0).frames(), sent);
        assert!(h.board.last().is_some_and(|view| !view.is_playing));
    }

    #[tokio::test]
    async fn test_source_error_moves_to_next_track() {
        let h = harness(FakeDecoder::endless());
        h.player.join_if_needed(GUILD, VOICE_A).await.unwrap();
        h.source.fail(track("a").url());

        h.player.enqueue(GUILD, track("a")).await.unwrap();
        h.player.enqueue(GUILD, track("b")).await.unwrap();

        eventually(|| async {
            h.player.snapshot(GUILD).await.unwrap().current == Some(track("b"))
        })
        .await;
        assert_eq!(h.player.workers_started(GUILD), 1);
    }

    #[tokio::test]
    async fn test_decode_error_moves_to_next_track() {
        let h = harness(FakeDecoder::endless().failing_first(1));
        h.player.join_if_needed(GUILD, VOICE_A).await.unwrap();

        h.player.enqueue(GUILD, track("a")).await.unwrap();
        h.player.enqueue(GUILD, track("b")).await.unwrap();

        eventually(|| async {
            h.player.snapshot(GUILD).await.unwrap().current == Some(track("b"))
        })
        .await;
        assert_eq!(
            h.source.opened(),
            vec![track("a").url().to_string(), track("b").url().to_string()]
        );
        assert_eq!(h.player.workers_started(GUILD), 1);
    }

    #[tokio::test]
    async fn test_channel_switch_keeps_the_queue() {
        let h = harness(FakeDecoder::frames(3));
        h.player.join_if_needed(GUILD, VOICE_A).await.unwrap();
        for title in ["a", "b", "c"] {
            h.player.enqueue(GUILD, track(title)).await.unwrap();
        }
        eventually(|| async { h.voice.connection(0).frames() > 0 }).await;

        // Mientras se conecta no hay conexión instalada
        h.voice.slow(Duration::from_millis(300));
        h.player.join_if_needed(GUILD, VOICE_B).await.unwrap();

        eventually(|| async { h.player.snapshot(GUILD).await.unwrap() == PlaybackSnapshot::default() })
            .await;
        assert_eq!(h.source.opened().len(), 3);
        assert!(h.voice.connection(0).is_closed());
        assert!(h.voice.connection(1).frames() >= 6);
    }

    #[tokio::test]
    async fn test_skip_during_first_render_keeps_one_status_message() {
        let h = harness(FakeDecoder::endless());
        h.board.slow_create(Duration::from_millis(200));
        h.player.join_if_needed(GUILD, VOICE_A).await.unwrap();

        h.player.enqueue(GUILD, track("a")).await.unwrap();
        eventually(|| async { !h.board.created().is_empty() }).await;

        // El worker está dentro de la creación del mensaje
        h.player.skip(GUILD).await;

        eventually(|| async { h.board.views().len() >= 2 }).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(h.board.created(), vec![MUSIC_CHANNEL]);
        assert!(h.board.last().is_some_and(|view| !view.is_playing));
    }

    #[tokio::test]
    async fn test_queue_limit_is_enforced() {
        let h = harness_with(FakeDecoder::endless(), |guild| guild.max_queue_size = 2);
        h.player.join_if_needed(GUILD, VOICE_A).await.unwrap();

        h.player.enqueue(GUILD, track("a")).await.unwrap();
        eventually(|| async { h.player.snapshot(GUILD).await.unwrap().current.is_some() }).await;

        assert_eq!(h.player.enqueue(GUILD, track("b")).await.unwrap(), 1);
        assert_eq!(h.player.enqueue(GUILD, track("c")).await.unwrap(), 2);
        let err = h.player.enqueue(GUILD, track("d")).await.unwrap_err();
        assert!(matches!(err, MusicError::QueueFull(2)));
    }

    #[tokio::test]
    async fn test_pause_parks_and_resume_continues_same_worker() {
        let h = harness(FakeDecoder::endless());
        h.player.join_if_needed(GUILD, VOICE_A).await.unwrap();
        h.player.enqueue(GUILD, track("a")).await.unwrap();
        eventually(|| async { h.voice.connection(0).frames() > 2 }).await;

        h.player.pause(GUILD).await;
        let snapshot = h.player.snapshot(GUILD).await.unwrap();
        assert!(!snapshot.is_playing);
        assert_eq!(snapshot.current, Some(track("a")));

        let paused_at = h.voice.connection(0).frames();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(h.voice.connection(0).frames() <= paused_at + 1);

        h.player.resume(GUILD).await;
        let resumed_at = h.voice.connection(0).frames();
        eventually(|| async { h.voice.connection(0).frames() > resumed_at + 2 }).await;
        assert_eq!(h.player.workers_started(GUILD), 1);
    }

    #[tokio::test]
    async fn test_join_switches_channels() {
        let h = harness(FakeDecoder::endless());

        h.player.join_if_needed(GUILD, VOICE_A).await.unwrap();
        h.player.join_if_needed(GUILD, VOICE_A).await.unwrap();
        assert_eq!(h.voice.connects(), vec![VOICE_A]);

        h.player.join_if_needed(GUILD, VOICE_B).await.unwrap();
        assert_eq!(h.voice.connects(), vec![VOICE_A, VOICE_B]);
        assert!(h.voice.connection(0).is_closed());
        assert!(!h.voice.connection(1).is_closed());
    }

    #[tokio::test]
    async fn test_join_failure_is_reported() {
        let h = harness(FakeDecoder::endless());
        h.voice.refuse();

        let err = h.player.join_if_needed(GUILD, VOICE_A).await.unwrap_err();
        assert!(matches!(err, MusicError::Join(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_and_disabled_guilds() {
        let h = harness_with(FakeDecoder::endless(), |guild| guild.enabled = false);
        let unknown = GuildId::new(999);

        let err = h.player.enqueue(unknown, track("a")).await.unwrap_err();
        assert!(matches!(err, MusicError::NotConfigured(_)));
        let err = h.player.enqueue(GUILD, track("a")).await.unwrap_err();
        assert!(matches!(err, MusicError::Disabled(_)));
        assert!(err.is_config());

        h.player.pause(unknown).await;
        h.player.resume(GUILD).await;
        h.player.skip(GUILD).await;
        h.player.disconnect(GUILD).await;

        assert!(!h.player.is_enabled(GUILD));
        assert_eq!(h.player.music_channel(GUILD), None);
        assert!(h.player.enabled_guilds().is_empty());
    }

    #[tokio::test]
    async fn test_status_message_created_once_then_edited() {
        let h = harness(FakeDecoder::endless());

        h.player.render(GUILD).await;
        h.player.render(GUILD).await;

        assert_eq!(h.board.created(), vec![MUSIC_CHANNEL]);
        assert_eq!(h.board.views().len(), 2);
        assert_eq!(
            h.board.last().map(|view| view.description),
            Some("No songs currently playing.".to_string())
        );
    }
}
