//! Per-guild queue worker: Draining -> Playing -> ... -> Idle.

use serenity::model::id::GuildId;
use std::sync::Arc;
use thiserror::Error;
use tokio::{
    sync::mpsc,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use super::{
    decoder::{SampleFrame, FRAME_DURATION},
    player::{GuildSession, PlayerInner},
};
use crate::{
    error::{DecodeError, SourceError, TransportError},
    sources::Track,
};

#[derive(Debug, Error)]
enum TrackError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub(super) async fn run_queue(
    inner: Arc<PlayerInner>,
    guild_id: GuildId,
    session: Arc<GuildSession>,
    worker_id: u64,
) {
    debug!("🧵 Worker {} procesando la cola de guild {}", worker_id, guild_id);

    while let Some(track) = next_track(&inner, guild_id, &session, worker_id).await {
        inner.render(guild_id, &session).await;
        info!("🎵 Reproduciendo en guild {}: {}", guild_id, track.title());

        // Un track fallido no detiene la cola
        match stream_track(&inner, &session, &track).await {
            Ok(()) => debug!("✅ Track terminado: {}", track.title()),
            Err(e) => warn!(
                "⚠️ Error reproduciendo `{}` en guild {}: {}",
                track.title(),
                guild_id,
                e
            ),
        }
    }

    info!("📭 Cola vacía en guild {}", guild_id);
    inner.render(guild_id, &session).await;
}

/// Pops the next track, or performs the Idle transition and retires.
///
/// Never starts a new track while the guild is paused.
async fn next_track(
    inner: &PlayerInner,
    guild_id: GuildId,
    session: &GuildSession,
    worker_id: u64,
) -> Option<Track> {
    loop {
        let resumed = session.resumed.notified();
        tokio::pin!(resumed);
        resumed.as_mut().enable();

        {
            let mut state = session.state.lock().await;
            if !state.is_paused() {
                if let Some(track) = state.pop_next() {
                    return Some(track);
                }
                state.finish();
                inner.registry.retire(guild_id, worker_id);
                return None;
            }
        }

        debug!("⏸️ Worker {} esperando reanudación", worker_id);
        resumed.await;
    }
}

async fn stream_track(
    inner: &PlayerInner,
    session: &GuildSession,
    track: &Track,
) -> Result<(), TrackError> {
    let input = inner.source.open(track).await?;
    let (frames_tx, frames_rx) = mpsc::channel(inner.frame_buffer);

    let (decoded, sent) = tokio::join!(
        inner.decoder.decode(input, frames_tx),
        send_frames(session, frames_rx)
    );

    sent?;
    decoded?;
    Ok(())
}

/// Paces frames to the voice connection, one per 20ms tick.
///
/// Parks while paused or while no connection is installed. Owns the
/// receiving end, so returning early closes the channel and unblocks the
/// decoder.
async fn send_frames(
    session: &GuildSession,
    mut frames: mpsc::Receiver<SampleFrame>,
) -> Result<(), TrackError> {
    let mut ticker = interval(FRAME_DURATION);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while let Some(frame) = frames.recv().await {
        ticker.tick().await;

        let connection = loop {
            let resumed = session.resumed.notified();
            let connected = session.connected.notified();
            tokio::pin!(resumed, connected);
            resumed.as_mut().enable();
            connected.as_mut().enable();

            {
                let state = session.state.lock().await;
                // Pausado o cambiando de canal: esperamos
                if let (true, Some(connection)) = (state.is_playing(), state.voice()) {
                    break connection;
                }
            }

            tokio::select! {
                _ = resumed => {}
                _ = connected => {}
            }
            ticker.reset();
        };

        if let Err(e) = connection.send_frame(frame).await {
            if session.state.lock().await.is_voice(&connection) {
                return Err(e.into());
            }
            debug!("🔀 Conexión de voz reemplazada, se descarta un frame");
        }
    }

    Ok(())
}
