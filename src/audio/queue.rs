use serenity::model::id::MessageId;
use std::{collections::VecDeque, sync::Arc};
use tracing::{debug, info};

use super::transport::VoiceConnection;
use crate::{error::MusicError, sources::Track};

/// Tracks shown under "Queue" in the status message.
pub const VISIBLE_QUEUE: usize = 5;

/// Per-guild playback record.
///
/// Every field is only touched while holding the guild's state lock.
#[derive(Default)]
pub struct GuildMusicState {
    queue: VecDeque<Track>,
    currently_playing: Option<Track>,
    is_playing: bool,
    voice: Option<Arc<dyn VoiceConnection>>,
    status_message: Option<MessageId>,
}

/// Read-only copy of the state used for rendering.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackSnapshot {
    pub current: Option<Track>,
    pub upcoming: Vec<Track>,
    pub pending: usize,
    pub is_playing: bool,
}

impl PlaybackSnapshot {
    /// More tracks wait than the status message lists.
    pub fn has_overflow(&self) -> bool {
        self.pending > VISIBLE_QUEUE
    }
}

impl GuildMusicState {
    /// Agrega un track al final de la cola
    pub fn push(&mut self, track: Track, limit: Option<usize>) -> Result<usize, MusicError> {
        if let Some(max) = limit {
            if self.queue.len() >= max {
                return Err(MusicError::QueueFull(max));
            }
        }

        info!("➕ Agregado a la cola: {}", track.title());
        self.queue.push_back(track);
        Ok(self.queue.len())
    }

    /// Draining -> Playing: moves the head of the queue into `currently_playing`.
    pub fn pop_next(&mut self) -> Option<Track> {
        let track = self.queue.pop_front()?;
        debug!("▶️ Siguiente en la cola: {}", track.title());
        self.currently_playing = Some(track.clone());
        self.is_playing = true;
        Some(track)
    }

    /// Draining -> Idle.
    pub fn finish(&mut self) {
        self.currently_playing = None;
        self.is_playing = false;
    }

    /// Empties the queue and hands back the voice connection, if any.
    pub fn clear(&mut self) -> Option<Arc<dyn VoiceConnection>> {
        self.queue.clear();
        self.finish();
        self.voice.take()
    }

    /// A track is loaded but the send loop is parked.
    pub fn is_paused(&self) -> bool {
        self.currently_playing.is_some() && !self.is_playing
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.is_playing = playing;
    }

    pub fn currently_playing(&self) -> Option<&Track> {
        self.currently_playing.as_ref()
    }

    pub fn has_work(&self) -> bool {
        self.currently_playing.is_some() || !self.queue.is_empty()
    }

    pub fn voice(&self) -> Option<Arc<dyn VoiceConnection>> {
        self.voice.clone()
    }

    /// Whether `connection` is still the installed one.
    pub fn is_voice(&self, connection: &Arc<dyn VoiceConnection>) -> bool {
        self.voice
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, connection))
    }

    pub fn replace_voice(
        &mut self,
        connection: Option<Arc<dyn VoiceConnection>>,
    ) -> Option<Arc<dyn VoiceConnection>> {
        std::mem::replace(&mut self.voice, connection)
    }

    pub fn status_message(&self) -> Option<MessageId> {
        self.status_message
    }

    pub fn set_status_message(&mut self, message: MessageId) {
        self.status_message = Some(message);
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            current: self.currently_playing.clone(),
            upcoming: self.queue.iter().take(VISIBLE_QUEUE).cloned().collect(),
            pending: self.queue.len(),
            is_playing: self.is_playing,
        }
    }
}
