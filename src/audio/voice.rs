use async_trait::async_trait;
use bytes::{Buf, Bytes};
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{Input, RawAdapter},
    tracks::TrackHandle,
    Songbird,
};
use std::{
    io::{Read, Seek, SeekFrom},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use symphonia::core::io::MediaSource;
use tracing::{debug, info, warn};

use super::{
    decoder::{SampleFrame, CHANNELS, FRAME_SAMPLES, SAMPLE_RATE},
    transport::{VoiceConnection, VoiceGateway},
};
use crate::error::{JoinError, TransportError};

/// Frames buffered between the send loop and the songbird mixer.
const FEED_CAPACITY: usize = 8;
/// f32 interleaved frame, as consumed by `RawAdapter`.
const FEED_FRAME_BYTES: usize = FRAME_SAMPLES * 4;
const STEREO_SAMPLE_BYTES: usize = 4 * CHANNELS;

/// Voice gateway backed by songbird.
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, JoinError> {
        info!("🔗 Conectando al canal {} en guild {}", channel_id, guild_id);

        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| JoinError::Connect(e.to_string()))?;

        let (frames, feed) = flume::bounded(FEED_CAPACITY);
        let source = FrameFeed::new(feed);
        let input: Input = RawAdapter::new(source, SAMPLE_RATE, CHANNELS as u32).into();

        let track = {
            let mut call = call.lock().await;
            call.play_input(input)
        };

        info!("✅ Conectado al canal de voz {}", channel_id);

        Ok(Arc::new(SongbirdConnection {
            guild_id,
            channel_id,
            manager: self.manager.clone(),
            frames,
            track,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Connection whose audio goes through one long-lived songbird track.
pub struct SongbirdConnection {
    guild_id: GuildId,
    channel_id: ChannelId,
    manager: Arc<Songbird>,
    frames: flume::Sender<Bytes>,
    track: TrackHandle,
    closed: AtomicBool,
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn send_frame(&self, frame: SampleFrame) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        self.frames
            .send_async(frame_to_f32_bytes(&frame))
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn disconnect(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Err(e) = self.track.stop() {
            debug!("Track de voz ya detenido: {:?}", e);
        }

        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!("⚠️ Error al salir del canal de voz en guild {}: {:?}", self.guild_id, e);
        } else {
            info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        }
    }
}

fn frame_to_f32_bytes(frame: &SampleFrame) -> Bytes {
    let mut out = Vec::with_capacity(FEED_FRAME_BYTES);
    for sample in frame.samples() {
        let value = f32::from(*sample) / 32768.0;
        out.extend_from_slice(&value.to_le_bytes());
    }
    Bytes::from(out)
}

/// Live PCM source for songbird.
///
/// Returns silence while the send loop is starved and EOF once every
/// sender is gone.
struct FrameFeed {
    frames: flume::Receiver<Bytes>,
    pending: Bytes,
}

impl FrameFeed {
    fn new(frames: flume::Receiver<Bytes>) -> Self {
        Self {
            frames,
            pending: Bytes::new(),
        }
    }
}

impl Read for FrameFeed {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pending.is_empty() {
            match self.frames.try_recv() {
                Ok(frame) => self.pending = frame,
                Err(flume::TryRecvError::Empty) => {
                    let n = buf.len().min(FEED_FRAME_BYTES) / STEREO_SAMPLE_BYTES * STEREO_SAMPLE_BYTES;
                    let n = if n == 0 { buf.len() } else { n };
                    buf[..n].fill(0);
                    return Ok(n);
                }
                Err(flume::TryRecvError::Disconnected) => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }
}

impl Seek for FrameFeed {
    fn seek(&mut self, _pos: SeekFrom) -> std::io::Result<u64> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "stream en vivo",
        ))
    }
}

impl MediaSource for FrameFeed {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}
