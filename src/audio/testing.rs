//! In-memory collaborators for exercising the player without Discord,
//! yt-dlp or ffmpeg.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::{
    collections::HashSet,
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::mpsc;

use super::{
    decoder::{PcmDecoder, SampleFrame},
    player::{MusicPlayer, PlayerDeps},
    transport::{VoiceConnection, VoiceGateway},
};
use crate::{
    config::{EmbedColors, GuildMusicConfig, MusicConfig},
    error::{DecodeError, JoinError, SourceError, TransportError},
    sources::{ByteStream, StreamSource, Track},
    ui::{embeds::StatusView, StatusBoard},
};

pub const GUILD: GuildId = GuildId::new(1);
pub const MUSIC_CHANNEL: ChannelId = ChannelId::new(10);

pub fn track(title: &str) -> Track {
    Track::new(title, format!("https://example.com/{title}"), Duration::from_secs(60))
}

/// Polls `check` until it holds, panicking after a few seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while !check().await {
        if tokio::time::Instant::now() > deadline {
            panic!("la condición no se cumplió a tiempo");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub struct Harness {
    pub player: MusicPlayer,
    pub source: Arc<FakeSource>,
    pub voice: Arc<FakeGateway>,
    pub board: Arc<FakeBoard>,
}

pub fn harness(decoder: FakeDecoder) -> Harness {
    harness_with(decoder, |_| {})
}

pub fn harness_with(decoder: FakeDecoder, tweak: impl FnOnce(&mut GuildMusicConfig)) -> Harness {
    let mut guild = GuildMusicConfig {
        guild_id: GUILD.get(),
        enabled: true,
        music_channel: MUSIC_CHANNEL.get(),
        max_queue_size: 0,
        embed_colors: EmbedColors::default(),
    };
    tweak(&mut guild);

    let source = Arc::new(FakeSource::default());
    let voice = Arc::new(FakeGateway::default());
    let board = Arc::new(FakeBoard::default());

    let player = MusicPlayer::new(
        &MusicConfig {
            guilds: vec![guild],
        },
        PlayerDeps {
            source: source.clone(),
            decoder: Arc::new(decoder),
            voice: voice.clone(),
            board: board.clone(),
            frame_buffer: 4,
        },
    );

    Harness {
        player,
        source,
        voice,
        board,
    }
}

#[derive(Default)]
pub struct FakeSource {
    failing: Mutex<HashSet<String>>,
    opened: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn fail(&self, url: &str) {
        self.failing.lock().insert(url.to_string());
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl StreamSource for FakeSource {
    async fn open(&self, track: &Track) -> Result<ByteStream, SourceError> {
        self.opened.lock().push(track.url().to_string());
        if self.failing.lock().contains(track.url()) {
            return Err(SourceError::Pipe(track.url().to_string()));
        }
        Ok(ByteStream::from_reader(&b""[..]))
    }
}

/// Emits silent frames without looking at its input.
pub struct FakeDecoder {
    frames: Option<usize>,
    failures: AtomicUsize,
}

impl FakeDecoder {
    pub fn frames(count: usize) -> Self {
        Self {
            frames: Some(count),
            failures: AtomicUsize::new(0),
        }
    }

    pub fn endless() -> Self {
        Self {
            frames: None,
            failures: AtomicUsize::new(0),
        }
    }

    /// The first `count` decodes fail before emitting any frame.
    pub fn failing_first(self, count: usize) -> Self {
        Self {
            failures: AtomicUsize::new(count),
            ..self
        }
    }
}

#[async_trait]
impl PcmDecoder for FakeDecoder {
    async fn decode(
        &self,
        input: ByteStream,
        out: mpsc::Sender<SampleFrame>,
    ) -> Result<(), DecodeError> {
        input.close().await?;

        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(DecodeError::Pipe("fake".to_string()));
        }

        let mut sent = 0;
        while self.frames.map_or(true, |limit| sent < limit) {
            if out.send(SampleFrame::from_le_bytes(&[])).await.is_err() {
                break;
            }
            sent += 1;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeGateway {
    refuse: AtomicBool,
    delay: Mutex<Duration>,
    connections: Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeGateway {
    pub fn refuse(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    /// Later connects take `delay` before the connection exists.
    pub fn slow(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn connects(&self) -> Vec<ChannelId> {
        self.connections.lock().iter().map(|c| c.channel_id).collect()
    }

    pub fn connection(&self, index: usize) -> Arc<FakeConnection> {
        self.connections.lock()[index].clone()
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn connect(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, JoinError> {
        let delay = *self.delay.lock();
        tokio::time::sleep(delay).await;

        if self.refuse.load(Ordering::SeqCst) {
            return Err(JoinError::Connect("rechazado".to_string()));
        }

        let connection = Arc::new(FakeConnection {
            channel_id,
            frames: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        });
        self.connections.lock().push(connection.clone());
        Ok(connection)
    }
}

pub struct FakeConnection {
    channel_id: ChannelId,
    frames: AtomicUsize,
    closed: AtomicBool,
}

impl FakeConnection {
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn send_frame(&self, _frame: SampleFrame) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeBoard {
    next_id: AtomicU64,
    create_delay: Mutex<Duration>,
    created: Mutex<Vec<ChannelId>>,
    views: Mutex<Vec<StatusView>>,
}

impl FakeBoard {
    /// The message is posted at once but its id comes back after `delay`.
    pub fn slow_create(&self, delay: Duration) {
        *self.create_delay.lock() = delay;
    }

    pub fn views(&self) -> Vec<StatusView> {
        self.views.lock().clone()
    }

    pub fn last(&self) -> Option<StatusView> {
        self.views.lock().last().cloned()
    }

    pub fn created(&self) -> Vec<ChannelId> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl StatusBoard for FakeBoard {
    async fn create(&self, channel_id: ChannelId, view: &StatusView) -> anyhow::Result<MessageId> {
        self.created.lock().push(channel_id);
        self.views.lock().push(view.clone());

        let delay = *self.create_delay.lock();
        tokio::time::sleep(delay).await;
        Ok(MessageId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn edit(
        &self,
        _channel_id: ChannelId,
        _message_id: MessageId,
        view: &StatusView,
    ) -> anyhow::Result<()> {
        self.views.lock().push(view.clone());
        Ok(())
    }
}
