use anyhow::{Context, Result};
use serde::Deserialize;
use serenity::model::id::{ChannelId, GuildId};
use std::{path::PathBuf, time::Duration};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,

    // Procesos externos
    pub ytdlp_path: String,
    pub ffmpeg_path: String,

    // Audio
    pub frame_buffer: usize,

    // UI
    pub reply_ttl: Duration,

    // Paths
    pub music_config: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN no definido")?,

            // Procesos externos
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),

            // Audio
            frame_buffer: std::env::var("FRAME_BUFFER")
                .unwrap_or_else(|_| "256".to_string()) // ~5s de audio
                .parse()?,

            // UI
            reply_ttl: humantime::parse_duration(
                &std::env::var("REPLY_TTL").unwrap_or_else(|_| "5s".to_string()),
            )?,

            // Paths
            music_config: std::env::var("MUSIC_CONFIG")
                .unwrap_or_else(|_| "configs/music".to_string())
                .into(),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - The Discord token must not be empty
    /// - The decoder frame buffer must hold at least one frame
    /// - External program paths must not be empty
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN está vacío");
        }

        if self.frame_buffer == 0 {
            anyhow::bail!("Frame buffer must be greater than 0");
        }

        if self.ytdlp_path.trim().is_empty() || self.ffmpeg_path.trim().is_empty() {
            anyhow::bail!("Las rutas de yt-dlp y ffmpeg no pueden estar vacías");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Tools: yt-dlp={} ffmpeg={}\n  \
            Audio: {} frames de buffer ({}ms)\n  \
            UI: respuestas visibles {}\n  \
            Music config: {}",
            self.ytdlp_path,
            self.ffmpeg_path,
            self.frame_buffer,
            self.frame_buffer * 20,
            humantime::format_duration(self.reply_ttl),
            self.music_config.display(),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            ytdlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            frame_buffer: 256,
            reply_ttl: Duration::from_secs(5),
            music_config: "configs/music".into(),
        }
    }
}

/// Music feature settings, one entry per guild.
///
/// Loaded from `MUSIC_CONFIG` (json5, json or toml by extension) with
/// `MUSIC__*` environment overrides layered on top.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MusicConfig {
    #[serde(default)]
    pub guilds: Vec<GuildMusicConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildMusicConfig {
    pub guild_id: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub music_channel: u64,
    /// Maximum pending tracks; `0` disables the limit.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default)]
    pub embed_colors: EmbedColors,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedColors {
    pub playing: String,
    pub paused: String,
    pub error: String,
}

impl Default for EmbedColors {
    fn default() -> Self {
        Self {
            playing: "0x00FF00".to_string(),
            paused: "0xFFFF00".to_string(),
            error: "0xFF0000".to_string(),
        }
    }
}

impl EmbedColors {
    pub fn playing(&self) -> u32 {
        parse_hex_color(&self.playing)
    }

    pub fn paused(&self) -> u32 {
        parse_hex_color(&self.paused)
    }

    pub fn error(&self) -> u32 {
        parse_hex_color(&self.error)
    }
}

fn default_enabled() -> bool {
    true
}

fn default_max_queue_size() -> usize {
    100
}

impl MusicConfig {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(&path.to_string_lossy()).required(false))
            .add_source(::config::Environment::with_prefix("MUSIC").separator("__"))
            .build()
            .with_context(|| format!("No se pudo leer {}", path.display()))?;

        let music: MusicConfig = settings
            .try_deserialize()
            .context("Configuración de música inválida")?;
        music.validate()?;

        if music.guilds.is_empty() {
            warn!("🎵 No hay guilds configuradas para música en {}", path.display());
        }

        Ok(music)
    }

    pub fn validate(&self) -> Result<()> {
        for guild in &self.guilds {
            if guild.guild_id == 0 {
                anyhow::bail!("guild_id no puede ser 0");
            }
            if guild.music_channel == 0 {
                anyhow::bail!("music_channel de la guild {} no puede ser 0", guild.guild_id);
            }
        }
        Ok(())
    }
}

impl GuildMusicConfig {
    pub fn guild(&self) -> GuildId {
        GuildId::new(self.guild_id)
    }

    pub fn channel(&self) -> ChannelId {
        ChannelId::new(self.music_channel)
    }

    /// `None` when the queue is unbounded.
    pub fn queue_limit(&self) -> Option<usize> {
        (self.max_queue_size > 0).then_some(self.max_queue_size)
    }
}

/// Parses `0xRRGGBB` (or `#RRGGBB`), falling back to white.
pub fn parse_hex_color(color: &str) -> u32 {
    let digits = color
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X")
        .trim_start_matches('#');
    u32::from_str_radix(digits, 16).unwrap_or(0xFFFFFF)
}
