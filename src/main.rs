use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::{FfmpegDecoder, MusicPlayer, PlayerDeps, SongbirdGateway};
use crate::bot::{Bot, Feature, FeatureContext, MusicFeature};
use crate::config::{Config, MusicConfig};
use crate::sources::{MediaResolver, YtDlpClient};
use crate::ui::SerenityStatusBoard;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("music_queue_bot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Music Queue Bot v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    info!("{}", config.summary());
    let music_config = MusicConfig::load(&config.music_config)?;

    let http = Arc::new(Http::new(&config.discord_token));
    let songbird = Songbird::serenity();

    // Componentes del reproductor
    let ytdlp = Arc::new(YtDlpClient::new(config.ytdlp_path.clone()));
    let player = MusicPlayer::new(
        &music_config,
        PlayerDeps {
            source: ytdlp.clone(),
            decoder: Arc::new(FfmpegDecoder::new(config.ffmpeg_path.clone())),
            voice: Arc::new(SongbirdGateway::new(songbird.clone())),
            board: Arc::new(SerenityStatusBoard::new(http.clone())),
            frame_buffer: config.frame_buffer,
        },
    );
    let music = MusicFeature::new(player, MediaResolver::new(ytdlp), config.reply_ttl);

    let features: Vec<Arc<dyn Feature>> = vec![Arc::new(music)];
    let handler = Bot::init(features, &FeatureContext { http }).await;
    info!("🧩 Features activas: {:?}", handler.feature_names());

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Error al registrar Ctrl+C");
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    // Verificar dependencias críticas
    let yt_dlp = YtDlpClient::new(config.ytdlp_path.clone()).verify().await;
    let ffmpeg = FfmpegDecoder::new(config.ffmpeg_path.clone()).verify().await;

    match (yt_dlp, ffmpeg) {
        (Ok(version), Ok(())) => {
            info!("yt-dlp {}", version);
            println!("OK");
            Ok(())
        }
        (yt_dlp, ffmpeg) => {
            error!("yt-dlp: {:?}, ffmpeg: {:?}", yt_dlp.err(), ffmpeg.err());
            anyhow::bail!("Dependencias faltantes");
        }
    }
}
