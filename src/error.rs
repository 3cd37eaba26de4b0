//! Error taxonomy for the music subsystem.
//!
//! Every error here is scoped to one guild, one track or one user
//! interaction; none of them is allowed to bring the process down.

use serenity::model::id::GuildId;
use thiserror::Error;

/// Media Resolver failures.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no se encontró ningún resultado para `{0}`")]
    NotFound(String),
    #[error("fallo al consultar yt-dlp: {0}")]
    Lookup(String),
}

/// Stream Source failures (download process).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no se pudo iniciar {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no se pudo conectar la salida de {0}")]
    Pipe(String),
    #[error("la descarga terminó con estado {0}")]
    Exit(std::process::ExitStatus),
}

/// PCM Decoder failures (transcode process).
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no se pudo iniciar {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no se pudo conectar la tubería de {0}")]
    Pipe(String),
    #[error("error leyendo PCM: {0}")]
    Read(#[from] std::io::Error),
    #[error("el decodificador terminó con estado {0}")]
    Exit(std::process::ExitStatus),
    #[error("la fuente de audio falló: {0}")]
    Input(#[from] SourceError),
}

/// Voice connection failures.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error("no se pudo conectar al canal de voz: {0}")]
    Connect(String),
}

/// Frame delivery failures on a live voice connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("la conexión de voz está cerrada")]
    Closed,
}

/// Errors surfaced by the playback controller.
#[derive(Debug, Error)]
pub enum MusicError {
    #[error("la guild {0} no tiene música configurada")]
    NotConfigured(GuildId),
    #[error("la música está desactivada en la guild {0}")]
    Disabled(GuildId),
    #[error("la cola está llena (máximo {0} canciones)")]
    QueueFull(usize),
    #[error(transparent)]
    Join(#[from] JoinError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl MusicError {
    /// Configuration errors are silent no-ops rather than user-facing failures.
    pub fn is_config(&self) -> bool {
        matches!(self, MusicError::NotConfigured(_) | MusicError::Disabled(_))
    }
}
