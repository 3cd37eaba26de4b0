use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::{process::Stdio, sync::OnceLock, time::Duration};
use tracing::{debug, info};

use super::{ByteStream, StreamSource, Track, TrackLookup};
use crate::error::{ResolveError, SourceError};

/// Cliente para interactuar con YouTube/yt-dlp
pub struct YtDlpClient {
    program: String,
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    duration: Option<f64>,
    webpage_url: String,
}

impl YtDlpClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Verifica que yt-dlp esté disponible
    pub async fn verify(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.program).arg("--version").output().await?;
        if !output.status.success() {
            anyhow::bail!("{} no disponible", self.program);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Convierte un ID de YouTube en URL canónica
    pub fn video_url(id: &str) -> Option<String> {
        if !video_id_regex().is_match(id) {
            return None;
        }
        url::Url::parse_with_params("https://www.youtube.com/watch", &[("v", id)])
            .ok()
            .map(String::from)
    }

    fn parse_info(stdout: &[u8]) -> Option<Track> {
        let stdout = String::from_utf8_lossy(stdout);
        let line = stdout.lines().find(|l| !l.trim().is_empty())?;
        let info: YtDlpInfo = serde_json::from_str(line).ok()?;

        Some(Track::new(
            info.title,
            info.webpage_url,
            info.duration
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or_default(),
        ))
    }
}

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("regex válida"))
}

#[async_trait]
impl TrackLookup for YtDlpClient {
    async fn lookup(&self, reference: &str) -> Result<Track, ResolveError> {
        debug!("📊 Obteniendo info de: {}", reference);

        let output = Command::new(&self.program)
            .args(["--dump-json", "--no-playlist", "--no-warnings", "--", reference])
            .output()
            .await
            .map_err(|e| ResolveError::Lookup(e.to_string()))?;

        if !output.status.success() {
            debug!(
                "yt-dlp no reconoce `{}`: {}",
                reference,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(ResolveError::NotFound(reference.to_string()));
        }

        Self::parse_info(&output.stdout).ok_or_else(|| ResolveError::NotFound(reference.to_string()))
    }

    async fn search(&self, name: &str) -> Result<String, ResolveError> {
        info!("🔍 Buscando en YouTube: {}", name);

        let query = format!("ytsearch1:{name}");
        let output = Command::new(&self.program)
            .args([query.as_str(), "--get-id", "--no-warnings"])
            .output()
            .await
            .map_err(|e| ResolveError::Lookup(e.to_string()))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Lookup(error.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .map(str::trim)
            .find_map(Self::video_url)
            .ok_or_else(|| ResolveError::NotFound(name.to_string()))
    }
}

#[async_trait]
impl StreamSource for YtDlpClient {
    async fn open(&self, track: &Track) -> Result<ByteStream, SourceError> {
        debug!("🎵 Abriendo stream de: {}", track.url());

        let mut child = tokio::process::Command::new(&self.program)
            .args(["-f", "bestaudio", "--quiet", "-o", "-", "--", track.url()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SourceError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::Pipe(self.program.clone()))?;

        Ok(ByteStream::from_child(child, stdout))
    }
}
