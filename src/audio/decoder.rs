use async_trait::async_trait;
use std::{process::Stdio, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    sync::mpsc,
};
use tracing::debug;

use crate::{error::DecodeError, sources::ByteStream};

pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: usize = 2;
/// 20ms @ 48kHz
pub const FRAME_DURATION: Duration = Duration::from_millis(20);
pub const SAMPLES_PER_CHANNEL: usize = 960;
pub const FRAME_SAMPLES: usize = SAMPLES_PER_CHANNEL * CHANNELS;
pub const FRAME_BYTES: usize = FRAME_SAMPLES * 2;

/// One 20ms chunk of interleaved signed 16-bit PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFrame(Vec<i16>);

impl SampleFrame {
    /// Reinterprets little-endian bytes as samples, zero-padding a short
    /// final chunk to a full frame. A trailing odd byte is dropped.
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        let mut samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        samples.resize(FRAME_SAMPLES, 0);
        Self(samples)
    }

    pub fn samples(&self) -> &[i16] {
        &self.0
    }
}

/// Turns a compressed audio stream into PCM frames on a bounded channel.
///
/// Implementations close `out` (by dropping it) when decoding ends, and
/// block while `out` is full.
#[async_trait]
pub trait PcmDecoder: Send + Sync {
    async fn decode(
        &self,
        input: ByteStream,
        out: mpsc::Sender<SampleFrame>,
    ) -> Result<(), DecodeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// El decodificador llegó a EOF
    Finished,
    /// El receptor se cerró (skip o desconexión)
    ConsumerGone,
}

/// Reads fixed-size frames from `reader` until EOF and pushes them on `out`.
pub async fn pump_frames<R>(
    mut reader: R,
    out: &mpsc::Sender<SampleFrame>,
) -> std::io::Result<PumpOutcome>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; FRAME_BYTES];

    loop {
        let filled = fill_frame(&mut reader, &mut buf).await?;
        if filled == 0 {
            return Ok(PumpOutcome::Finished);
        }

        if out.send(SampleFrame::from_le_bytes(&buf[..filled])).await.is_err() {
            return Ok(PumpOutcome::ConsumerGone);
        }

        if filled < FRAME_BYTES {
            return Ok(PumpOutcome::Finished);
        }
    }
}

async fn fill_frame<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Decoder backed by an `ffmpeg` subprocess emitting s16le @ 48kHz stereo.
pub struct FfmpegDecoder {
    program: String,
}

impl FfmpegDecoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Verifica que ffmpeg esté disponible
    pub async fn verify(&self) -> anyhow::Result<()> {
        let output = Command::new(&self.program).arg("-version").output().await?;
        if !output.status.success() {
            anyhow::bail!("{} no disponible", self.program);
        }
        Ok(())
    }
}

#[async_trait]
impl PcmDecoder for FfmpegDecoder {
    async fn decode(
        &self,
        mut input: ByteStream,
        out: mpsc::Sender<SampleFrame>,
    ) -> Result<(), DecodeError> {
        let rate = SAMPLE_RATE.to_string();
        let channels = CHANNELS.to_string();
        let mut child = Command::new(&self.program)
            .args(["-hide_banner", "-loglevel", "error", "-i", "pipe:0"])
            .args(["-f", "s16le", "-ar", rate.as_str(), "-ac", channels.as_str(), "pipe:1"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DecodeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| DecodeError::Pipe(self.program.clone()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DecodeError::Pipe(self.program.clone()))?;

        let feed = async move {
            if let Err(e) = tokio::io::copy(&mut input, &mut stdin).await {
                debug!("Copia hacia ffmpeg interrumpida: {}", e);
            }
            // EOF para ffmpeg
            drop(stdin);
            input.close().await
        };

        let pump = async {
            let outcome = pump_frames(stdout, &out).await;
            if !matches!(outcome, Ok(PumpOutcome::Finished)) {
                let _ = child.start_kill();
            }
            outcome
        };

        let (fed, outcome) = tokio::join!(feed, pump);
        drop(out);

        match outcome? {
            PumpOutcome::ConsumerGone => {
                debug!("Decodificación cancelada por el consumidor");
                let _ = child.wait().await;
                Ok(())
            }
            PumpOutcome::Finished => {
                let status = child.wait().await?;
                if !status.success() {
                    return Err(DecodeError::Exit(status));
                }
                // Una descarga truncada puede decodificarse sin error
                fed?;
                Ok(())
            }
        }
    }
}
