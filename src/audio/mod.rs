//! # Audio Module
//!
//! Per-guild playback pipeline for the music channel.
//!
//! ## Architecture
//!
//! ### [`player`] - Playback Controller
//! - Public entry point: enqueue, pause, resume, skip, disconnect, join
//! - Owns one [`queue::GuildMusicState`] per configured guild behind a mutex
//! - Keeps the status message in sync after every transition
//!
//! ### [`worker`] - Queue Worker
//! - Drains the queue one track at a time
//! - Stream Source -> PCM Decoder -> voice transport, paced at 20ms per frame
//! - A failing track is logged and skipped, the queue keeps moving
//!
//! ### [`registry`] - Worker Registry
//! - At most one live worker per guild, looked up instead of tracked by a flag
//!
//! ### [`decoder`], [`transport`], [`voice`]
//! - ffmpeg-backed PCM decoding into fixed 20ms frames
//! - Voice transport traits and their songbird implementation
//!
//! ## Audio Format
//!
//! - **Sample Rate**: 48kHz (Discord standard)
//! - **Bit Depth**: 16-bit signed integers, little-endian
//! - **Channels**: Stereo (2 channels)
//! - **Frame**: 960 samples per channel (20ms)

pub mod decoder;
pub mod player;
pub mod queue;
pub mod registry;
pub mod transport;
pub mod voice;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use decoder::FfmpegDecoder;
pub use player::{MusicPlayer, PlayerDeps};
pub use voice::SongbirdGateway;
