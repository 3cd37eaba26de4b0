use serenity::{all::Colour, builder::CreateEmbed};
use std::{fmt::Write as _, time::Duration};

use crate::{
    audio::queue::{PlaybackSnapshot, VISIBLE_QUEUE},
    config::EmbedColors,
    sources::Track,
};

pub const STATUS_TITLE: &str = "Now Playing";
pub const IDLE_PLACEHOLDER: &str = "No songs currently playing.";

/// Rendered status message, independent of Discord builders.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusView {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub is_playing: bool,
}

impl StatusView {
    pub fn from_snapshot(snapshot: &PlaybackSnapshot, colors: &EmbedColors) -> Self {
        let description = match &snapshot.current {
            Some(current) => {
                let mut text = format!("**Now Playing:** {}\n\n**Queue:**\n", track_line(current));
                for (index, track) in snapshot.upcoming.iter().take(VISIBLE_QUEUE).enumerate() {
                    let _ = writeln!(text, "{}. {}", index + 1, track_line(track));
                }
                if snapshot.has_overflow() {
                    text.push_str("...and more");
                }
                text
            }
            None => IDLE_PLACEHOLDER.to_string(),
        };

        let color = if snapshot.is_playing {
            colors.playing()
        } else {
            colors.paused()
        };

        Self {
            title: STATUS_TITLE.to_string(),
            description,
            color,
            is_playing: snapshot.is_playing,
        }
    }

    pub fn to_embed(&self) -> CreateEmbed {
        CreateEmbed::default()
            .title(&self.title)
            .description(&self.description)
            .color(Colour::new(self.color))
    }
}

/// Embed for transient replies in the music channel
pub fn create_error_embed(description: &str, colors: &EmbedColors) -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Error")
        .description(description)
        .color(Colour::new(colors.error()))
}

fn track_line(track: &Track) -> String {
    format!(
        "[{}]({}) ({})",
        track.title(),
        track.url(),
        format_duration(track.duration())
    )
}

/// Formatea una duración como `MM:SS` (o `H:MM:SS` desde una hora)
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
