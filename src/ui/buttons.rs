use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

/// IDs personalizados para los botones
pub mod button_ids {
    pub const PLAY: &str = "music_play";
    pub const PAUSE: &str = "music_pause";
    pub const SKIP: &str = "music_skip";
    pub const DISCONNECT: &str = "music_disconnect";
}

/// Control decoded from a status message button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Play,
    Pause,
    Skip,
    Disconnect,
}

impl ControlAction {
    pub const ALL: [ControlAction; 4] = [
        ControlAction::Play,
        ControlAction::Pause,
        ControlAction::Skip,
        ControlAction::Disconnect,
    ];

    /// `None` for buttons that do not belong to the music player.
    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        match custom_id {
            button_ids::PLAY => Some(Self::Play),
            button_ids::PAUSE => Some(Self::Pause),
            button_ids::SKIP => Some(Self::Skip),
            button_ids::DISCONNECT => Some(Self::Disconnect),
            _ => None,
        }
    }

    pub fn custom_id(self) -> &'static str {
        match self {
            Self::Play => button_ids::PLAY,
            Self::Pause => button_ids::PAUSE,
            Self::Skip => button_ids::SKIP,
            Self::Disconnect => button_ids::DISCONNECT,
        }
    }

    fn button(self) -> CreateButton {
        let (emoji, label, style) = match self {
            Self::Play => ('▶', "Play", ButtonStyle::Success),
            Self::Pause => ('⏸', "Pause", ButtonStyle::Secondary),
            Self::Skip => ('⏭', "Skip", ButtonStyle::Secondary),
            Self::Disconnect => ('⏹', "Disconnect", ButtonStyle::Danger),
        };

        CreateButton::new(self.custom_id())
            .emoji(emoji)
            .label(label)
            .style(style)
    }
}

/// Crea la fila de controles del reproductor
pub fn create_player_controls() -> CreateActionRow {
    CreateActionRow::Buttons(ControlAction::ALL.into_iter().map(ControlAction::button).collect())
}
