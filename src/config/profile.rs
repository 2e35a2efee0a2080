//! Parser for the profile text format (spec §6): key/value entries,
//! optionally grouped under section headers (Konsole's actual `.profile`
//! files use `[General]`/`[Scrolling]`/... sections; the core does not
//! care which section a recognised key lives in, since there is no
//! ambiguity between key names).

use super::{parse_bool, parse_sections};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Disable,
    FixedSize,
    Unlimited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBarPosition {
    None,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorShape {
    Block,
    Underline,
    IBeam,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: Option<String>,
    pub command: Option<String>,
    pub arguments: Vec<String>,
    pub icon: Option<String>,
    pub local_tab_title_format: Option<String>,
    pub remote_tab_title_format: Option<String>,
    pub tab_bar_mode: Option<String>,
    pub show_menu_bar: bool,
    pub key_bindings: Option<String>,
    pub color_scheme: Option<String>,
    pub font: Option<String>,
    pub history_mode: HistoryMode,
    pub history_size: u32,
    pub scroll_bar_position: ScrollBarPosition,
    pub flow_control_enabled: bool,
    pub allow_programs_to_resize_window: bool,
    pub blinking_text_enabled: bool,
    pub blinking_cursor_enabled: bool,
    pub cursor_shape: CursorShape,
    pub use_custom_cursor_color: bool,
    pub custom_cursor_color: Option<String>,
    pub word_characters: Option<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: None,
            command: None,
            arguments: Vec::new(),
            icon: None,
            local_tab_title_format: None,
            remote_tab_title_format: None,
            tab_bar_mode: None,
            show_menu_bar: true,
            key_bindings: None,
            color_scheme: None,
            font: None,
            history_mode: HistoryMode::FixedSize,
            history_size: 10_000,
            scroll_bar_position: ScrollBarPosition::Right,
            flow_control_enabled: true,
            allow_programs_to_resize_window: true,
            blinking_text_enabled: false,
            blinking_cursor_enabled: false,
            cursor_shape: CursorShape::Block,
            use_custom_cursor_color: false,
            custom_cursor_color: None,
            word_characters: None,
        }
    }
}

impl Profile {
    pub fn parse(text: &str) -> Self {
        let mut profile = Profile::default();
        for (_section, pairs) in parse_sections(text) {
            for (key, value) in pairs {
                apply(&mut profile, &key, &value);
            }
        }
        profile
    }
}

fn apply(profile: &mut Profile, key: &str, value: &str) {
    match key {
        "Name" => profile.name = Some(value.to_string()),
        "Command" => profile.command = Some(value.to_string()),
        "Arguments" => profile.arguments = value.split_whitespace().map(str::to_string).collect(),
        "Icon" => profile.icon = Some(value.to_string()),
        "LocalTabTitleFormat" => profile.local_tab_title_format = Some(value.to_string()),
        "RemoteTabTitleFormat" => profile.remote_tab_title_format = Some(value.to_string()),
        "TabBarMode" => profile.tab_bar_mode = Some(value.to_string()),
        "ShowMenuBar" => profile.show_menu_bar = parse_bool(value),
        "KeyBindings" => profile.key_bindings = Some(value.to_string()),
        "ColorScheme" => profile.color_scheme = Some(value.to_string()),
        "Font" => profile.font = Some(value.to_string()),
        "HistoryMode" => {
            profile.history_mode = match value {
                "DisableHistory" => HistoryMode::Disable,
                "UnlimitedHistory" => HistoryMode::Unlimited,
                _ => HistoryMode::FixedSize,
            }
        }
        "HistorySize" => profile.history_size = value.parse().unwrap_or(profile.history_size),
        "ScrollBarPosition" => {
            profile.scroll_bar_position = match value {
                "Left" => ScrollBarPosition::Left,
                "None" => ScrollBarPosition::None,
                _ => ScrollBarPosition::Right,
            }
        }
        "FlowControlEnabled" => profile.flow_control_enabled = parse_bool(value),
        "AllowProgramsToResizeWindow" => profile.allow_programs_to_resize_window = parse_bool(value),
        "BlinkingTextEnabled" => profile.blinking_text_enabled = parse_bool(value),
        "BlinkingCursorEnabled" => profile.blinking_cursor_enabled = parse_bool(value),
        "CursorShape" => {
            profile.cursor_shape = match value {
                "Underline" => CursorShape::Underline,
                "IBeam" => CursorShape::IBeam,
                _ => CursorShape::Block,
            }
        }
        "UseCustomCursorColor" => profile.use_custom_cursor_color = parse_bool(value),
        "CustomCursorColor" => profile.custom_cursor_color = Some(value.to_string()),
        "WordCharacters" => profile.word_characters = Some(value.to_string()),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognised_keys_across_sections() {
        let text = "[General]\nName=bash\nCommand=/bin/bash\nArguments=-l --login\nHistoryMode=UnlimitedHistory\n\n[Terminal Features]\nCursorShape=IBeam\nBlinkingCursorEnabled=true\n";
        let profile = Profile::parse(text);
        assert_eq!(profile.name.as_deref(), Some("bash"));
        assert_eq!(profile.arguments, vec!["-l", "--login"]);
        assert_eq!(profile.history_mode, HistoryMode::Unlimited);
        assert_eq!(profile.cursor_shape, CursorShape::IBeam);
        assert!(profile.blinking_cursor_enabled);
    }

    #[test]
    fn unrecognised_keys_are_ignored_not_fatal() {
        let text = "[General]\nName=zsh\nSomeFutureKey=value\n";
        let profile = Profile::parse(text);
        assert_eq!(profile.name.as_deref(), Some("zsh"));
    }
}
