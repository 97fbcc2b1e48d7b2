//! Keyboard shortcut bindings: one `act_*` config key per dispatcher action,
//! grounded in the original's `dispatchActions`/`BarKeyShortcutId_t` table
//! (`ui_dispatch.h`). `disabled` unbinds a key entirely.

/// Bitmask of dispatcher contexts in which an action is available, mirroring
/// `BarUiDispatchContext_t` (`BAR_DC_GLOBAL | BAR_DC_STATION | BAR_DC_SONG`).
pub mod context {
    pub const GLOBAL: u8 = 1;
    pub const STATION: u8 = 2;
    pub const SONG: u8 = 4;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Help,
    LoveSong,
    BanSong,
    AddMusic,
    CreateStation,
    DeleteStation,
    Explain,
    StationFromGenre,
    History,
    SongInfo,
    AddSharedStation,
    SkipSong,
    TogglePause,
    Quit,
    RenameStation,
    SelectStation,
    TempBanSong,
    PrintUpcoming,
    SelectQuickMix,
    Bookmark,
    VolDown,
    VolUp,
    ManageStation,
    CreateStationFromSong,
    Play,
    Pause,
    VolReset,
}

impl Action {
    /// The `act_*` config key, default keystroke and dispatcher context
    /// bitmask for every action, in the original's table order.
    pub const ALL: &'static [(Action, &'static str, char, u8)] = &[
        (Action::Help, "act_help", '?', 0),
        (Action::LoveSong, "act_songlove", '+', context::SONG),
        (Action::BanSong, "act_songban", '-', context::SONG),
        (Action::AddMusic, "act_stationaddmusic", 'a', context::STATION),
        (Action::CreateStation, "act_stationcreate", 'c', context::GLOBAL),
        (Action::DeleteStation, "act_stationdelete", 'd', context::STATION),
        (Action::Explain, "act_songexplain", 'e', context::SONG),
        (Action::StationFromGenre, "act_stationaddbygenre", 'g', context::GLOBAL),
        (Action::History, "act_history", 'h', context::GLOBAL),
        (
            Action::SongInfo,
            "act_songinfo",
            'i',
            context::GLOBAL | context::STATION | context::SONG,
        ),
        (Action::AddSharedStation, "act_addshared", 'j', context::GLOBAL),
        (Action::SkipSong, "act_songnext", 'n', context::GLOBAL | context::STATION),
        (
            Action::TogglePause,
            "act_songpausetoggle",
            'p',
            context::GLOBAL | context::STATION,
        ),
        (Action::Quit, "act_quit", 'q', context::GLOBAL),
        (Action::RenameStation, "act_stationrename", 'r', context::STATION),
        (Action::SelectStation, "act_stationchange", 's', context::GLOBAL),
        (Action::TempBanSong, "act_songtired", 't', context::SONG),
        (
            Action::PrintUpcoming,
            "act_upcoming",
            'u',
            context::GLOBAL | context::STATION,
        ),
        (Action::SelectQuickMix, "act_stationselectquickmix", 'x', context::STATION),
        (Action::Bookmark, "act_bookmark", 'b', context::SONG),
        (Action::VolDown, "act_voldown", '(', context::GLOBAL),
        (Action::VolUp, "act_volup", ')', context::GLOBAL),
        (Action::ManageStation, "act_managestation", '=', context::STATION),
        (
            Action::CreateStationFromSong,
            "act_stationcreatefromsong",
            'v',
            context::SONG,
        ),
        (Action::Play, "act_songplay", 'P', context::GLOBAL | context::STATION),
        (Action::Pause, "act_songpause", 'S', context::GLOBAL | context::STATION),
        (Action::VolReset, "act_volreset", '^', context::GLOBAL),
    ];

    pub fn config_key(self) -> &'static str {
        Self::ALL.iter().find(|(a, ..)| *a == self).unwrap().1
    }

    pub fn default_key(self) -> char {
        Self::ALL.iter().find(|(a, ..)| *a == self).unwrap().2
    }

    /// The dispatcher context bitmask this action requires, per
    /// `BarUiDispatchContext_t` (0 = always available, e.g. help).
    pub fn context(self) -> u8 {
        Self::ALL.iter().find(|(a, ..)| *a == self).unwrap().3
    }
}

/// A bound key is either a keystroke or explicitly disabled (`act_* =
/// disabled` unbinds the default).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Key(char),
    Disabled,
}

#[derive(Debug, Clone)]
pub struct KeyBindings {
    bindings: std::collections::HashMap<Action, Binding>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let bindings = Action::ALL
            .iter()
            .map(|(action, _, key, _)| (*action, Binding::Key(*key)))
            .collect();
        Self { bindings }
    }
}

impl KeyBindings {
    /// Applies a single `act_*` config line; `disabled` unbinds the action,
    /// any other value takes its first byte as the new keystroke (matching
    /// the original's `val[0]` truncation).
    pub fn apply(&mut self, config_key: &str, value: &str) -> bool {
        let Some((action, ..)) = Action::ALL.iter().find(|(_, k, ..)| *k == config_key) else {
            return false;
        };
        let binding = if value == "disabled" {
            Binding::Disabled
        } else {
            match value.chars().next() {
                Some(c) => Binding::Key(c),
                None => return false,
            }
        };
        self.bindings.insert(*action, binding);
        true
    }

    pub fn binding(&self, action: Action) -> Binding {
        self.bindings
            .get(&action)
            .copied()
            .unwrap_or(Binding::Key(action.default_key()))
    }

    /// Resolves a pressed key to the action bound to it, skipping disabled
    /// bindings.
    pub fn action_for_key(&self, key: char) -> Option<Action> {
        self.bindings
            .iter()
            .find(|(_, b)| **b == Binding::Key(key))
            .map(|(a, _)| *a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_action_for_key() {
        let bindings = KeyBindings::default();
        assert_eq!(bindings.action_for_key('q'), Some(Action::Quit));
        assert_eq!(bindings.action_for_key('+'), Some(Action::LoveSong));
    }

    #[test]
    fn disabled_unbinds_the_default_key() {
        let mut bindings = KeyBindings::default();
        assert!(bindings.apply("act_quit", "disabled"));
        assert_eq!(bindings.binding(Action::Quit), Binding::Disabled);
        assert_eq!(bindings.action_for_key('q'), None);
    }

    #[test]
    fn rebinding_takes_first_byte_of_value() {
        let mut bindings = KeyBindings::default();
        assert!(bindings.apply("act_quit", "Q"));
        assert_eq!(bindings.action_for_key('Q'), Some(Action::Quit));
        assert_eq!(bindings.action_for_key('q'), None);
    }

    #[test]
    fn unknown_config_key_is_rejected() {
        let mut bindings = KeyBindings::default();
        assert!(!bindings.apply("act_nonexistent", "z"));
    }

    #[test]
    fn song_info_is_available_in_every_context() {
        assert_eq!(
            Action::SongInfo.context(),
            context::GLOBAL | context::STATION | context::SONG
        );
    }

    #[test]
    fn love_song_requires_song_context() {
        assert_eq!(Action::LoveSong.context(), context::SONG);
    }
}
