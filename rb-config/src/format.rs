//! Status-line prefixes/suffixes (`format_msg_*`) and now-playing/list
//! templates (`format_nowplaying_*`, `format_list_song`), grounded in
//! `settings.c`'s `msgFormat` table and `%s`/`%t`/`%a`/`%l` placeholder
//! handling.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    None,
    Info,
    Playing,
    Time,
    Err,
    Question,
    List,
}

impl MsgType {
    const ALL: [MsgType; 7] = [
        MsgType::None,
        MsgType::Info,
        MsgType::Playing,
        MsgType::Time,
        MsgType::Err,
        MsgType::Question,
        MsgType::List,
    ];

    fn config_suffix(self) -> &'static str {
        match self {
            MsgType::None => "none",
            MsgType::Info => "info",
            MsgType::Playing => "nowplaying",
            MsgType::Time => "time",
            MsgType::Err => "err",
            MsgType::Question => "question",
            MsgType::List => "list",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MsgFormatStr {
    pub prefix: String,
    pub postfix: String,
}

#[derive(Debug, Clone)]
pub struct MsgFormats {
    formats: [MsgFormatStr; 7],
}

impl Default for MsgFormats {
    fn default() -> Self {
        let mut formats: [MsgFormatStr; 7] = Default::default();
        formats[MsgType::Info as usize] = MsgFormatStr { prefix: "(i) ".into(), postfix: String::new() };
        formats[MsgType::Playing as usize] = MsgFormatStr { prefix: "|>  ".into(), postfix: String::new() };
        formats[MsgType::Time as usize] = MsgFormatStr { prefix: "#   ".into(), postfix: String::new() };
        formats[MsgType::Err as usize] = MsgFormatStr { prefix: "/!\\ ".into(), postfix: String::new() };
        formats[MsgType::Question as usize] = MsgFormatStr { prefix: "[?] ".into(), postfix: String::new() };
        formats[MsgType::List as usize] = MsgFormatStr { prefix: "\t".into(), postfix: String::new() };
        Self { formats }
    }
}

impl MsgFormats {
    pub fn get(&self, ty: MsgType) -> &MsgFormatStr {
        &self.formats[ty as usize]
    }

    /// Applies a `format_msg_<type> = <prefix>%s<postfix>` config line;
    /// the default is kept unchanged if the value has no `%s` placeholder.
    pub fn apply(&mut self, config_key: &str, value: &str) -> bool {
        let Some(type_name) = config_key.strip_prefix("format_msg_") else {
            return false;
        };
        let Some(ty) = MsgType::ALL.iter().find(|t| t.config_suffix() == type_name) else {
            return false;
        };
        let Some(pos) = value.find("%s") else {
            return true; // recognized key, default kept per the original
        };
        self.formats[*ty as usize] = MsgFormatStr {
            prefix: value[..pos].to_string(),
            postfix: value[pos + 2..].to_string(),
        };
        true
    }

    pub fn render(&self, ty: MsgType, body: &str) -> String {
        let fmt = self.get(ty);
        format!("{}{}{}", fmt.prefix, body, fmt.postfix)
    }
}

/// Now-playing / list-song templates: `%t` title, `%a` artist, `%l` album,
/// `%s` station name, `%r` rating icon, `%@` "at" icon, `%i` list index.
#[derive(Debug, Clone)]
pub struct SongFormats {
    pub now_playing_song: String,
    pub now_playing_station: String,
    pub list_song: String,
}

impl Default for SongFormats {
    fn default() -> Self {
        Self {
            now_playing_song: "\"%t\" by \"%a\" on \"%l\"%r%@%s".into(),
            now_playing_station: "Station \"%n\" (%i)".into(),
            list_song: "%i) %a - %t%r".into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Icons {
    pub love: String,
    pub ban: String,
    pub at: String,
}

impl Icons {
    pub fn defaults() -> Self {
        Self {
            love: " <3".into(),
            ban: " </3".into(),
            at: " @ ".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_renders_with_prefix() {
        let formats = MsgFormats::default();
        assert_eq!(formats.render(MsgType::Err, "oops"), "/!\\ oops");
    }

    #[test]
    fn apply_overrides_prefix_and_postfix() {
        let mut formats = MsgFormats::default();
        assert!(formats.apply("format_msg_err", ">> %s <<"));
        assert_eq!(formats.render(MsgType::Err, "oops"), ">> oops <<");
    }

    #[test]
    fn apply_without_placeholder_keeps_default() {
        let mut formats = MsgFormats::default();
        assert!(formats.apply("format_msg_err", "no placeholder here"));
        assert_eq!(formats.render(MsgType::Err, "oops"), "/!\\ oops");
    }
}
