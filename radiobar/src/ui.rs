//! Message printing: ANSI erase-line + per-type prefix/postfix, grounded in
//! `examples/original_source/src/ui.c`'s `BarUiMsg` (`\033[2K` clears the
//! current line before writing, so a redrawn play-clock line doesn't leave
//! stale characters behind it).

use std::io::Write as _;

use rb_config::format::{MsgFormats, MsgType};

const ERASE_LINE: &str = "\x1b[2K";

pub fn msg(formats: &MsgFormats, ty: MsgType, body: &str) {
    print!("\r{ERASE_LINE}{}", formats.render(ty, body));
    let _ = std::io::stdout().flush();
    println!();
}

/// Prints without a trailing newline, used for the once-per-second play
/// clock so the next redraw overwrites it in place.
pub fn msg_inplace(formats: &MsgFormats, ty: MsgType, body: &str) {
    print!("\r{ERASE_LINE}{}", formats.render(ty, body));
    let _ = std::io::stdout().flush();
}

pub fn list_item(formats: &MsgFormats, index: usize, label: &str) {
    msg(formats, MsgType::List, &format!("{index}) {label}"));
}

pub fn prompt(formats: &MsgFormats, body: &str) -> String {
    print!("\r{ERASE_LINE}{}", formats.render(MsgType::Question, body));
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);
    line.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_erase_line_prefix() {
        // Smoke test: formatting doesn't panic and embeds the erase sequence.
        let formats = MsgFormats::default();
        let rendered = format!("\r{ERASE_LINE}{}", formats.render(MsgType::Info, "hello"));
        assert!(rendered.starts_with("\r\x1b[2K"));
        assert!(rendered.ends_with("hello"));
    }
}
