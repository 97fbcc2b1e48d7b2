//! Keystroke resolution and context gating, per spec.md §4.8: "a static
//! table maps each printable key to `{requiredContext, handlerFunction,
//! helpText}`... on each keypress the dispatcher computes the current
//! context bits... verifies required bits... A context mismatch prints a
//! directed error." The handler bodies themselves live in `app.rs`, since
//! Rust's `match` over the resolved `Action` plays the role of the
//! original's function-pointer table more naturally than reintroducing
//! `fn(&mut App)` pointers here.

use rb_config::keys::{context, Action, KeyBindings};

pub struct Context {
    pub has_station: bool,
    pub has_song: bool,
}

impl Context {
    pub fn bits(&self) -> u8 {
        let mut bits = context::GLOBAL;
        if self.has_station {
            bits |= context::STATION;
        }
        if self.has_song {
            bits |= context::SONG;
        }
        bits
    }
}

pub enum Resolved {
    Action(Action),
    WrongContext(Action),
    Unbound,
}

/// Resolves a pressed key to an action and checks it against the current
/// context, without executing anything.
pub fn resolve(bindings: &KeyBindings, ctx: &Context, key: char) -> Resolved {
    let Some(action) = bindings.action_for_key(key) else {
        return Resolved::Unbound;
    };
    let required = action.context();
    if required == 0 || (required & ctx.bits()) == required {
        Resolved::Action(action)
    } else {
        Resolved::WrongContext(action)
    }
}

/// The directed error message for a context mismatch, per spec.md §4.8.
pub fn context_error(action: Action, ctx: &Context) -> &'static str {
    if !ctx.has_song && (action.context() & context::SONG) != 0 {
        return "No song playing";
    }
    if !ctx.has_station && (action.context() & context::STATION) != 0 {
        return "No station selected";
    }
    "Action not available here"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn song_action_without_song_reports_context_mismatch() {
        let bindings = KeyBindings::default();
        let ctx = Context { has_station: true, has_song: false };
        match resolve(&bindings, &ctx, '+') {
            Resolved::WrongContext(Action::LoveSong) => {}
            _ => panic!("expected a context mismatch for love-song without a song"),
        }
        assert_eq!(context_error(Action::LoveSong, &ctx), "No song playing");
    }

    #[test]
    fn global_action_always_resolves() {
        let bindings = KeyBindings::default();
        let ctx = Context { has_station: false, has_song: false };
        assert!(matches!(resolve(&bindings, &ctx, 'q'), Resolved::Action(Action::Quit)));
    }

    #[test]
    fn unbound_key_resolves_to_unbound() {
        let bindings = KeyBindings::default();
        let ctx = Context { has_station: true, has_song: true };
        assert!(matches!(resolve(&bindings, &ctx, 'Z'), Resolved::Unbound));
    }
}
