//! Symbolic key name -> X11 keysym mapping (C4).

/// Anything a caller can pass to [`crate::Client::key_down`] /
/// [`crate::Client::key_up`] / [`crate::Client::press_key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// A single printable ASCII character (`0x20..=0x7E`); passed through
    /// by ordinal, since the ASCII range is also the X11 keysym range
    /// for those characters.
    Char(char),
    /// A name from the special-keys table (`"enter"`, `"F5"`, ...).
    Named(String),
    /// A raw X11 keysym, already resolved.
    Raw(u32),
}

impl From<char> for Key {
    fn from(c: char) -> Key {
        Key::Char(c)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Key {
        Key::Named(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Key {
        Key::Named(name)
    }
}

impl From<u32> for Key {
    fn from(keysym: u32) -> Key {
        Key::Raw(keysym)
    }
}

/// Resolves a [`Key`] to its X11 keysym integer.
///
/// Printable ASCII (`0x20..=0x7E`) maps to its own ordinal. Names are
/// looked up case-sensitively against the table below, which mirrors
/// (and slightly extends, with `lshift`/`rshift`/etc.) the keysym table
/// the original Python client shipped. An unrecognised name is treated
/// as malformed input by the caller's responsibility, not this
/// function's: it falls back to `0`, the X11 `NoSymbol` value, so a
/// caller that mistypes a key name sends a harmless no-op key event
/// rather than panicking mid-automation-script.
pub fn to_keysym(key: Key) -> u32 {
    match key {
        Key::Char(c) if ('\u{20}'..='\u{7e}').contains(&c) => c as u32,
        Key::Char(c) => c as u32,
        Key::Raw(keysym) => keysym,
        Key::Named(name) => named_keysym(&name).unwrap_or(0),
    }
}

fn named_keysym(name: &str) -> Option<u32> {
    Some(match name {
        "backspace" => 0xff08,
        "tab" => 0xff09,
        "return" | "enter" => 0xff0d,
        "esc" | "escape" => 0xff1b,
        "ins" | "insert" => 0xff63,
        "delete" | "del" => 0xffff,
        "home" => 0xff50,
        "end" => 0xff57,
        "pgup" | "page_up" => 0xff55,
        "pgdn" | "page_down" => 0xff56,
        "left" => 0xff51,
        "up" => 0xff52,
        "right" => 0xff53,
        "down" => 0xff54,
        "F1" => 0xffbe,
        "F2" => 0xffbf,
        "F3" => 0xffc0,
        "F4" => 0xffc1,
        "F5" => 0xffc2,
        "F6" => 0xffc3,
        "F7" => 0xffc4,
        "F8" => 0xffc5,
        "F9" => 0xffc6,
        "F10" => 0xffc7,
        "F11" => 0xffc8,
        "F12" => 0xffc9,
        "lshift" => 0xffe1,
        "rshift" => 0xffe2,
        "lctrl" => 0xffe3,
        "rctrl" => 0xffe4,
        "lmeta" => 0xffe7,
        "rmeta" => 0xffe8,
        "lalt" => 0xffe9,
        "ralt" => 0xffea,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_ascii_is_identity() {
        for c in '\u{20}'..='\u{7e}' {
            assert_eq!(to_keysym(Key::Char(c)), c as u32);
        }
    }

    #[test]
    fn named_keys_resolve() {
        assert_eq!(to_keysym(Key::from("enter")), 0xff0d);
        assert_eq!(to_keysym(Key::from("F5")), 0xffc2);
        assert_eq!(to_keysym(Key::from("lalt")), 0xffe9);
    }

    #[test]
    fn raw_keysym_passes_through() {
        assert_eq!(to_keysym(Key::Raw(0x1234)), 0x1234);
    }

    #[test]
    fn unknown_name_is_nosymbol() {
        assert_eq!(to_keysym(Key::from("not_a_real_key")), 0);
    }
}
