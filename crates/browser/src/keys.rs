//! Key names and combinations ("Control+Shift+A") translated to DevTools key events.

use webnav_core::{Error, Result};

pub const MODIFIER_ALT: u8 = 1;
pub const MODIFIER_CONTROL: u8 = 2;
pub const MODIFIER_META: u8 = 4;
pub const MODIFIER_SHIFT: u8 = 8;

/// A single physical key as the Input domain expects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStroke {
    pub key: String,
    pub code: String,
    pub key_code: u32,
    /// Character produced by the key, if any.
    pub text: Option<String>,
}

impl KeyStroke {
    fn named(key: &str, code: &str, key_code: u32, text: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            code: code.to_string(),
            key_code,
            text: text.map(|t| t.to_string()),
        }
    }

    /// Resolve a key name such as `Enter`, `PageDown`, `a` or `Control`.
    pub fn parse(name: &str) -> Option<Self> {
        let stroke = match name {
            "Enter" | "Return" => Self::named("Enter", "Enter", 13, Some("\r")),
            "Tab" => Self::named("Tab", "Tab", 9, None),
            "Escape" | "Esc" => Self::named("Escape", "Escape", 27, None),
            "Backspace" => Self::named("Backspace", "Backspace", 8, None),
            "Delete" => Self::named("Delete", "Delete", 46, None),
            "ArrowUp" | "Up" => Self::named("ArrowUp", "ArrowUp", 38, None),
            "ArrowDown" | "Down" => Self::named("ArrowDown", "ArrowDown", 40, None),
            "ArrowLeft" | "Left" => Self::named("ArrowLeft", "ArrowLeft", 37, None),
            "ArrowRight" | "Right" => Self::named("ArrowRight", "ArrowRight", 39, None),
            "Home" => Self::named("Home", "Home", 36, None),
            "End" => Self::named("End", "End", 35, None),
            "PageUp" => Self::named("PageUp", "PageUp", 33, None),
            "PageDown" => Self::named("PageDown", "PageDown", 34, None),
            "Space" | " " => Self::named(" ", "Space", 32, Some(" ")),
            "Control" | "Ctrl" => Self::named("Control", "ControlLeft", 17, None),
            "Shift" => Self::named("Shift", "ShiftLeft", 16, None),
            "Alt" | "Option" => Self::named("Alt", "AltLeft", 18, None),
            "Meta" | "Cmd" | "Command" => Self::named("Meta", "MetaLeft", 91, None),
            _ => {
                let mut chars = name.chars();
                let c = chars.next()?;
                if chars.next().is_some() {
                    return parse_function_key(name);
                }
                return Self::for_char(c);
            }
        };
        Some(stroke)
    }

    /// Key stroke that types `c`, for characters on a US layout.
    pub fn for_char(c: char) -> Option<Self> {
        if c == '\n' || c == '\r' {
            return Self::parse("Enter");
        }
        if c == ' ' {
            return Self::parse("Space");
        }
        if !c.is_ascii_graphic() {
            return None;
        }
        let upper = c.to_ascii_uppercase();
        let (code, key_code) = if c.is_ascii_alphabetic() {
            (format!("Key{}", upper), upper as u32)
        } else if c.is_ascii_digit() {
            (format!("Digit{}", c), c as u32)
        } else {
            (String::new(), 0)
        };
        Some(Self {
            key: c.to_string(),
            code,
            key_code,
            text: Some(c.to_string()),
        })
    }

    /// Modifier bit for Control/Shift/Alt/Meta keys, 0 for everything else.
    pub fn modifier_bit(&self) -> u8 {
        match self.key.as_str() {
            "Alt" => MODIFIER_ALT,
            "Control" => MODIFIER_CONTROL,
            "Meta" => MODIFIER_META,
            "Shift" => MODIFIER_SHIFT,
            _ => 0,
        }
    }
}

fn parse_function_key(name: &str) -> Option<KeyStroke> {
    let n: u32 = name.strip_prefix('F')?.parse().ok()?;
    if !(1..=12).contains(&n) {
        return None;
    }
    Some(KeyStroke::named(name, name, 111 + n, None))
}

/// Held keys followed by the key that is pressed, e.g. `Control+Shift+Tab`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombination {
    pub held: Vec<KeyStroke>,
    pub key: KeyStroke,
}

impl KeyCombination {
    /// Split on `+`; every key but the last is held down while the last is pressed.
    /// A trailing `+` (as in `Control++`) presses the plus key itself.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(Error::Validation("Key combination must not be empty".into()));
        }

        let mut parts: Vec<&str> = spec.split('+').collect();
        if spec.ends_with("++") || spec == "+" {
            parts.retain(|p| !p.is_empty());
            parts.push("+");
        }

        let (last, held) = parts
            .split_last()
            .ok_or_else(|| Error::Validation(format!("Invalid key combination: {}", spec)))?;

        let resolve = |name: &str| {
            KeyStroke::parse(name.trim())
                .ok_or_else(|| Error::Validation(format!("Unknown key '{}' in '{}'", name, spec)))
        };

        Ok(Self {
            held: held.iter().map(|n| resolve(*n)).collect::<Result<Vec<_>>>()?,
            key: resolve(*last)?,
        })
    }

    /// Modifier mask in effect while the main key is pressed.
    pub fn modifiers(&self) -> u8 {
        self.held.iter().fold(0, |mask, k| mask | k.modifier_bit())
    }
}
