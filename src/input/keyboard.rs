//! Keyboard key definitions and combo parsing.
//!
//! A combo string such as `"ctrl+shift+a"` parses into a [`KeyCombo`]:
//! ordered modifiers, at most one main key and the combined modifier mask.
//!
//! # Example
//!
//! ```ignore
//! use tab_autopilot::input::KeyCombo;
//!
//! let combo = KeyCombo::parse("ctrl+shift+a");
//! assert_eq!(combo.modifier_mask(), 2 | 8);
//! assert_eq!(combo.main_key().map(|k| k.key()), Some("a"));
//! ```
//!
//! # Modifier Bits
//!
//! | Modifier | Aliases | Bit |
//! |----------|---------|-----|
//! | Alt | `alt` | 1 |
//! | Control | `ctrl` | 2 |
//! | Meta | `meta`, `command`, `win` | 4 |
//! | Shift | `shift` | 8 |

// ============================================================================
// Modifier Enum
// ============================================================================

/// Modifier keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    /// Alt / Option
    Alt,
    /// Control
    Ctrl,
    /// Meta / Command / Windows
    Meta,
    /// Shift
    Shift,
}

impl Modifier {
    /// Returns the modifier properties: (key, code, keyCode, bit).
    #[must_use]
    pub fn properties(self) -> (&'static str, &'static str, u32, u8) {
        match self {
            Modifier::Alt => ("Alt", "AltLeft", 18, 1),
            Modifier::Ctrl => ("Control", "ControlLeft", 17, 2),
            Modifier::Meta => ("Meta", "MetaLeft", 91, 4),
            Modifier::Shift => ("Shift", "ShiftLeft", 16, 8),
        }
    }

    /// Returns the protocol modifier bit.
    #[inline]
    #[must_use]
    pub fn bit(self) -> u8 {
        self.properties().3
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "alt" => Some(Modifier::Alt),
            "ctrl" => Some(Modifier::Ctrl),
            "meta" | "command" | "win" => Some(Modifier::Meta),
            "shift" => Some(Modifier::Shift),
            _ => None,
        }
    }
}

// ============================================================================
// Key Enum
// ============================================================================

/// Named non-modifier keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    // ========================================================================
    // Navigation & Control
    // ========================================================================
    /// Enter/Return key
    Enter,
    /// Tab key
    Tab,
    /// Space bar
    Space,
    /// Backspace key
    Backspace,
    /// Delete key
    Delete,
    /// Escape key
    Escape,
    /// Insert key
    Insert,

    // ========================================================================
    // Arrow Keys
    // ========================================================================
    /// Arrow Up
    ArrowUp,
    /// Arrow Down
    ArrowDown,
    /// Arrow Left
    ArrowLeft,
    /// Arrow Right
    ArrowRight,

    // ========================================================================
    // Page Navigation
    // ========================================================================
    /// Home key
    Home,
    /// End key
    End,
    /// Page Up key
    PageUp,
    /// Page Down key
    PageDown,

    // ========================================================================
    // Function Keys
    // ========================================================================
    /// F1 through F12.
    F(u8),

    // ========================================================================
    // Symbols
    // ========================================================================
    /// `;`
    Semicolon,
    /// `=`
    Equal,
    /// `,`
    Comma,
    /// `-`
    Minus,
    /// `.`
    Period,
    /// `/`
    Slash,
    /// `` ` ``
    Backquote,
    /// `[`
    BracketLeft,
    /// `\`
    Backslash,
    /// `]`
    BracketRight,
    /// `'`
    Quote,
}

impl Key {
    /// Returns the key properties: (key, code, keyCode, text).
    #[must_use]
    pub fn properties(self) -> (&'static str, &'static str, u32, Option<&'static str>) {
        match self {
            Key::Enter => ("Enter", "Enter", 13, Some("\r")),
            Key::Tab => ("Tab", "Tab", 9, Some("\t")),
            Key::Space => (" ", "Space", 32, Some(" ")),
            Key::Backspace => ("Backspace", "Backspace", 8, None),
            Key::Delete => ("Delete", "Delete", 46, None),
            Key::Escape => ("Escape", "Escape", 27, None),
            Key::Insert => ("Insert", "Insert", 45, None),
            Key::ArrowUp => ("ArrowUp", "ArrowUp", 38, None),
            Key::ArrowDown => ("ArrowDown", "ArrowDown", 40, None),
            Key::ArrowLeft => ("ArrowLeft", "ArrowLeft", 37, None),
            Key::ArrowRight => ("ArrowRight", "ArrowRight", 39, None),
            Key::Home => ("Home", "Home", 36, None),
            Key::End => ("End", "End", 35, None),
            Key::PageUp => ("PageUp", "PageUp", 33, None),
            Key::PageDown => ("PageDown", "PageDown", 34, None),
            Key::F(n) => {
                const NAMES: [&str; 12] = [
                    "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
                ];
                let index = usize::from(n.clamp(1, 12) - 1);
                (NAMES[index], NAMES[index], 111 + u32::from(n.clamp(1, 12)), None)
            }
            Key::Semicolon => (";", "Semicolon", 186, Some(";")),
            Key::Equal => ("=", "Equal", 187, Some("=")),
            Key::Comma => (",", "Comma", 188, Some(",")),
            Key::Minus => ("-", "Minus", 189, Some("-")),
            Key::Period => (".", "Period", 190, Some(".")),
            Key::Slash => ("/", "Slash", 191, Some("/")),
            Key::Backquote => ("`", "Backquote", 192, Some("`")),
            Key::BracketLeft => ("[", "BracketLeft", 219, Some("[")),
            Key::Backslash => ("\\", "Backslash", 220, Some("\\")),
            Key::BracketRight => ("]", "BracketRight", 221, Some("]")),
            Key::Quote => ("'", "Quote", 222, Some("'")),
        }
    }

    /// Resolves a lowercase token.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let key = match name {
            "enter" | "return" => Key::Enter,
            "tab" => Key::Tab,
            "space" => Key::Space,
            "backspace" => Key::Backspace,
            "delete" | "del" => Key::Delete,
            "escape" | "esc" => Key::Escape,
            "insert" | "ins" => Key::Insert,
            "up" => Key::ArrowUp,
            "down" => Key::ArrowDown,
            "left" => Key::ArrowLeft,
            "right" => Key::ArrowRight,
            "home" => Key::Home,
            "end" => Key::End,
            "pageup" => Key::PageUp,
            "pagedown" => Key::PageDown,
            ";" => Key::Semicolon,
            "=" => Key::Equal,
            "," => Key::Comma,
            "-" => Key::Minus,
            "." => Key::Period,
            "/" => Key::Slash,
            "`" => Key::Backquote,
            "[" => Key::BracketLeft,
            "\\" => Key::Backslash,
            "]" => Key::BracketRight,
            "'" => Key::Quote,
            _ => {
                let n: u8 = name.strip_prefix('f')?.parse().ok()?;
                return (1..=12).contains(&n).then_some(Key::F(n));
            }
        };
        Some(key)
    }
}

// ============================================================================
// KeyDescriptor
// ============================================================================

/// Fully resolved key ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    logical_name: String,
    code: String,
    key: String,
    key_code: u32,
    modifier: Option<Modifier>,
    modifier_mask: u8,
    text: Option<String>,
}

impl KeyDescriptor {
    /// Resolves one lowercase token. Unknown multi-character tokens yield `None`.
    #[must_use]
    pub fn resolve(token: &str) -> Option<Self> {
        if let Some(modifier) = Modifier::from_name(token) {
            let (key, code, key_code, bit) = modifier.properties();
            return Some(Self {
                logical_name: token.to_string(),
                code: code.to_string(),
                key: key.to_string(),
                key_code,
                modifier: Some(modifier),
                modifier_mask: bit,
                text: None,
            });
        }

        if let Some(named) = Key::from_name(token) {
            let (key, code, key_code, text) = named.properties();
            return Some(Self {
                logical_name: token.to_string(),
                code: code.to_string(),
                key: key.to_string(),
                key_code,
                modifier: None,
                modifier_mask: 0,
                text: text.map(str::to_string),
            });
        }

        let mut chars = token.chars();
        let ch = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Some(Self::from_char(ch))
    }

    /// Synthesizes a descriptor for a single character.
    #[must_use]
    pub fn from_char(ch: char) -> Self {
        let upper = ch.to_ascii_uppercase();
        let code = if ch.is_ascii_alphabetic() {
            format!("Key{upper}")
        } else if ch.is_ascii_digit() {
            format!("Digit{ch}")
        } else {
            String::new()
        };

        Self {
            logical_name: ch.to_string(),
            code,
            key: ch.to_string(),
            key_code: u32::from(upper),
            modifier: None,
            modifier_mask: 0,
            text: Some(ch.to_string()),
        }
    }

    /// Token this descriptor was resolved from.
    #[inline]
    #[must_use]
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    /// Physical key code (`KeyA`, `Enter`). Empty if unknown.
    #[inline]
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Logical key value (`a`, `Enter`).
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Windows virtual key code.
    #[inline]
    #[must_use]
    pub fn key_code(&self) -> u32 {
        self.key_code
    }

    /// Returns `true` for modifier keys.
    #[inline]
    #[must_use]
    pub fn is_modifier(&self) -> bool {
        self.modifier.is_some()
    }

    /// Modifier bit for modifiers; cumulative combo mask for other keys.
    #[inline]
    #[must_use]
    pub fn modifier_mask(&self) -> u8 {
        self.modifier_mask
    }

    /// Text produced by the key, if printable.
    #[inline]
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

// ============================================================================
// KeyCombo
// ============================================================================

/// Parsed key combo: ordered modifiers plus at most one main key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyCombo {
    modifiers: Vec<KeyDescriptor>,
    main_key: Option<KeyDescriptor>,
    ignored: Vec<KeyDescriptor>,
    modifier_mask: u8,
}

impl KeyCombo {
    /// Parses a combo such as `"ctrl+c"` or `"Alt-Tab"`.
    ///
    /// Tokens are split on `+` and `-`, trimmed and lowercased. Unknown
    /// multi-character tokens are dropped. Only the first non-modifier key is
    /// kept as the main key; later ones are recorded as ignored.
    #[must_use]
    pub fn parse(combo: &str) -> Self {
        let keys: Vec<KeyDescriptor> = combo
            .split(['+', '-'])
            .filter_map(|part| KeyDescriptor::resolve(&part.trim().to_lowercase()))
            .collect();

        let modifier_mask = keys
            .iter()
            .filter(|k| k.is_modifier())
            .fold(0, |mask, k| mask | k.modifier_mask);

        let mut parsed = Self {
            modifier_mask,
            ..Self::default()
        };
        for mut key in keys {
            if key.is_modifier() {
                parsed.modifiers.push(key);
                continue;
            }
            key.modifier_mask = modifier_mask;
            if parsed.main_key.is_none() {
                parsed.main_key = Some(key);
            } else {
                parsed.ignored.push(key);
            }
        }
        parsed
    }

    /// Modifiers in combo order.
    #[inline]
    #[must_use]
    pub fn modifiers(&self) -> &[KeyDescriptor] {
        &self.modifiers
    }

    /// Main key, if any.
    #[inline]
    #[must_use]
    pub fn main_key(&self) -> Option<&KeyDescriptor> {
        self.main_key.as_ref()
    }

    /// Extra non-modifier keys that are not dispatched.
    #[inline]
    #[must_use]
    pub fn ignored(&self) -> &[KeyDescriptor] {
        &self.ignored
    }

    /// OR of all modifier bits.
    #[inline]
    #[must_use]
    pub fn modifier_mask(&self) -> u8 {
        self.modifier_mask
    }

    /// Returns `true` if nothing resolved.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty() && self.main_key.is_none()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_ctrl_shift_a() {
        let combo = KeyCombo::parse("ctrl+shift+a");

        let names: Vec<_> = combo.modifiers().iter().map(KeyDescriptor::key).collect();
        assert_eq!(names, ["Control", "Shift"]);
        assert_eq!(combo.modifier_mask(), 2 | 8);

        let main = combo.main_key().expect("main key");
        assert_eq!(main.key(), "a");
        assert_eq!(main.code(), "KeyA");
        assert_eq!(main.key_code(), 65);
        assert_eq!(main.modifier_mask(), 10);
    }

    #[test]
    fn test_case_and_separator_insensitive() {
        let combo = KeyCombo::parse(" Alt - TAB ");
        assert_eq!(combo.modifier_mask(), 1);
        let main = combo.main_key().expect("main key");
        assert_eq!(main.key(), "Tab");
        assert_eq!(main.key_code(), 9);
        assert_eq!(main.text(), Some("\t"));
    }

    #[test]
    fn test_meta_aliases() {
        for alias in ["meta", "command", "win"] {
            let combo = KeyCombo::parse(&format!("{alias}+c"));
            assert_eq!(combo.modifier_mask(), 4);
            assert_eq!(combo.modifiers()[0].key(), "Meta");
            assert_eq!(combo.modifiers()[0].key_code(), 91);
        }
    }

    #[test]
    fn test_named_keys() {
        let enter = KeyDescriptor::resolve("return").expect("enter");
        assert_eq!((enter.key(), enter.key_code(), enter.text()), ("Enter", 13, Some("\r")));

        let space = KeyDescriptor::resolve("space").expect("space");
        assert_eq!((space.key(), space.code()), (" ", "Space"));

        let f12 = KeyDescriptor::resolve("f12").expect("f12");
        assert_eq!((f12.key(), f12.key_code()), ("F12", 123));

        let f1 = KeyDescriptor::resolve("f1").expect("f1");
        assert_eq!(f1.key_code(), 112);

        let quote = KeyDescriptor::resolve("'").expect("quote");
        assert_eq!((quote.code(), quote.key_code()), ("Quote", 222));

        assert!(KeyDescriptor::resolve("f13").is_none());
        assert!(KeyDescriptor::resolve("pageup").is_some());
    }

    #[test]
    fn test_digits_and_symbols() {
        let one = KeyDescriptor::resolve("1").expect("digit");
        assert_eq!((one.code(), one.key_code(), one.text()), ("Digit1", 49, Some("1")));

        let bang = KeyDescriptor::resolve("!").expect("symbol");
        assert_eq!(bang.code(), "");
        assert_eq!(bang.key_code(), 33);
    }

    #[test]
    fn test_unknown_tokens_are_dropped() {
        let combo = KeyCombo::parse("ctrl+banana");
        assert!(combo.main_key().is_none());
        assert_eq!(combo.modifiers().len(), 1);
        assert!(KeyCombo::parse("hyper+mega").is_empty());
    }

    #[test]
    fn test_only_first_main_key_is_kept() {
        let combo = KeyCombo::parse("ctrl+a+b");
        assert_eq!(combo.main_key().map(KeyDescriptor::key), Some("a"));
        assert_eq!(combo.ignored().len(), 1);
        assert_eq!(combo.ignored()[0].key(), "b");
    }

    #[test]
    fn test_modifier_only_combo() {
        let combo = KeyCombo::parse("shift");
        assert!(combo.main_key().is_none());
        assert_eq!(combo.modifier_mask(), 8);
        assert!(!combo.is_empty());
    }

    proptest! {
        #[test]
        fn modifier_order_does_not_change_mask(perm in Just(vec!["ctrl", "alt", "shift", "meta"]).prop_shuffle(), take in 1usize..=4) {
            let chosen = &perm[..take];
            let forward = KeyCombo::parse(&format!("{}+x", chosen.join("+")));
            let mut reversed = chosen.to_vec();
            reversed.reverse();
            let backward = KeyCombo::parse(&format!("{}+x", reversed.join("+")));

            prop_assert_eq!(forward.modifier_mask(), backward.modifier_mask());
            prop_assert_eq!(forward.main_key().map(KeyDescriptor::modifier_mask), Some(forward.modifier_mask()));
        }

        #[test]
        fn at_most_one_main_key(tokens in proptest::collection::vec("[a-z]|ctrl|shift|enter|f[0-9]", 0..6)) {
            let combo = KeyCombo::parse(&tokens.join("+"));
            let non_modifiers = tokens
                .iter()
                .filter_map(|t| KeyDescriptor::resolve(t))
                .filter(|k| !k.is_modifier())
                .count();
            prop_assert_eq!(combo.main_key().is_some(), non_modifiers > 0);
            prop_assert_eq!(combo.ignored().len(), non_modifiers.saturating_sub(1));
        }
    }
}
