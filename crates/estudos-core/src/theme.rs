use std::str::FromStr;

use anyhow::{anyhow, Error, Result};

use crate::store::KeyValueStore;

pub const THEME_KEY: &str = "theme";

/// Used when a configured accent color can't be parsed
pub const DEFAULT_ACCENT: &str = "#007bff";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Saved theme, or light when nothing (or nonsense) is stored
    pub fn load(store: &dyn KeyValueStore) -> Self {
        store
            .get(THEME_KEY)
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<()> {
        store.set(THEME_KEY, self.as_str())
    }
}

impl FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(anyhow!("unknown theme: {other}")),
        }
    }
}

/// Text color that stays readable on a given background
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContrastText {
    Black,
    White,
}

/// Parse `#rrggbb` (the `#` is optional)
pub fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Black text on light backgrounds, white on dark ones.
/// Unparseable colors are judged as the default accent.
pub fn contrast_text(background_hex: &str) -> ContrastText {
    let (r, g, b) = parse_hex_color(background_hex)
        .or_else(|| parse_hex_color(DEFAULT_ACCENT))
        .unwrap_or((0, 123, 255));

    let luminance = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    if luminance > 186.0 {
        ContrastText::Black
    } else {
        ContrastText::White
    }
}
