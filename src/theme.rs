use anyhow::Result;
use ratatui::style::Color;
use tracing::warn;

use crate::storage::LocalStorage;

pub const THEME_KEY: &str = "themeColor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

/// Colors the chat pane draws with
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub outgoing: Color,
    pub incoming: Color,
    pub accent: Color,
    pub code: Color,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light_mode",
            Theme::Dark => "dark_mode",
        }
    }

    /// Anything other than `light_mode` is dark
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("light_mode") => Theme::Light,
            _ => Theme::Dark,
        }
    }

    pub fn load(storage: &LocalStorage) -> Self {
        match storage.get(THEME_KEY) {
            Ok(value) => Self::from_stored(value.as_deref()),
            Err(e) => {
                warn!("theme preference unreadable: {}", e);
                Theme::default()
            }
        }
    }

    pub fn save(&self, storage: &LocalStorage) -> Result<()> {
        storage.set(THEME_KEY, self.as_str())
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Icon hint for the toggle: a moon in light mode, a sun in dark mode
    pub fn toggle_icon(&self) -> &'static str {
        match self {
            Theme::Light => "☾",
            Theme::Dark => "☀",
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            Theme::Light => Palette {
                background: Color::White,
                text: Color::Black,
                muted: Color::Gray,
                outgoing: Color::Blue,
                incoming: Color::Magenta,
                accent: Color::Blue,
                code: Color::DarkGray,
            },
            Theme::Dark => Palette {
                background: Color::Reset,
                text: Color::White,
                muted: Color::DarkGray,
                outgoing: Color::Cyan,
                incoming: Color::Yellow,
                accent: Color::Cyan,
                code: Color::Gray,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_dark() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::open(dir.path()).unwrap();
        assert_eq!(Theme::load(&storage), Theme::Dark);
    }

    #[test]
    fn test_toggle_persists() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::open(dir.path()).unwrap();

        let theme = Theme::load(&storage).toggled();
        theme.save(&storage).unwrap();
        assert_eq!(storage.get(THEME_KEY).unwrap().as_deref(), Some("light_mode"));
        assert_eq!(Theme::load(&storage), Theme::Light);

        theme.toggled().save(&storage).unwrap();
        assert_eq!(storage.get(THEME_KEY).unwrap().as_deref(), Some("dark_mode"));
    }

    #[test]
    fn test_unknown_value_is_dark() {
        assert_eq!(Theme::from_stored(Some("sepia")), Theme::Dark);
        assert_eq!(Theme::from_stored(None), Theme::Dark);
        assert_eq!(Theme::from_stored(Some("light_mode")), Theme::Light);
    }
}
