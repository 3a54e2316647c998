//! Colour palettes selectable through the `theme` config key.

use log::warn;
use ratatui::style::Color;

/// Colours used by the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Theme {
    pub name: &'static str,
    pub primary: Color,
    pub secondary: Color,
    pub accent: Color,
    pub text: Color,
    pub muted: Color,
    pub border: Color,
    pub success: Color,
    pub error: Color,
    pub surface: Color,
}

/// Wine red and gold.
pub const WINE: Theme = Theme {
    name: "wine",
    primary: Color::Rgb(139, 0, 0),
    secondary: Color::Rgb(255, 215, 0),
    accent: Color::Rgb(220, 20, 60),
    text: Color::Rgb(245, 230, 211),
    muted: Color::Rgb(139, 115, 85),
    border: Color::Rgb(92, 64, 51),
    success: Color::Rgb(34, 139, 34),
    error: Color::Rgb(220, 20, 60),
    surface: Color::Rgb(26, 10, 10),
};

/// Orange on charcoal.
pub const EMBER: Theme = Theme {
    name: "ember",
    primary: Color::Rgb(236, 91, 43),
    secondary: Color::Rgb(238, 121, 72),
    accent: Color::Rgb(229, 192, 123),
    text: Color::Rgb(238, 238, 238),
    muted: Color::Rgb(128, 128, 128),
    border: Color::Rgb(60, 60, 60),
    success: Color::Rgb(120, 220, 140),
    error: Color::Rgb(255, 110, 110),
    surface: Color::Rgb(20, 20, 20),
};

const THEMES: [Theme; 2] = [WINE, EMBER];

impl Theme {
    /// Look up a theme by name, falling back to [`WINE`].
    pub fn named(name: &str) -> Theme {
        let wanted = name.trim().to_ascii_lowercase();
        match THEMES.iter().find(|theme| theme.name == wanted) {
            Some(theme) => *theme,
            None => {
                warn!("unknown theme; using default (theme={})", name);
                WINE
            }
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        WINE
    }
}

#[cfg(test)]
mod tests {
    use super::{EMBER, Theme, WINE};
    use pretty_assertions::assert_eq;

    #[test]
    fn lookup_is_case_insensitive_with_fallback() {
        assert_eq!(Theme::named("wine"), WINE);
        assert_eq!(Theme::named(" Ember "), EMBER);
        assert_eq!(Theme::named("cyberpunk"), WINE);
    }
}
