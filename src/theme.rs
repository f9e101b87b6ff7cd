use ratatui::style::{Color, Modifier, Style};

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Base16Palette {
    pub base_00: Color, // Background
    pub base_01: Color, // Lighter background
    pub base_02: Color, // Selection background
    pub base_03: Color, // Comments, invisibles
    pub base_04: Color, // Dark foreground
    pub base_05: Color, // Default foreground
    pub base_06: Color, // Light foreground
    pub base_07: Color, // Light background
    pub base_08: Color, // Red
    pub base_09: Color, // Orange
    pub base_0a: Color, // Yellow
    pub base_0b: Color, // Green
    pub base_0c: Color, // Cyan
    pub base_0d: Color, // Blue
    pub base_0e: Color, // Purple
    pub base_0f: Color, // Brown
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ThemeId {
    #[default]
    OceanicNext,
    CatppuccinMocha,
}

impl ThemeId {
    pub fn name(&self) -> &'static str {
        match self {
            ThemeId::OceanicNext => "Oceanic Next",
            ThemeId::CatppuccinMocha => "Catppuccin Mocha",
        }
    }

    pub fn all() -> &'static [ThemeId] {
        &[ThemeId::OceanicNext, ThemeId::CatppuccinMocha]
    }

    /// Case-insensitive lookup by display name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|theme| theme.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn palette(&self) -> &'static Base16Palette {
        match self {
            ThemeId::OceanicNext => &OCEANIC_NEXT,
            ThemeId::CatppuccinMocha => &CATPPUCCIN_MOCHA,
        }
    }
}

pub static OCEANIC_NEXT: Base16Palette = Base16Palette {
    base_00: rgb(0x1B2B34),
    base_01: rgb(0x343D46),
    base_02: rgb(0x4F5B66),
    base_03: rgb(0x65737E),
    base_04: rgb(0xA7ADBA),
    base_05: rgb(0xC0C5CE),
    base_06: rgb(0xCDD3DE),
    base_07: rgb(0xF0F4F8),
    base_08: rgb(0xEC5F67),
    base_09: rgb(0xF99157),
    base_0a: rgb(0xFAC863),
    base_0b: rgb(0x99C794),
    base_0c: rgb(0x5FB3B3),
    base_0d: rgb(0x6699CC),
    base_0e: rgb(0xC594C5),
    base_0f: rgb(0xAB7967),
};

// Mapped from: base=#1E1E2E, surface0=#313244, surface1=#45475A, overlay0=#6C7086
// overlay1=#7F849C, subtext0=#A6ADC8, text=#CDD6F4, rosewater=#F5E0DC
pub static CATPPUCCIN_MOCHA: Base16Palette = Base16Palette {
    base_00: rgb(0x1E1E2E),
    base_01: rgb(0x313244),
    base_02: rgb(0x45475A),
    base_03: rgb(0x6C7086),
    base_04: rgb(0x7F849C),
    base_05: rgb(0xA6ADC8),
    base_06: rgb(0xCDD6F4),
    base_07: rgb(0xF5E0DC),
    base_08: rgb(0xF38BA8),
    base_09: rgb(0xFAB387),
    base_0a: rgb(0xF9E2AF),
    base_0b: rgb(0xA6E3A1),
    base_0c: rgb(0x94E2D5),
    base_0d: rgb(0x89B4FA),
    base_0e: rgb(0xCBA6F7),
    base_0f: rgb(0xEBA0AC),
};

impl Base16Palette {
    /// Style of a pager button, dimmed when it cannot be pressed
    pub fn button_style(&self, enabled: bool) -> Style {
        if enabled {
            Style::default()
                .fg(self.base_00)
                .bg(self.base_0d)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
                .fg(self.base_03)
                .bg(self.base_01)
                .add_modifier(Modifier::DIM)
        }
    }

    pub fn status_style(&self, is_error: bool) -> Style {
        if is_error {
            Style::default()
                .fg(self.base_07)
                .bg(self.base_08)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.base_05)
        }
    }

    pub fn overlay_style(&self) -> Style {
        Style::default().fg(self.base_06).bg(self.base_02)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_themes_by_name() {
        assert_eq!(
            ThemeId::from_name("catppuccin mocha"),
            Some(ThemeId::CatppuccinMocha)
        );
        assert_eq!(ThemeId::from_name("Solarized"), None);
        assert_eq!(ThemeId::default().palette(), &OCEANIC_NEXT);
    }

    #[test]
    fn rgb_splits_channels() {
        assert_eq!(rgb(0x1B2B34), Color::Rgb(0x1B, 0x2B, 0x34));
    }
}
