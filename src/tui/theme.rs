use ratatui::style::{Color, Modifier, Style};

pub struct Theme;

impl Theme {
    // Catppuccin Mocha
    pub const BASE: Color = Color::Rgb(30, 30, 46);
    pub const CRUST: Color = Color::Rgb(17, 17, 27);
    pub const SURFACE0: Color = Color::Rgb(49, 50, 68);
    pub const SURFACE1: Color = Color::Rgb(69, 71, 90);
    pub const OVERLAY1: Color = Color::Rgb(127, 132, 156);
    pub const SUBTEXT0: Color = Color::Rgb(166, 173, 200);
    pub const TEXT: Color = Color::Rgb(205, 214, 244);
    pub const SAPPHIRE: Color = Color::Rgb(116, 199, 236);
    pub const PEACH: Color = Color::Rgb(250, 179, 135);
    pub const MAUVE: Color = Color::Rgb(203, 166, 247);
    pub const PINK: Color = Color::Rgb(245, 194, 231);
    pub const GREEN: Color = Color::Rgb(166, 227, 161);
    pub const RED: Color = Color::Rgb(243, 139, 168);

    pub fn title() -> Style { Style::default().fg(Self::CRUST).bg(Self::MAUVE).add_modifier(Modifier::BOLD) }
    pub fn crumb() -> Style { Style::default().fg(Self::CRUST).bg(Self::MAUVE) }
    pub fn crumb_current() -> Style { Style::default().fg(Self::BASE).bg(Self::MAUVE).add_modifier(Modifier::BOLD) }
    pub fn dir() -> Style { Style::default().fg(Self::SAPPHIRE).add_modifier(Modifier::BOLD) }
    pub fn file() -> Style { Style::default().fg(Self::TEXT) }
    pub fn size() -> Style { Style::default().fg(Self::OVERLAY1) }
    pub fn cursor() -> Style { Style::default().fg(Self::PEACH).bg(Self::SURFACE0).add_modifier(Modifier::BOLD) }
    pub fn selected() -> Style { Style::default().fg(Self::PINK) }
    pub fn status() -> Style { Style::default().fg(Self::SUBTEXT0).bg(Self::SURFACE0) }
    pub fn hint() -> Style { Style::default().fg(Self::OVERLAY1) }
    pub fn muted() -> Style { Style::default().fg(Self::SUBTEXT0) }
    pub fn dialog(accent: Color) -> Style { Style::default().fg(accent).bg(Self::BASE) }
}
