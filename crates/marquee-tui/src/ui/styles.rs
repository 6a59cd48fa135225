//! Theatre-marquee palette: warm bulb amber on a dark stage, with the
//! curtain red reserved for errors.

use ratatui::style::{Color, Modifier, Style};

/// Lit marquee bulbs: titles, the active tab, focused borders
const BULB: Color = Color::Rgb(255, 191, 71);
/// Ticket-booth green for the signed-in identity
const BOOTH: Color = Color::Rgb(120, 200, 150);
/// Neon cyan for headings and key hints
const NEON: Color = Color::Rgb(90, 210, 230);
const CURTAIN: Color = Color::Rgb(210, 50, 70);
/// Unlit bulbs
const DIM: Color = Color::Rgb(115, 110, 120);
const PAPER: Color = Color::Rgb(235, 230, 220);
const STAGE: Color = Color::Rgb(28, 22, 30);
const SPOTLIGHT: Color = Color::Rgb(70, 52, 30);

pub fn title_style() -> Style {
    Style::default().fg(BULB).add_modifier(Modifier::BOLD)
}

pub fn text_style() -> Style {
    Style::default().fg(PAPER)
}

pub fn muted_style() -> Style {
    Style::default().fg(DIM)
}

pub fn highlight_style() -> Style {
    Style::default().fg(NEON).add_modifier(Modifier::BOLD)
}

pub fn success_style() -> Style {
    Style::default().fg(BOOTH)
}

pub fn error_style() -> Style {
    Style::default().fg(CURTAIN).add_modifier(Modifier::BOLD)
}

/// Focused form field or button on the login card.
pub fn field_focus_style() -> Style {
    Style::default().fg(BULB).bg(SPOTLIGHT).add_modifier(Modifier::BOLD)
}

pub fn active_tab_style() -> Style {
    Style::default()
        .fg(STAGE)
        .bg(BULB)
        .add_modifier(Modifier::BOLD)
}

/// Border of a block; unlit while an overlay has focus.
pub fn border_style(lit: bool) -> Style {
    Style::default().fg(if lit { BULB } else { DIM })
}

pub fn status_bar_style() -> Style {
    Style::default().bg(STAGE).fg(PAPER)
}

pub fn key_hint_style() -> Style {
    Style::default().fg(NEON)
}
