use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use marquee_core::Page;

use crate::app::{App, AppState, LoginFocus};
use crate::site::NAV;

use super::styles;

const LOGO: &str = "   ▞▚  M A R Q U E E  ▞▚";

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Navigation
            Constraint::Min(10),   // Page
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_nav(frame, app, chunks[1]);
    render_page(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    // Render overlays
    if matches!(app.state, AppState::ShowingHelp) {
        render_help_overlay(frame);
    }

    if matches!(app.state, AppState::LoggingIn) {
        render_login_overlay(frame, app);
    }

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  Marquee";

    // Identity is read from the session store on every frame
    let right = match app.session() {
        Some(session) => vec![
            Span::styled(
                format!("{} (signed in {}) ", session.display_name, session.age_display()),
                styles::success_style(),
            ),
            Span::styled("[s] Sign out  [?] Help", styles::muted_style()),
        ],
        None => vec![Span::styled("[l] Sign in  [?] Help", styles::muted_style())],
    };
    let right_len: usize = right.iter().map(|s| s.content.chars().count()).sum();

    let mut spans = vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.len() + right_len + 2),
        )),
    ];
    spans.extend(right);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn render_nav(frame: &mut Frame, app: &App, area: Rect) {
    let selected = app.nav_index();
    let authenticated = app.is_authenticated();

    let mut spans = vec![Span::raw(" ")];
    for (i, item) in NAV.items().iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let gated = app
            .router
            .registry()
            .resolve(item.target)
            .map(|d| d.gated)
            .unwrap_or(false);
        let marker = if gated && !authenticated { " *" } else { "" };
        let label = format!("[{}] {}{}", i + 1, item.label, marker);

        if selected == Some(i) {
            spans.push(Span::styled(label, styles::active_tab_style()));
        } else {
            spans.push(Span::styled(label, styles::muted_style()));
        }
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

/// Lines for a page body: headings highlighted, a blank line between sections.
fn page_lines(page: &Page) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    for (i, section) in page.sections.iter().enumerate() {
        if i > 0 {
            lines.push(Line::from(""));
        }
        if let Some(ref heading) = section.heading {
            lines.push(Line::from(Span::styled(
                heading.as_str(),
                styles::highlight_style(),
            )));
        }
        for line in &section.lines {
            lines.push(Line::from(Span::styled(line.as_str(), styles::text_style())));
        }
    }

    if !page.actions.is_empty() {
        lines.push(Line::from(""));
        let mut spans = Vec::new();
        for action in &page.actions {
            spans.push(Span::styled(format!("[{}] ", action.key), styles::key_hint_style()));
            spans.push(Span::styled(format!("{}  ", action.label), styles::text_style()));
        }
        lines.push(Line::from(spans));
    }
    lines
}

fn render_page(frame: &mut Frame, app: &App, area: Rect) {
    let page = &app.page;
    let block = Block::default()
        .title(Span::styled(format!(" {} ", page.title), styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(!matches!(app.state, AppState::LoggingIn)));

    let paragraph = Paragraph::new(page_lines(page))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = "←/→ navigate | [q]uit";

    let left_text = match app.status_message {
        Some(ref msg) => format!(" {} ", msg),
        None => format!(" {} ", app.current_path),
    };
    let right_text = format!(" {} ", shortcuts);

    let width = area.width as usize;
    let padding_len = width
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::key_hint_style()),
        Span::styled(desc, styles::text_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(50, 21, frame.area());

    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_text = vec![
        Line::from(Span::styled(LOGO, styles::title_style())),
        Line::from(Span::styled(
            format!("           version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        help_line("1-5", "Jump to a section"),
        help_line("←/→", "Previous/next section"),
        help_line("↑/↓", "Scroll"),
        help_line("PgUp/PgDn", "Scroll a page"),
        Line::from(""),
        Line::from(Span::styled(" Actions", styles::highlight_style())),
        help_line("l", "Sign in"),
        help_line("s", "Sign out"),
        help_line("r", "Reload a failed section"),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(Span::styled(
            "  * marks sections that need a sign-in",
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::key_hint_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::key_hint_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn field_style(focused: bool) -> Style {
    if focused {
        styles::field_focus_style()
    } else {
        styles::text_style()
    }
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let message = app.login_message();
    let height = if message.is_some() { 12 } else { 10 };
    let area = centered_rect_fixed(50, height, frame.area());

    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled(LOGO, styles::title_style())),
        Line::from(""),
    ];

    let username_focused = app.login_focus == LoginFocus::Username;
    let cursor = if username_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Username: [", styles::muted_style()),
        Span::styled(
            format!("{:<16}{}", app.login_username, cursor),
            field_style(username_focused),
        ),
        Span::styled("]", styles::muted_style()),
    ]));

    let password_focused = app.login_focus == LoginFocus::Password;
    let password_masked: String = "*".repeat(app.login_password.chars().count().min(16));
    let cursor = if password_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Password: [", styles::muted_style()),
        Span::styled(
            format!("{:<16}{}", password_masked, cursor),
            field_style(password_focused),
        ),
        Span::styled("]", styles::muted_style()),
    ]));

    let button_focused = app.login_focus == LoginFocus::Button;
    let button_label = if app.login_pending {
        " Signing in "
    } else if button_focused {
        " ▶ Sign in ◀ "
    } else {
        "   Sign in   "
    };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("             ["),
        Span::styled(button_label, field_style(button_focused)),
        Span::raw("]"),
    ]));

    if let Some(message) = message {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", message),
            styles::error_style(),
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "        Esc returns to the home page",
        styles::muted_style(),
    )));

    let block = Block::default()
        .title(Span::styled(" Sign in ", styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 8, frame.area());

    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(Span::styled(LOGO, styles::title_style())),
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::key_hint_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::key_hint_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_fixed() {
        let outer = Rect::new(0, 0, 100, 40);
        assert_eq!(centered_rect_fixed(50, 10, outer), Rect::new(25, 15, 50, 10));
        // Clamped to a small terminal
        assert_eq!(centered_rect_fixed(50, 10, Rect::new(0, 0, 30, 5)), Rect::new(0, 0, 30, 5));
    }

    #[test]
    fn test_page_lines_layout() {
        let page = Page::new("Blog")
            .section(Some("First"), ["a", "b"])
            .section(None, ["c"])
            .action('r', "Reload");
        let lines = page_lines(&page);
        // heading, a, b, blank, c, blank, actions
        assert_eq!(lines.len(), 7);
    }
}
