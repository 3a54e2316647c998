//! Rendering routines for the dvkcli TUI.

use crate::app::App;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
};

const HEADER_HEIGHT: u16 = 3;
const SLASH_PALETTE_HEIGHT: u16 = 11;
const VERSION: &str = env!("CARGO_PKG_VERSION");
const LOGO: &str = "✦ DVKCLI";

/// Commands listed in the palette, with descriptions.
const PALETTE: [(&str, &str); 7] = [
    ("/help", "Show commands and shortcuts"),
    ("/models", "List installed models"),
    ("/model <name>", "Switch the chat model"),
    ("/search <query>", "Search past conversations"),
    ("/history", "List recent conversations"),
    ("/clear", "Start a new conversation"),
    ("/export", "Export to markdown"),
];

/// Draw the entire TUI frame.
pub fn draw(frame: &mut Frame<'_>, app: &mut App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_header(frame, app, root[0]);
    draw_chat(frame, app, root[1]);
    if app.show_slash_commands {
        draw_slash_palette(frame, app, root[1]);
    }
    draw_input(frame, app, root[2]);
    draw_status_bar(frame, app, root[3]);
}

/// Logo on the left; model, connection, and memory count on the right.
fn draw_header(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let theme = app.theme;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let left = Line::from(vec![
        Span::styled(
            format!(" {LOGO}"),
            Style::default()
                .fg(theme.primary)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  v{VERSION}"), Style::default().fg(theme.muted)),
    ]);

    let (glyph, glyph_color) = if app.connected {
        ("●", theme.success)
    } else {
        ("○", theme.error)
    };
    let mut right = vec![
        Span::styled(glyph, Style::default().fg(glyph_color)),
        Span::styled(format!(" {}", app.model), Style::default().fg(theme.muted)),
    ];
    if app.memory_enabled {
        right.push(Span::styled(" │ ", Style::default().fg(theme.border)));
        right.push(Span::styled(
            format!("{} memories ", app.memory_count),
            Style::default().fg(theme.secondary),
        ));
    }
    let right = Line::from(right);
    let right_width = (right.width() as u16).min(inner.width);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(right_width)])
        .split(inner);
    frame.render_widget(Paragraph::new(left), cols[0]);
    frame.render_widget(Paragraph::new(right), cols[1]);
}

/// Draw the transcript with border and scrollbar.
fn draw_chat(frame: &mut Frame<'_>, app: &mut App, area: Rect) {
    let theme = app.theme;
    let lines = app.render_lines();

    let title = if app.is_streaming() { " Chat · generating " } else { " Chat " };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border))
        .title(Span::styled(title, Style::default().fg(theme.muted)));

    let inner = block.inner(area);
    let content_width = inner.width.saturating_sub(1);
    let content_height = inner.height as usize;

    let total_lines = Paragraph::new(lines.clone())
        .wrap(Wrap { trim: false })
        .line_count(content_width)
        .max(1);

    let max_scroll = total_lines.saturating_sub(content_height) as u16;
    app.update_scroll_bounds(max_scroll);
    let scroll = app.scroll;

    let chat_inner = Rect {
        width: content_width,
        ..inner
    };
    let chat = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));

    frame.render_widget(block, area);
    frame.render_widget(chat, chat_inner);

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::default()
            .content_length(total_lines)
            .position(scroll as usize)
            .viewport_content_length(content_height);
        let scrollbar_area = Rect {
            x: inner.x + inner.width.saturating_sub(1),
            y: inner.y,
            width: 1,
            height: inner.height,
        };
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .style(Style::default().fg(theme.border))
                .thumb_style(Style::default().fg(theme.muted)),
            scrollbar_area,
            &mut scrollbar_state,
        );
    }
}

fn draw_input(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let theme = app.theme;
    let is_active = !app.is_streaming();
    let border_color = if is_active { theme.primary } else { theme.border };
    let title = if is_active {
        " Message "
    } else {
        " Waiting for reply (Esc to stop) "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border_color))
        .title(Span::styled(title, Style::default().fg(theme.secondary)));
    let inner = block.inner(area);

    let prompt_style = Style::default()
        .fg(theme.secondary)
        .add_modifier(Modifier::BOLD);
    let input_text = if app.input.is_empty() {
        Line::from(vec![
            Span::styled("› ", prompt_style),
            Span::styled("Type your message...", Style::default().fg(theme.muted)),
        ])
    } else {
        Line::from(vec![
            Span::styled("› ", prompt_style),
            Span::styled(app.input.as_str(), Style::default().fg(theme.text)),
        ])
    };

    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(input_text), inner);

    if is_active {
        let typed = app.input.chars().count() as u16;
        let x = (inner.x + 2 + typed).min(inner.x + inner.width.saturating_sub(1));
        frame.set_cursor_position((x, inner.y));
    }
}

fn draw_status_bar(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let theme = app.theme;
    let key = Style::default().fg(theme.muted).add_modifier(Modifier::BOLD);
    let label = Style::default().fg(theme.border);
    let shortcuts = vec![
        Span::styled(" Enter", key),
        Span::styled(" send", label),
        Span::styled("  /help", key),
        Span::styled(" cmds", label),
        Span::styled("  Ctrl+N", key),
        Span::styled(" new", label),
        Span::styled("  Ctrl+L", key),
        Span::styled(" last", label),
        Span::styled("  Ctrl+E", key),
        Span::styled(" export", label),
        Span::styled("  Ctrl+C", key),
        Span::styled(" quit", label),
    ];

    let connection = if app.connected { "connected" } else { "disconnected" };
    let right_text = format!(" {} · {connection} ", app.status);
    let right_len = (right_text.chars().count() as u16).min(area.width);
    let left_area = Rect {
        width: area.width.saturating_sub(right_len),
        ..area
    };
    let right_area = Rect {
        x: area.x + area.width.saturating_sub(right_len),
        width: right_len,
        ..area
    };
    let status_color = if app.connected { theme.success } else { theme.error };

    frame.render_widget(
        Paragraph::new(Line::from(shortcuts)).style(Style::default().bg(theme.surface)),
        left_area,
    );
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            right_text,
            Style::default().fg(status_color),
        )))
        .style(Style::default().bg(theme.surface)),
        right_area,
    );
}

fn draw_slash_palette(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let theme = app.theme;
    let cmd_style = Style::default()
        .fg(theme.secondary)
        .add_modifier(Modifier::BOLD);
    let desc_style = Style::default().fg(theme.muted);

    let typed = app.input.trim_start().to_lowercase();
    let typed_command = typed.split_whitespace().next().unwrap_or("/");
    let mut lines: Vec<Line<'_>> = PALETTE
        .iter()
        .filter(|(command, _)| command.starts_with(typed_command))
        .map(|(command, description)| {
            Line::from(vec![
                Span::styled(format!("  {command:<18}"), cmd_style),
                Span::styled(*description, desc_style),
            ])
        })
        .collect();
    if lines.is_empty() {
        lines.push(Line::from(Span::styled("  no matching command", desc_style)));
    }

    let height = SLASH_PALETTE_HEIGHT
        .min(area.height)
        .min(lines.len() as u16 + 2);
    let palette_area = Rect {
        x: area.x + 1,
        y: area.y + area.height.saturating_sub(height),
        width: area.width.saturating_sub(2).min(56),
        height,
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.primary))
        .title(Span::styled(
            " Commands ",
            Style::default()
                .fg(theme.primary)
                .add_modifier(Modifier::BOLD),
        ))
        .style(Style::default().bg(theme.surface));

    frame.render_widget(ratatui::widgets::Clear, palette_area);
    frame.render_widget(Paragraph::new(lines).block(block), palette_area);
}
