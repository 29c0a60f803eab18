use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use crate::app::{App, InputMode};
use estudos_core::theme::{contrast_text, ContrastText};
use estudos_core::{Role, Theme};

/// Colors that differ between the light and dark themes
struct Palette {
    text: Color,
    muted: Color,
    user: Color,
    assistant: Color,
    error: Color,
    border: Color,
    focus: Color,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Light => Palette {
            text: Color::Black,
            muted: Color::DarkGray,
            user: Color::Blue,
            assistant: Color::Magenta,
            error: Color::Red,
            border: Color::Gray,
            focus: Color::Blue,
        },
        Theme::Dark => Palette {
            text: Color::White,
            muted: Color::Gray,
            user: Color::Cyan,
            assistant: Color::Yellow,
            error: Color::LightRed,
            border: Color::DarkGray,
            focus: Color::Cyan,
        },
    }
}

/// Inline Markdown for a single line: **bold**, *italic*, `code`.
/// Unclosed markers are kept as literal text.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        let (marker, style) = match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                ("**", Style::default().add_modifier(Modifier::BOLD))
            }
            '*' => ("*", Style::default().add_modifier(Modifier::ITALIC)),
            '`' => ("`", Style::default().fg(Color::Green)),
            _ => {
                current_text.push(c);
                continue;
            }
        };

        // Find the closing marker
        let mut inner = String::new();
        let mut found_close = false;
        while let Some(c) = chars.next() {
            if marker == "**" && c == '*' && chars.peek() == Some(&'*') {
                chars.next();
                found_close = true;
                break;
            }
            if marker != "**" && marker.starts_with(c) {
                found_close = true;
                break;
            }
            inner.push(c);
        }

        if found_close && !inner.is_empty() {
            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }
            spans.push(Span::styled(inner, style));
        } else {
            current_text.push_str(marker);
            current_text.push_str(&inner);
            if found_close {
                current_text.push_str(marker);
            }
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Markdown list bullets read better as real bullets in a terminal
fn display_line(line: &str) -> String {
    let trimmed = line.trim_start();
    let indent = line.len() - trimmed.len();
    match trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
        Some(rest) => format!("{}• {}", " ".repeat(indent), rest),
        None => line.to_string(),
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat_screen(app, frame, body_area);
    render_footer(app, frame, footer_area);

    if app.show_context_picker {
        render_context_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let (r, g, b) = app.accent;
    let background = Color::Rgb(r, g, b);
    let foreground = match contrast_text(&format!("#{r:02x}{g:02x}{b:02x}")) {
        ContrastText::Black => Color::Black,
        ContrastText::White => Color::White,
    };

    let title = Line::from(vec![
        Span::styled(" Estudos ", Style::default().fg(foreground).bold()),
        Span::styled(format!("[{}]", app.context_label()), Style::default().fg(foreground)),
        Span::raw(" "),
        Span::styled(
            format!("{} · v{}", app.theme.as_str(), env!("CARGO_PKG_VERSION")),
            Style::default().fg(foreground).add_modifier(Modifier::DIM),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(background));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " CHAT ",
        InputMode::Editing => " EDIT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];

    if let Some(status) = &app.status {
        spans.push(Span::styled(format!(" {status} "), Style::default().fg(Color::Red)));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
        return;
    }

    let hints: Vec<(&str, &str)> = if app.show_context_picker {
        vec![(" j/k ", " nav "), (" Enter ", " select "), (" Esc ", " cancel ")]
    } else {
        match app.input_mode {
            InputMode::Editing => vec![(" Enter ", " send "), (" Esc ", " stop editing ")],
            InputMode::Normal => vec![
                (" i ", " ask "),
                (" c ", " context "),
                (" t ", " theme "),
                (" j/k ", " scroll "),
                (" q ", " quit "),
            ],
        }
    };

    for (key, label) in hints {
        spans.push(Span::styled(key, key_style));
        spans.push(Span::styled(label, label_style));
        spans.push(Span::raw(" "));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let colors = palette(app.theme);

    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.input_mode == InputMode::Normal {
            colors.focus
        } else {
            colors.border
        }))
        .title(format!(" Assistant: {} ", app.context_label()));

    let transcript = app.session.transcript();
    let chat_text = if transcript.is_empty() {
        Text::from(Span::styled(
            "Ask a question about your notes...",
            Style::default().fg(colors.muted),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();
        let role_style = |color: Color| Style::default().fg(color).add_modifier(Modifier::BOLD);

        for msg in transcript.messages() {
            match msg.role {
                Role::User => {
                    lines.push(Line::from(Span::styled("You:", role_style(colors.user))));
                    for line in msg.text.lines() {
                        let style = Style::default().fg(colors.text);
                        lines.push(Line::from(Span::styled(line.to_string(), style)));
                    }
                }
                Role::Assistant => {
                    lines.push(Line::from(Span::styled("AI:", role_style(colors.assistant))));
                    // Plain fallbacks carry no rendering; show them verbatim
                    if msg.rendered_html.is_some() {
                        for line in msg.text.lines() {
                            lines.push(parse_markdown_line(&display_line(line)));
                        }
                    } else {
                        lines.push(Line::from(msg.text.clone()));
                    }
                }
                Role::Pending => {
                    lines.push(Line::from(Span::styled("AI:", role_style(colors.assistant))));
                    // Animated ellipsis: cycles through ".", "..", "..."
                    let dots = ".".repeat((app.animation_frame as usize) + 1);
                    lines.push(Line::from(Span::styled(
                        format!("Thinking{}", dots),
                        Style::default().fg(colors.muted).add_modifier(Modifier::ITALIC),
                    )));
                }
                Role::Error => {
                    lines.push(Line::from(Span::styled("AI:", role_style(colors.error))));
                    let style = Style::default().fg(colors.error);
                    lines.push(Line::from(Span::styled(msg.text.clone(), style)));
                }
            }
            lines.push(Line::default());
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    render_input(app, frame, input_area, &colors);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect, colors: &Palette) {
    let enabled = app.session.is_input_enabled();
    let editing = app.input_mode == InputMode::Editing;

    let (title, border_color) = if !app.session.contexts_loaded() {
        (" Loading contexts... ", colors.muted)
    } else if !enabled {
        (" Waiting for answer... ", colors.muted)
    } else if editing {
        (" Ask (Enter to send) ", Color::Yellow)
    } else {
        (" Ask (i to type) ", colors.border)
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let text_color = if enabled { colors.user } else { colors.muted };
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(text_color))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if editing && enabled {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_context_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let contexts = app.session.contexts();

    // Calculate popup size and position (centered)
    let popup_width = 44.min(area.width.saturating_sub(4));
    let popup_height = (contexts.len() as u16 + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Ask about (Enter to select, Esc to cancel) ");

    let selected = app.session.selected_context();
    let items: Vec<ListItem> = contexts
        .iter()
        .map(|option| {
            let style = if option.id == selected {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", option.display_name)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.context_picker_state);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(line: &Line) -> Vec<String> {
        line.spans.iter().map(|s| s.content.to_string()).collect()
    }

    #[test]
    fn test_bold_and_plain() {
        let line = parse_markdown_line("a **b** c");
        assert_eq!(contents(&line), vec!["a ", "b", " c"]);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_italic_and_code() {
        let line = parse_markdown_line("*x* and `y`");
        assert_eq!(contents(&line), vec!["x", " and ", "y"]);
        assert!(line.spans[0].style.add_modifier.contains(Modifier::ITALIC));
        assert_eq!(line.spans[2].style.fg, Some(Color::Green));
    }

    #[test]
    fn test_unclosed_marker_is_literal() {
        let line = parse_markdown_line("2 * 3 = 6");
        assert_eq!(contents(&line).concat(), "2 * 3 = 6");

        let line = parse_markdown_line("**open");
        assert_eq!(contents(&line).concat(), "**open");
    }

    #[test]
    fn test_empty_line() {
        assert!(parse_markdown_line("").spans.is_empty());
    }

    #[test]
    fn test_display_line_bullets() {
        assert_eq!(display_line("- item"), "• item");
        assert_eq!(display_line("  * nested"), "  • nested");
        assert_eq!(display_line("plain"), "plain");
    }
}
