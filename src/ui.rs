use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use crate::app::{App, InputMode, NotificationKind};
use crate::controller::SUGGESTIONS;
use crate::theme::Palette;
use crate::transcript::{segments, Bubble, BubbleKind, Segment};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str, base: Style) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::styled(std::mem::take(&mut current_text), base));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(bold_text, base.add_modifier(Modifier::BOLD)));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::styled(current_text, base));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Message body lines; fenced code gets a language label and code styling
fn body_lines(text: &str, palette: &Palette) -> Vec<Line<'static>> {
    let base = Style::default().fg(palette.text);
    let code_style = Style::default().fg(palette.code);
    let mut lines = Vec::new();

    for segment in segments(text) {
        match segment {
            Segment::Prose(prose) => {
                lines.extend(prose.lines().map(|line| parse_markdown_line(line, base)));
            }
            Segment::Code(block) => {
                lines.push(Line::from(Span::styled(
                    format!("┌ {} · y to copy", block.language),
                    Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
                )));
                lines.extend(block.code.lines().map(|line| {
                    Line::from(vec![
                        Span::styled("│ ", Style::default().fg(palette.muted)),
                        Span::styled(line.to_string(), code_style),
                    ])
                }));
            }
        }
    }

    lines
}

fn bubble_lines(bubble: &Bubble, selected: bool, animation_frame: u8, palette: &Palette) -> Vec<Line<'static>> {
    let (name, color) = match bubble.kind {
        BubbleKind::Outgoing => ("You", palette.outgoing),
        BubbleKind::Incoming => ("Gemini", palette.incoming),
    };

    let mut name_style = Style::default().fg(color).add_modifier(Modifier::BOLD);
    if selected {
        name_style = name_style.add_modifier(Modifier::REVERSED);
    }

    let mut header = vec![
        Span::styled(if selected { "▌" } else { " " }, Style::default().fg(palette.accent)),
        Span::styled(format!("{}:", name), name_style),
    ];
    if let Some(ts) = &bubble.timestamp {
        header.push(Span::styled(format!(" {}", ts), Style::default().fg(palette.muted)));
    }

    let mut lines = vec![Line::from(header)];
    if bubble.loading {
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            dots,
            Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
        )));
    } else {
        lines.extend(body_lines(&bubble.text, palette));
    }
    lines.push(Line::default());
    lines
}

/// All chat lines plus the first line index of every bubble
fn chat_lines(app: &App, palette: &Palette) -> (Vec<Line<'static>>, Vec<usize>) {
    let mut lines = Vec::new();
    let mut starts = Vec::with_capacity(app.transcript.len());

    for (i, bubble) in app.transcript.bubbles().iter().enumerate() {
        starts.push(lines.len());
        lines.extend(bubble_lines(bubble, app.selected == Some(i), app.animation_frame, palette));
    }

    (lines, starts)
}

/// Rows a line takes once wrapped to `width`
fn wrapped_height(line: &Line, width: usize) -> usize {
    let w = line.width();
    if w == 0 || width == 0 {
        1
    } else {
        (w - 1) / width + 1
    }
}

/// Lines covering `height` rows from `scroll`, plus the row offset into the
/// first of them. Paragraph scroll offsets are u16, so whole lines above the
/// viewport are dropped instead of scrolled past.
fn visible_window(
    lines: Vec<Line<'static>>,
    rows: &[usize],
    scroll: usize,
    height: usize,
) -> (Vec<Line<'static>>, u16) {
    let mut first = 0;
    let mut skipped = 0;
    while first < rows.len() && skipped + rows[first] <= scroll {
        skipped += rows[first];
        first += 1;
    }

    let offset = scroll - skipped;
    let mut covered = 0;
    let count = rows[first..]
        .iter()
        .take_while(|&&r| {
            let needed = covered < offset + height;
            covered += r;
            needed
        })
        .count();

    let visible = lines.into_iter().skip(first).take(count).collect();
    (visible, u16::try_from(offset).unwrap_or(u16::MAX))
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let palette = app.theme().palette();

    frame.render_widget(Block::default().style(Style::default().bg(palette.background)), area);

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    if app.show_home() {
        render_home(app, frame, chat_area, &palette);
    } else {
        render_chat(app, frame, chat_area, &palette);
    }

    render_input(app, frame, input_area, &palette);
    render_footer(app, frame, footer_area);

    if app.show_clear_confirm {
        render_clear_confirm(frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let busy = if app.is_generating() {
        Span::styled(" generating… ", Style::default().fg(Color::Yellow))
    } else {
        Span::raw("")
    };

    let title = Line::from(vec![
        Span::styled(" Gemini Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.controller.endpoint().to_string(), Style::default().fg(Color::Gray)),
        busy,
        Span::raw(" "),
        Span::styled(app.theme().toggle_icon(), Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_home(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.muted));

    let mut lines = vec![
        Line::default(),
        Line::from(Span::styled(
            "Hello there",
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "How can I help you today?",
            Style::default().fg(palette.muted),
        )),
        Line::default(),
    ];
    for (i, suggestion) in SUGGESTIONS.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!(" {} ", i + 1), Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" "),
            Span::styled(suggestion.to_string(), Style::default().fg(palette.text)),
        ]));
        lines.push(Line::default());
    }

    let home = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(home, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    let wrap_width = area.width.saturating_sub(2) as usize;

    let (lines, starts) = chat_lines(app, palette);

    let rows: Vec<usize> = lines.iter().map(|l| wrapped_height(l, wrap_width)).collect();
    let total: usize = rows.iter().sum();
    let height = usize::from(app.chat_height);
    let max_scroll = total.saturating_sub(height);

    if app.follow_bottom {
        app.chat_scroll = max_scroll;
    } else {
        app.chat_scroll = app.chat_scroll.min(max_scroll);
        // Keep the selected bubble's header on screen
        if let Some(&start) = app.selected.and_then(|i| starts.get(i)) {
            let row: usize = rows[..start].iter().sum();
            if row < app.chat_scroll {
                app.chat_scroll = row;
            } else if row >= app.chat_scroll + height {
                app.chat_scroll = (row + 1).saturating_sub(height).min(max_scroll);
            }
        }
    }

    let (visible, offset) = visible_window(lines, &rows, app.chat_scroll, height);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.muted))
        .title(format!(" {} messages ", app.transcript.len()));

    let chat = Paragraph::new(Text::from(visible))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { palette.muted };
    let title = if app.is_generating() {
        " Waiting for response... "
    } else {
        " Enter a prompt here "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.prompt_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.prompt_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(palette.outgoing))
        .block(input_block);

    frame.render_widget(input, area);

    if editing && !app.show_clear_confirm {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    if let Some(notification) = &app.notification {
        let style = match notification.kind {
            NotificationKind::Info => Style::default().bg(Color::Blue).fg(Color::White),
            NotificationKind::Error => Style::default().bg(Color::Red).fg(Color::White),
        };
        let footer = Paragraph::new(format!(" {} ", notification.text)).style(style);
        frame.render_widget(footer, area);
        return;
    }

    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" PROMPT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let keys: &[(&str, &str)] = match app.input_mode {
        InputMode::Editing => &[(" Enter ", " send "), (" Esc ", " stop typing ")],
        InputMode::Normal if app.show_home() => &[
            (" 1-4 ", " suggestion "),
            (" i ", " type "),
            (" t ", " theme "),
            (" q ", " quit "),
        ],
        InputMode::Normal => &[
            (" j/k ", " select "),
            (" c ", " copy "),
            (" y ", " copy code "),
            (" d ", " hide "),
            (" e ", " export "),
            (" D ", " clear "),
            (" t ", " theme "),
            (" i ", " type "),
            (" q ", " quit "),
        ],
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(keys.iter().flat_map(|(key, label)| {
            [Span::styled(*key, key_style), Span::styled(*label, label_style)]
        }))
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_clear_confirm(frame: &mut Frame, area: Rect) {
    let popup_width = 50.min(area.width.saturating_sub(4));
    let popup_height = 5;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height.min(area.height));

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Clear history ");

    let text = Text::from(vec![
        Line::from("Are you sure you want to delete all chat history?"),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" delete   "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" cancel"),
        ]),
    ]);

    let popup = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    frame.render_widget(popup, popup_area);
}
