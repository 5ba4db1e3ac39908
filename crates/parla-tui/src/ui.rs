use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use parla_core::language::{self, Direction};
use parla_core::{Availability, Message};
use unicode_width::UnicodeWidthChar;
use crate::app::App;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: status, languages, body, footer
    let [status_area, lang_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_status(app, frame, status_area);
    render_languages(app, frame, lang_area);
    render_body(app, frame, body_area);
    render_footer(app, frame, footer_area);
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let availability = app.current_availability();
    let color = match availability {
        Availability::Checking => Color::Yellow,
        Availability::Available { .. } => Color::Green,
        Availability::Unavailable => Color::Red,
    };

    let line = Line::from(vec![
        Span::styled(" ● ", Style::default().fg(color).bold()),
        Span::styled(availability.label(), Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let status = Paragraph::new(line)
        .alignment(Alignment::Center)
        .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status, area);
}

fn render_languages(app: &App, frame: &mut Frame, area: Rect) {
    let label_style = Style::default().fg(Color::Gray);
    let value_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);

    let line = Line::from(vec![
        Span::styled("YOU SPEAK ", label_style),
        Span::styled(language::display_name(&app.conversation.source_lang), value_style),
        Span::styled("   ⇄   ", Style::default().fg(Color::Yellow)),
        Span::styled("BOT REPLIES ", label_style),
        Span::styled(language::display_name(&app.conversation.target_lang), value_style),
    ]);

    let bar = Paragraph::new(line)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    frame.render_widget(bar, area);
}

fn alignment_for(code: &str) -> Alignment {
    match language::find(code).map(|l| l.direction) {
        Some(Direction::Rtl) => Alignment::Right,
        _ => Alignment::Left,
    }
}

fn message_lines<'a>(messages: impl Iterator<Item = &'a Message>, style: Style) -> Vec<Line<'a>> {
    let mut lines = Vec::new();
    for msg in messages {
        for line in msg.text.lines() {
            lines.push(Line::from(Span::styled(line, style)).alignment(alignment_for(&msg.lang)));
        }
        lines.push(Line::default());
    }
    lines
}

fn render_body(app: &mut App, frame: &mut Frame, area: Rect) {
    // Split view: user on the left, bot on the right
    let [user_column, bot_area] = Layout::horizontal([
        Constraint::Percentage(50),
        Constraint::Percentage(50),
    ])
    .areas(area);

    let [user_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(user_column);

    // Store areas for mouse hit-testing
    app.user_area = Some(user_area);
    app.bot_area = Some(bot_area);

    // Inner size minus borders, used for scroll calculations
    app.user_panel_height = user_area.height.saturating_sub(2);
    app.user_panel_width = user_area.width.saturating_sub(2);
    app.bot_panel_height = bot_area.height.saturating_sub(2);
    app.bot_panel_width = bot_area.width.saturating_sub(2);

    render_user_panel(app, frame, user_area);
    render_input(app, frame, input_area);
    render_bot_panel(app, frame, bot_area);
}

fn render_user_panel(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" You ({}) ", language::display_name(&app.conversation.source_lang)));

    let user_style = Style::default().fg(Color::Cyan);
    let mut lines = message_lines(app.conversation.user_messages(), user_style);

    if let Some(pending) = &app.pending_utterance {
        for line in pending.lines() {
            lines.push(Line::from(Span::styled(line, user_style.add_modifier(Modifier::DIM))));
        }
    }

    let text = if lines.is_empty() {
        Text::from(Span::styled(
            "Type or speak to start practicing...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(lines)
    };

    let panel = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.user_scroll, 0));
    frame.render_widget(panel, area);
}

fn render_bot_panel(app: &App, frame: &mut Frame, area: Rect) {
    let dots = ".".repeat((app.animation_frame as usize) + 1);

    let mut title = vec![Span::raw(format!(
        " Bot ({}) ",
        language::display_name(&app.conversation.target_lang)
    ))];
    if app.is_speaking() {
        title.push(Span::styled(
            format!("speaking{} ", dots),
            Style::default().fg(Color::Green).add_modifier(Modifier::ITALIC),
        ));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(Line::from(title));

    let mut lines = message_lines(app.conversation.bot_messages(), Style::default().fg(Color::White));

    if app.is_thinking() {
        // Animated ellipsis: cycles through ".", "..", "..."
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let panel = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.bot_scroll, 0));
    frame.render_widget(panel, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let (title, border_color) = if app.is_listening {
        (" Listening... (Ctrl+R to stop) ".to_string(), Color::Red)
    } else {
        (" Type or speak (Ctrl+R) ".to_string(), Color::Yellow)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Visible portion of input with horizontal scrolling, measured in cells
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let (scroll_offset, cursor_col) = input_view(&app.input, app.cursor, inner_width);

    let mut used = 0;
    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take_while(|c| {
            used += c.width().unwrap_or(0);
            used <= inner_width
        })
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    let cursor_x = cursor_col.min(inner_width) as u16;
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

/// First visible character and the cursor's cell column, scrolled so the
/// cursor stays inside `width` cells. Wide characters count as two cells.
fn input_view(input: &str, cursor: usize, width: usize) -> (usize, usize) {
    let widths: Vec<usize> = input
        .chars()
        .take(cursor)
        .map(|c| c.width().unwrap_or(0))
        .collect();
    let mut col: usize = widths.iter().sum();
    if width == 0 {
        return (0, col);
    }

    let mut offset = 0;
    while col >= width && offset < widths.len() {
        col -= widths[offset];
        offset += 1;
    }
    (offset, col)
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    if let Some(notice) = &app.notice {
        let line = Line::from(Span::styled(
            format!(" {} ", notice),
            Style::default().bg(Color::Red).fg(Color::White),
        ));
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" ^R ", key_style),
        Span::styled(if app.is_listening { " stop " } else { " listen " }, label_style),
        Span::styled(" ^S ", key_style),
        Span::styled(" swap ", label_style),
        Span::styled(" F2/F3 ", key_style),
        Span::styled(" languages ", label_style),
        Span::styled(" ^P ", key_style),
        Span::styled(" replay ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ];

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}
