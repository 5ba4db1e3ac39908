use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, Pane};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.poll_tasks().await;
        }
        AppEvent::Playback(event) => app.on_playback(event),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Any key dismisses the current notice
    app.notice = None;

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => app.should_quit = true,
        KeyCode::Esc => app.should_quit = true,

        KeyCode::Char('r') if ctrl => app.toggle_listening(),
        KeyCode::Char('s') if ctrl => app.swap_languages(),
        KeyCode::Char('p') if ctrl => app.replay_last(),
        KeyCode::F(2) => app.cycle_source(),
        KeyCode::F(3) => app.cycle_target(),

        KeyCode::PageUp => {
            app.scroll(Pane::User, -(app.user_panel_height.max(1) as i32));
            app.scroll(Pane::Bot, -(app.bot_panel_height.max(1) as i32));
        }
        KeyCode::PageDown => {
            app.scroll(Pane::User, app.user_panel_height.max(1) as i32);
            app.scroll(Pane::Bot, app.bot_panel_height.max(1) as i32);
        }

        KeyCode::Enter => app.submit_input(),
        _ => handle_input_editing(app, key),
    }
}

fn handle_input_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    // Scroll whichever panel is under the pointer
    let pane = if app.user_area.is_some_and(|r| point_in_rect(x, y, r)) {
        Pane::User
    } else if app.bot_area.is_some_and(|r| point_in_rect(x, y, r)) {
        Pane::Bot
    } else {
        return;
    };

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll(pane, 3),
        MouseEventKind::ScrollUp => app.scroll(pane, -3),
        _ => {}
    }
}
