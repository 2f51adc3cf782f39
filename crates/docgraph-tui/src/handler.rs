use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use crate::app::{point_in_rect, App, FocusPane, InputMode};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
        AppEvent::Session(event) => app.handle_session_event(event),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_file_prompt {
        handle_file_prompt(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_query_editing(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Tab => {
            app.focus = app.focus.next();
            if app.focus == FocusPane::Input {
                app.input_mode = InputMode::Editing;
            }
        }
        KeyCode::Char('i') | KeyCode::Enter => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
        }

        // Documents
        KeyCode::Char('o') => app.open_file_prompt(),
        KeyCode::Char('u') => app.upload(),

        // Graph
        KeyCode::Char('r') => app.refresh_graph(),
        KeyCode::Char('p') => app.toggle_physics(),
        KeyCode::Char('n') => {
            app.session.graph_mut().cycle_node(true);
        }
        KeyCode::Char('N') => {
            app.session.graph_mut().cycle_node(false);
        }
        KeyCode::Char('e') => {
            app.session.graph_mut().cycle_edge(true);
        }
        KeyCode::Char('E') => {
            app.session.graph_mut().cycle_edge(false);
        }
        KeyCode::Esc => app.session.graph_mut().click_background(),

        // Chat
        KeyCode::Char('c') => app.toggle_latest_context(),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(1),
        KeyCode::PageDown => app.scroll_chat_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_chat_up(app.chat_height.max(1)),
        KeyCode::Char('g') => app.scroll_chat_up(u16::MAX),
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        KeyCode::Char('h') => app.check_health(),
        _ => {}
    }
}

fn handle_query_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Chat;
        }
        KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
            app.focus = app.focus.next();
        }
        KeyCode::Enter => app.submit_query(),
        KeyCode::Backspace => app.query.backspace(),
        KeyCode::Delete => app.query.delete(),
        KeyCode::Left => app.query.left(),
        KeyCode::Right => app.query.right(),
        KeyCode::Home => app.query.home(),
        KeyCode::End => app.query.end(),
        KeyCode::Up => app.scroll_chat_up(1),
        KeyCode::Down => app.scroll_chat_down(1),
        KeyCode::Char(c) => app.query.insert(c),
        _ => {}
    }
}

fn handle_file_prompt(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_file_prompt(),
        KeyCode::Enter => app.submit_file_prompt(),
        KeyCode::Backspace => app.file_input.backspace(),
        KeyCode::Delete => app.file_input.delete(),
        KeyCode::Left => app.file_input.left(),
        KeyCode::Right => app.file_input.right(),
        KeyCode::Home => app.file_input.home(),
        KeyCode::End => app.file_input.end(),
        KeyCode::Char(c) => app.file_input.insert(c),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_graph = app.graph_viewport.map(|v| v.contains(x, y)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown if in_chat => app.scroll_chat_down(3),
        MouseEventKind::ScrollUp if in_chat => app.scroll_chat_up(3),
        MouseEventKind::Down(MouseButton::Left) => {
            if app.show_file_prompt {
                return;
            }
            if in_graph {
                app.focus = FocusPane::Graph;
                app.input_mode = InputMode::Normal;
                app.click_graph(x, y);
            } else if in_chat {
                app.focus = FocusPane::Chat;
                app.input_mode = InputMode::Normal;
                app.toggle_context_at_row(y);
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => app.drag_to(x, y),
        MouseEventKind::Up(MouseButton::Left) => app.dragging = None,
        MouseEventKind::Moved => app.hover_graph(x, y),
        _ => {}
    }
}
