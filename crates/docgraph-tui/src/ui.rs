use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::Marker,
    text::{Line, Span, Text},
    widgets::{
        canvas::{Canvas, Circle, Context, Line as CanvasLine, Rectangle},
        Block, Borders, Clear, Paragraph, Wrap,
    },
};
use docgraph_core::graph::palette::{EDGE_LABEL_COLOR, LABEL_COLOR};
use docgraph_core::graph::{NodeShape, Point, Rgb, Selection};
use docgraph_core::{ChatRole, StatusKind, StatusPhase};
use crate::app::{App, FocusPane, GraphViewport, InputMode};

const TOAST_WIDTH: u16 = 60;
const DETAIL_HEIGHT: u16 = 12;

fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

fn status_color(kind: StatusKind) -> Color {
    match kind {
        StatusKind::Info => Color::Blue,
        StatusKind::Success => Color::Green,
        StatusKind::Warning => Color::Yellow,
        StatusKind::Error => Color::Red,
        StatusKind::Progress => Color::Cyan,
    }
}

/// Greedy word wrap on character counts. Words longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();

    for raw in text.split('\n') {
        let mut line = String::new();
        let mut len = 0;
        for word in raw.split(' ') {
            let word_len = word.chars().count();
            if len > 0 && len + 1 + word_len > width {
                out.push(std::mem::take(&mut line));
                len = 0;
            }
            if len > 0 {
                line.push(' ');
                len += 1;
            }
            let mut chars = word.chars().peekable();
            while chars.peek().is_some() {
                if len == width {
                    out.push(std::mem::take(&mut line));
                    len = 0;
                }
                if let Some(c) = chars.next() {
                    line.push(c);
                    len += 1;
                }
            }
        }
        out.push(line);
    }
    out
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

    // Chat on the left, graph on the right
    let [chat_side, graph_side] = Layout::horizontal([
        Constraint::Percentage(45),
        Constraint::Percentage(55),
    ])
    .areas(body_area);

    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(chat_side);

    let [graph_area, detail_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(DETAIL_HEIGHT),
    ])
    .areas(graph_side);

    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_graph(app, frame, graph_area);
    render_detail(app, frame, detail_area);
    render_footer(app, frame, footer_area);

    render_status_toast(app, frame, body_area);
    if app.show_file_prompt {
        render_file_prompt(app, frame, area);
    }
}

fn border_style(app: &App, pane: FocusPane) -> Style {
    if app.focus == pane {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let graph = app.session.graph();
    let health = match app.session.last_health() {
        Some(h) => Span::styled(format!(" ● {} ", h.status), Style::default().fg(Color::Green)),
        None => Span::styled(" ○ unknown ", Style::default().fg(Color::Gray)),
    };

    let mut spans = vec![
        Span::styled(" docgraph ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.client.base_url().to_string(), Style::default().fg(Color::White)),
        health,
        Span::styled(
            format!("{} nodes, {} edges", graph.nodes().len(), graph.edges().len()),
            Style::default().fg(Color::Gray),
        ),
    ];
    if app.session.is_refreshing() {
        spans.push(Span::styled(" (refreshing)", Style::default().fg(Color::Yellow)));
    }
    spans.push(Span::raw(" "));
    spans.push(Span::styled(
        format!("v{}", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::Gray),
    ));

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, FocusPane::Chat))
        .title(" Chat ");
    let inner = block.inner(area);

    app.chat_area = Some(inner);
    app.chat_height = inner.height;

    let width = inner.width as usize;
    let mut lines: Vec<Line> = Vec::new();
    let mut context_rows = Vec::new();

    if app.session.transcript().entries().is_empty() {
        lines.push(Line::from(Span::styled(
            "Upload a document with o, then ask a question about it...",
            Style::default().fg(Color::DarkGray),
        )));
    }

    for (index, entry) in app.session.transcript().entries().iter().enumerate() {
        let (label, label_style) = match entry.role {
            ChatRole::User => ("You:", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            ChatRole::Assistant => ("Assistant:", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            ChatRole::System => ("System:", Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
        };
        lines.push(Line::from(Span::styled(label, label_style)));

        if entry.streaming && entry.content.is_empty() {
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        } else {
            let body_style = match entry.role {
                ChatRole::System => Style::default().fg(Color::Magenta).add_modifier(Modifier::ITALIC),
                _ => Style::default(),
            };
            for line in wrap_text(&entry.content, width) {
                lines.push(Line::from(Span::styled(line, body_style)));
            }
        }

        if let Some(annex) = &entry.context {
            context_rows.push((lines.len() as u16, index));
            let marker = if annex.expanded { "▾ Context" } else { "▸ Context (click or c to expand)" };
            lines.push(Line::from(Span::styled(
                marker,
                Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
            )));
            if annex.expanded {
                for line in wrap_text(&annex.text, width.saturating_sub(2)) {
                    lines.push(Line::from(vec![
                        Span::styled("│ ", Style::default().fg(Color::Blue)),
                        Span::styled(line, Style::default().fg(Color::Gray)),
                    ]));
                }
            }
        }
        lines.push(Line::default());
    }

    app.context_rows = context_rows;
    app.settle_chat_scroll(lines.len().min(u16::MAX as usize) as u16);

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing && !app.show_file_prompt;
    let title = if app.session.is_processing() {
        " Ask (waiting for answer) "
    } else {
        " Ask "
    };

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, FocusPane::Input))
        .title(title);

    if let Some(file) = app.session.selected_file() {
        let hint = if app.session.is_uploading() { "uploading" } else { "u to upload" };
        block = block.title_bottom(Line::from(Span::styled(
            format!(" {} ({}) - {} ", file.name, file.display_size(), hint),
            Style::default().fg(Color::Green),
        )));
    }

    let inner = block.inner(area);
    let input = Paragraph::new(app.query.text.as_str())
        .block(block)
        .style(Style::default().fg(Color::White));
    frame.render_widget(input, area);

    if editing {
        let cursor_x = app.query.cursor.min(inner.width.saturating_sub(1) as usize) as u16;
        frame.set_cursor_position((inner.x + cursor_x, inner.y));
    }
}

fn render_graph(app: &mut App, frame: &mut Frame, area: Rect) {
    let physics = if app.session.graph().physics_enabled() { "on" } else { "off" };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, FocusPane::Graph))
        .title(format!(" Knowledge Graph (physics {}) ", physics));
    let inner = block.inner(area);

    let graph = app.session.graph();
    if graph.nodes().is_empty() {
        app.graph_viewport = None;
        let empty = Paragraph::new(Span::styled(
            "No graph data yet. Upload a document or press r to refresh.",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block)
        .wrap(Wrap { trim: true });
        frame.render_widget(empty, area);
        return;
    }

    let viewport = GraphViewport::fit(inner, graph.layout().bounds(), 60.0);
    app.graph_viewport = Some(viewport);
    let graph = app.session.graph();

    let highlighted_edges = graph.highlighted_edges();
    let highlighted_nodes = graph.highlighted_nodes();
    let selection = graph.selection().clone();

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds(viewport.x_bounds)
        .y_bounds(viewport.y_bounds)
        .paint(|ctx| {
            for (i, edge) in graph.edges().iter().enumerate() {
                let Some((a, b)) = graph.edge_endpoints(i) else {
                    continue;
                };
                let style = graph.edge_style(edge);
                let active = highlighted_edges.contains(&i) || selection == Selection::Edge(i);
                ctx.draw(&CanvasLine {
                    x1: a.x,
                    y1: a.y,
                    x2: b.x,
                    y2: b.y,
                    color: color(if active { style.highlight } else { style.color }),
                });
            }
            ctx.layer();

            for node in graph.nodes() {
                let Some(p) = graph.node_position(&node.id) else {
                    continue;
                };
                let style = graph.node_style(node);
                draw_shape(ctx, style.shape, p, style.size, color(style.color));

                let selected = selection == Selection::Node(node.id.clone());
                if selected {
                    draw_shape(ctx, NodeShape::Circle, p, style.size + 8.0, Color::White);
                } else if highlighted_nodes.contains(node.id.as_str())
                    || graph.hovered() == Some(node.id.as_str())
                {
                    draw_shape(ctx, NodeShape::Circle, p, style.size + 5.0, Color::Yellow);
                }
            }
            ctx.layer();

            for node in graph.nodes() {
                let Some(p) = graph.node_position(&node.id) else {
                    continue;
                };
                let size = graph.node_style(node).size;
                ctx.print(
                    p.x + size,
                    p.y,
                    Line::styled(
                        node.display_label().to_string(),
                        Style::default().fg(color(LABEL_COLOR)),
                    ),
                );
            }

            if let Selection::Edge(i) = &selection {
                if let (Some(edge), Some((a, b))) = (graph.edges().get(*i), graph.edge_endpoints(*i)) {
                    ctx.print(
                        (a.x + b.x) / 2.0,
                        (a.y + b.y) / 2.0,
                        Line::styled(edge.kind.clone(), Style::default().fg(color(EDGE_LABEL_COLOR))),
                    );
                }
            }
        });

    frame.render_widget(canvas, area);
}

fn draw_shape(ctx: &mut Context, shape: NodeShape, at: Point, size: f64, color: Color) {
    match shape {
        NodeShape::Dot => {
            for radius in [size, size * 0.66, size * 0.33] {
                ctx.draw(&Circle { x: at.x, y: at.y, radius, color });
            }
        }
        NodeShape::Circle => ctx.draw(&Circle { x: at.x, y: at.y, radius: size, color }),
        NodeShape::Square => ctx.draw(&Rectangle {
            x: at.x - size,
            y: at.y - size,
            width: size * 2.0,
            height: size * 2.0,
            color,
        }),
        NodeShape::Diamond => {
            let corners = [
                (at.x, at.y + size),
                (at.x + size, at.y),
                (at.x, at.y - size),
                (at.x - size, at.y),
            ];
            draw_polygon(ctx, &corners, color);
        }
        NodeShape::Triangle => {
            let corners = [
                (at.x, at.y + size),
                (at.x + size * 0.87, at.y - size * 0.5),
                (at.x - size * 0.87, at.y - size * 0.5),
            ];
            draw_polygon(ctx, &corners, color);
        }
    }
}

fn draw_polygon(ctx: &mut Context, corners: &[(f64, f64)], color: Color) {
    for (i, &(x1, y1)) in corners.iter().enumerate() {
        let (x2, y2) = corners[(i + 1) % corners.len()];
        ctx.draw(&CanvasLine { x1, y1, x2, y2, color });
    }
}

fn render_detail(app: &App, frame: &mut Frame, area: Rect) {
    let graph = app.session.graph();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, FocusPane::Detail))
        .title(" Details ");

    let key_style = Style::default().fg(Color::Cyan);
    let mut lines: Vec<Line> = Vec::new();

    match graph.detail() {
        Some(detail) => {
            lines.push(Line::from(vec![
                Span::styled(detail.title, Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(format!("  [{}]", detail.kind), Style::default().fg(Color::Gray)),
            ]));
            for (key, value) in detail.properties {
                lines.push(Line::from(vec![
                    Span::styled(format!("{}: ", key), key_style),
                    Span::raw(value),
                ]));
            }
        }
        None => {
            lines.push(Line::from(Span::styled(
                "Click a node or edge (or press n / e) to see its properties.",
                Style::default().fg(Color::DarkGray),
            )));
            for (kind, count) in graph.snapshot().kind_counts() {
                let kind = if kind.is_empty() { "(untyped)".to_string() } else { kind };
                lines.push(Line::from(vec![
                    Span::styled(format!("{}: ", kind), key_style),
                    Span::raw(count.to_string()),
                ]));
            }
        }
    }

    if let Some(node) = graph.hovered().and_then(|id| graph.snapshot().node(id)) {
        if let Some(description) = node.description() {
            lines.push(Line::default());
            lines.push(Line::from(vec![
                Span::styled(format!("{}: ", node.display_label()), Style::default().fg(Color::Yellow)),
                Span::raw(description.to_string()),
            ]));
        }
    }

    let detail = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(detail, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match (app.show_file_prompt, app.input_mode) {
        (true, _) => (" FILE ", Style::default().bg(Color::Magenta).fg(Color::White)),
        (false, InputMode::Editing) => (" ASK ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        (false, InputMode::Normal) => (" VIEW ", Style::default().bg(Color::Blue).fg(Color::White)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: Vec<(&str, &str)> = if app.show_file_prompt {
        vec![(" Enter ", " select "), (" Esc ", " cancel ")]
    } else if app.input_mode == InputMode::Editing {
        vec![(" Enter ", " send "), (" Tab ", " focus "), (" Esc ", " stop typing ")]
    } else {
        let mut pairs = vec![(" Tab ", " focus "), (" i ", " ask "), (" o ", " open file ")];
        if app.session.can_upload() {
            pairs.push((" u ", " upload "));
        }
        pairs.extend([
            (" r ", " refresh "),
            (" p ", " physics "),
            (" n/e ", " select "),
            (" c ", " context "),
            (" q ", " quit "),
        ]);
        if *app.session.graph().selection() != Selection::None {
            pairs.insert(pairs.len() - 1, (" Esc ", " clear "));
        }
        pairs
    };

    let hints = pairs
        .into_iter()
        .flat_map(|(key, label)| [Span::styled(key, key_style), Span::styled(label, label_style)]);

    let footer_content = Line::from(
        vec![Span::styled(mode_text, mode_style), Span::styled(" ", label_style)]
            .into_iter()
            .chain(hints)
            .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_status_toast(app: &App, frame: &mut Frame, area: Rect) {
    let Some((status, phase)) = app.session.notifier().current() else {
        return;
    };

    let width = TOAST_WIDTH.min(area.width.saturating_sub(2));
    let text_width = width.saturating_sub(4) as usize;
    let lines = wrap_text(&format!("{} {}", status.kind.icon(), status.message), text_width);
    let height = (lines.len() as u16 + 2).min(area.height.saturating_sub(1));
    let toast_area = Rect::new(
        area.x + area.width.saturating_sub(width + 1),
        area.y + 1,
        width,
        height,
    );

    let mut style = Style::default().fg(status_color(status.kind));
    if phase == StatusPhase::Fading {
        style = style.add_modifier(Modifier::DIM);
    }

    frame.render_widget(Clear, toast_area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(format!(" {} ", status.kind.as_str()));
    let toast = Paragraph::new(Text::from(
        lines.into_iter().map(Line::from).collect::<Vec<_>>(),
    ))
    .block(block)
    .style(style);
    frame.render_widget(toast, toast_area);
}

fn render_file_prompt(app: &App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 70.min(area.width.saturating_sub(4));
    let popup_height = 7.min(area.height);

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Select a document ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);
    if inner.height == 0 {
        return;
    }

    // On short terminals the input row wins over the instructions
    let input_row = 2.min(inner.height - 1);
    if input_row > 0 {
        let instructions = Paragraph::new("Path to a PDF or text file. Enter to select, Esc to cancel.")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));
    }

    // Keep the end of long paths visible
    let input_area = Rect::new(inner.x, inner.y + input_row, inner.width, 1);
    let visible = input_area.width.saturating_sub(1) as usize;
    let skip = app.file_input.cursor.saturating_sub(visible);
    let shown: String = app.file_input.text.chars().skip(skip).collect();
    frame.render_widget(
        Paragraph::new(shown).style(Style::default().fg(Color::Cyan)),
        input_area,
    );

    let cursor_x = (app.file_input.cursor - skip) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    if inner.height > 4 {
        if let Some(file) = app.session.selected_file() {
            let current = Paragraph::new(format!("Currently selected: {} ({})", file.name, file.display_size()))
                .style(Style::default().fg(Color::Green));
            frame.render_widget(current, Rect::new(inner.x, inner.y + 4, inner.width, 1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgraph_core::{ApiClient, Config};
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    fn app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(Config::new(), ApiClient::new("http://127.0.0.1:9/api"), tx)
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("hello world", 5), vec!["hello", "world"]);
        assert_eq!(wrap_text("a b c", 10), vec!["a b c"]);
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap_text("one\n\ntwo", 10), vec!["one", "", "two"]);
        assert_eq!(wrap_text("", 10), vec![""]);
    }

    #[test]
    fn test_renders_empty_state() {
        let mut app = app();
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("docgraph"));
        assert!(text.contains("No graph data yet"));
        assert!(app.chat_area.is_some());
        assert!(app.graph_viewport.is_none());
    }

    #[test]
    fn test_renders_status_toast_and_system_entry() {
        let mut app = app();
        app.session.notify("Graph refreshed", StatusKind::Success);
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("Graph refreshed"));
        assert!(text.contains("success"));
    }

    #[test]
    fn test_file_prompt_fits_short_terminal() {
        let mut app = app();
        app.session
            .select_file(docgraph_core::FileSelection::new("notes.txt", 12, "text/plain"));
        app.open_file_prompt();
        for c in "~/notes.txt".chars() {
            app.file_input.insert(c);
        }

        let mut terminal = Terminal::new(TestBackend::new(80, 5)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("Select a document"));
        assert!(text.contains("~/notes.txt"));
        assert!(!text.contains("Currently selected"));

        let mut terminal = Terminal::new(TestBackend::new(80, 9)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        assert!(screen_text(&terminal).contains("Currently selected: notes.txt"));
    }
}
