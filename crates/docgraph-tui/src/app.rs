use std::path::PathBuf;
use std::time::Instant;

use docgraph_core::driver;
use docgraph_core::graph::Point;
use docgraph_core::{
    ApiClient, Command, Config, FileSelection, Session, SessionEvent, StatusKind,
};
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Chat,
    Input,
    Graph,
    Detail,
}

impl FocusPane {
    pub fn next(self) -> Self {
        match self {
            FocusPane::Chat => FocusPane::Input,
            FocusPane::Input => FocusPane::Graph,
            FocusPane::Graph => FocusPane::Detail,
            FocusPane::Detail => FocusPane::Chat,
        }
    }
}

/// Maps terminal cells inside the graph panel to layout coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphViewport {
    /// Inner area of the graph panel (borders excluded)
    pub area: Rect,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
}

impl GraphViewport {
    /// Fit the given layout bounds into `area`, with some padding.
    pub fn fit(area: Rect, bounds: Option<(Point, Point)>, padding: f64) -> Self {
        let (lo, hi) = bounds.unwrap_or((Point::new(-100.0, -100.0), Point::new(100.0, 100.0)));
        let (cx, cy) = ((lo.x + hi.x) / 2.0, (lo.y + hi.y) / 2.0);
        let half_w = ((hi.x - lo.x) / 2.0 + padding).max(100.0);
        let half_h = ((hi.y - lo.y) / 2.0 + padding).max(100.0);
        Self {
            area,
            x_bounds: [cx - half_w, cx + half_w],
            y_bounds: [cy - half_h, cy + half_h],
        }
    }

    pub fn contains(&self, column: u16, row: u16) -> bool {
        point_in_rect(column, row, self.area)
    }

    /// Layout coordinates at the centre of a terminal cell.
    pub fn to_graph(&self, column: u16, row: u16) -> Option<Point> {
        if !self.contains(column, row) || self.area.width == 0 || self.area.height == 0 {
            return None;
        }
        let fx = (f64::from(column - self.area.x) + 0.5) / f64::from(self.area.width);
        let fy = (f64::from(row - self.area.y) + 0.5) / f64::from(self.area.height);
        let x = self.x_bounds[0] + fx * (self.x_bounds[1] - self.x_bounds[0]);
        // Canvas y grows upward, terminal rows grow downward.
        let y = self.y_bounds[1] - fy * (self.y_bounds[1] - self.y_bounds[0]);
        Some(Point::new(x, y))
    }

    /// Size of one cell in layout units, the larger of width and height.
    pub fn cell_size(&self) -> f64 {
        if self.area.width == 0 || self.area.height == 0 {
            return 0.0;
        }
        let w = (self.x_bounds[1] - self.x_bounds[0]) / f64::from(self.area.width);
        let h = (self.y_bounds[1] - self.y_bounds[0]) / f64::from(self.area.height);
        w.max(h)
    }
}

/// Check if a point is within a rectangle
pub fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

/// Convert a character index to a byte index for UTF-8 safe string operations
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// A single-line text field with a cursor, used for the question and file path inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextField {
    pub text: String,
    /// Cursor position in characters
    pub cursor: usize,
}

impl TextField {
    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    pub session: Session,
    pub client: ApiClient,
    session_tx: UnboundedSender<SessionEvent>,
    pub config: Config,

    // Chat state
    pub query: TextField,
    pub chat_scroll: u16,
    pub chat_height: u16, // Inner height of the chat panel, for scroll calculations
    pub follow_chat: bool, // Keep the newest line in view
    /// Chat rows (before scrolling) that hold a context toggle, with their entry index
    pub context_rows: Vec<(u16, usize)>,

    // File prompt popup
    pub show_file_prompt: bool,
    pub file_input: TextField,

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub graph_viewport: Option<GraphViewport>,

    /// Node being dragged with the mouse
    pub dragging: Option<String>,

    // Animation state
    pub animation_frame: u8,
}

impl App {
    pub fn new(config: Config, client: ApiClient, session_tx: UnboundedSender<SessionEvent>) -> Self {
        let session = Session::from_config(&config);
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Input,
            session,
            client,
            session_tx,
            config,
            query: TextField::default(),
            chat_scroll: 0,
            chat_height: 0,
            follow_chat: true,
            context_rows: Vec::new(),
            show_file_prompt: false,
            file_input: TextField::default(),
            chat_area: None,
            graph_viewport: None,
            dragging: None,
            animation_frame: 0,
        }
    }

    /// Initial graph load and API check.
    pub fn start(&mut self) {
        let refresh = self.session.refresh_graph();
        self.dispatch(refresh);
        let health = self.session.check_health();
        self.dispatch(health);
    }

    pub fn dispatch(&self, command: Command) {
        driver::spawn(&self.client, command, self.session_tx.clone());
    }

    pub fn handle_session_event(&mut self, event: SessionEvent) {
        for command in self.session.handle(event) {
            self.dispatch(command);
        }
    }

    pub fn tick(&mut self) {
        self.session.tick(Instant::now());
        self.animation_frame = (self.animation_frame + 1) % 3;
    }

    pub fn submit_query(&mut self) {
        if let Some(command) = self.session.send(&self.query.text) {
            self.query.clear();
            self.follow_chat = true;
            self.dispatch(command);
        }
    }

    pub fn open_file_prompt(&mut self) {
        self.show_file_prompt = true;
        if let Some(path) = self.session.selected_file().and_then(|f| f.path.as_ref()) {
            self.file_input.text = path.display().to_string();
            self.file_input.end();
        }
    }

    pub fn close_file_prompt(&mut self) {
        self.show_file_prompt = false;
    }

    pub fn submit_file_prompt(&mut self) {
        let raw = self.file_input.text.trim().to_string();
        if raw.is_empty() {
            self.session.notify("Please select a file first.", StatusKind::Error);
            return;
        }
        let path = expand_home(&raw);
        match FileSelection::from_path(&path) {
            Ok(selection) => {
                if self.session.select_file(selection) {
                    self.show_file_prompt = false;
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot open file");
                self.session
                    .notify(format!("Could not open {}: {}", raw, e), StatusKind::Error);
            }
        }
    }

    pub fn upload(&mut self) {
        if let Some(command) = self.session.upload() {
            self.dispatch(command);
        }
    }

    pub fn refresh_graph(&mut self) {
        let command = self.session.refresh_graph();
        self.session.notify("Refreshing graph...", StatusKind::Progress);
        self.dispatch(command);
    }

    pub fn check_health(&mut self) {
        let command = self.session.check_health();
        self.dispatch(command);
    }

    pub fn toggle_physics(&mut self) {
        let enabled = self.session.toggle_physics();
        self.config.physics_enabled = Some(enabled);
        if let Err(e) = Config::save_physics(enabled) {
            warn!(error = %e, "could not save physics setting");
        }
    }

    /// Expand or collapse the context of the most recent answer that has one.
    pub fn toggle_latest_context(&mut self) {
        match self.session.transcript().latest_with_context() {
            Some(index) => {
                self.session.toggle_context(index);
            }
            None => self.session.notify("No answer context to show yet.", StatusKind::Info),
        }
    }

    /// Toggle the context block drawn at `row` of the chat panel, if any.
    pub fn toggle_context_at_row(&mut self, row: u16) -> bool {
        let Some(area) = self.chat_area else {
            return false;
        };
        if row < area.y {
            return false;
        }
        let line = row - area.y + self.chat_scroll;
        let hit = self
            .context_rows
            .iter()
            .find(|(r, _)| *r == line)
            .map(|(_, index)| *index);
        match hit {
            Some(index) => self.session.toggle_context(index).is_some(),
            None => false,
        }
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_chat = false;
    }

    pub fn scroll_chat_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        self.follow_chat = true;
    }

    /// Clamp the chat scroll once the rendered line count is known.
    pub fn settle_chat_scroll(&mut self, total_lines: u16) {
        let max_scroll = total_lines.saturating_sub(self.chat_height);
        if self.follow_chat || self.chat_scroll >= max_scroll {
            self.chat_scroll = max_scroll;
            self.follow_chat = true;
        }
    }

    /// Click inside the graph panel: select what is under the cursor.
    pub fn click_graph(&mut self, column: u16, row: u16) {
        let Some(viewport) = self.graph_viewport else {
            return;
        };
        let Some(at) = viewport.to_graph(column, row) else {
            return;
        };
        let slack = viewport.cell_size();
        let graph = self.session.graph_mut();

        if let Some(id) = graph.node_at(at, slack).map(|n| n.id.clone()) {
            graph.click_node(&id);
            self.dragging = Some(id);
        } else if let Some(edge) = graph.edge_at(at, slack) {
            graph.click_edge(edge);
        } else {
            graph.click_background();
        }
    }

    pub fn drag_to(&mut self, column: u16, row: u16) {
        let (Some(viewport), Some(id)) = (self.graph_viewport, self.dragging.clone()) else {
            return;
        };
        if let Some(at) = viewport.to_graph(column, row) {
            self.session.graph_mut().drag_node(&id, at);
        }
    }

    pub fn hover_graph(&mut self, column: u16, row: u16) {
        let Some(viewport) = self.graph_viewport else {
            return;
        };
        let graph = self.session.graph_mut();
        match viewport.to_graph(column, row) {
            Some(at) => {
                let id = graph.node_at(at, viewport.cell_size()).map(|n| n.id.clone());
                graph.hover(id.as_deref());
            }
            None => graph.hover(None),
        }
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}
