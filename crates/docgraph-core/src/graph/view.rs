//! The rendered graph: snapshot + layout + selection state.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use super::layout::{ForceLayout, PhysicsParams, Point};
use super::palette::{edge_style, node_style, EdgeStyle, NodeStyle};
use super::snapshot::{flatten_properties, Edge, GraphSnapshot, Node};

/// What the detail panel is showing. Each click replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    Node(String),
    Edge(usize),
}

/// Contents of the detail panel for the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detail {
    pub title: String,
    pub kind: String,
    pub properties: Vec<(String, String)>,
}

pub struct GraphView {
    snapshot: GraphSnapshot,
    index: HashMap<String, usize>,
    layout: ForceLayout,
    params: PhysicsParams,
    physics_enabled: bool,
    selection: Selection,
    hovered: Option<String>,
}

impl GraphView {
    pub fn new(physics_enabled: bool) -> Self {
        let params = PhysicsParams::default();
        let mut layout = ForceLayout::new(0, Vec::new(), params);
        layout.set_enabled(physics_enabled);
        Self {
            snapshot: GraphSnapshot::default(),
            index: HashMap::new(),
            layout,
            params,
            physics_enabled,
            selection: Selection::None,
            hovered: None,
        }
    }

    /// Tear down the current graph and build a new one from `snapshot`.
    ///
    /// Selection and hover do not survive; the physics setting does.
    pub fn replace(&mut self, snapshot: GraphSnapshot) {
        let dangling = snapshot.dangling_edges();
        if !dangling.is_empty() {
            warn!(count = dangling.len(), "graph has edges pointing at unknown nodes");
        }

        let mut index = HashMap::with_capacity(snapshot.nodes.len());
        for (i, node) in snapshot.nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                warn!(id = %node.id, "duplicate node id in graph snapshot");
            }
        }

        let springs = snapshot
            .edges
            .iter()
            .filter_map(|e| Some((*index.get(&e.from)?, *index.get(&e.to)?)))
            .collect();

        let mut layout = ForceLayout::new(snapshot.nodes.len(), springs, self.params);
        layout.set_enabled(self.physics_enabled);

        debug!(
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "graph rebuilt"
        );

        self.snapshot = snapshot;
        self.index = index;
        self.layout = layout;
        self.selection = Selection::None;
        self.hovered = None;
    }

    pub fn snapshot(&self) -> &GraphSnapshot {
        &self.snapshot
    }

    pub fn nodes(&self) -> &[Node] {
        &self.snapshot.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.snapshot.edges
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn node_position(&self, id: &str) -> Option<Point> {
        self.layout.position(self.node_index(id)?)
    }

    /// Both endpoint positions, or None if either endpoint is unknown.
    pub fn edge_endpoints(&self, edge: usize) -> Option<(Point, Point)> {
        let edge = self.snapshot.edges.get(edge)?;
        Some((self.node_position(&edge.from)?, self.node_position(&edge.to)?))
    }

    pub fn layout(&self) -> &ForceLayout {
        &self.layout
    }

    pub fn node_style(&self, node: &Node) -> NodeStyle {
        node_style(&node.kind)
    }

    pub fn edge_style(&self, edge: &Edge) -> EdgeStyle {
        edge_style(&edge.kind)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn physics_enabled(&self) -> bool {
        self.physics_enabled
    }

    pub fn set_physics(&mut self, enabled: bool) {
        self.physics_enabled = enabled;
        self.layout.set_enabled(enabled);
    }

    pub fn toggle_physics(&mut self) -> bool {
        self.set_physics(!self.physics_enabled);
        self.physics_enabled
    }

    /// Run some layout iterations; returns true if positions changed.
    pub fn step(&mut self, iterations: u32) -> bool {
        self.layout.advance(iterations)
    }

    pub fn drag_node(&mut self, id: &str, to: Point) {
        if let Some(i) = self.node_index(id) {
            self.layout.move_node(i, to);
        }
    }

    pub fn click_node(&mut self, id: &str) -> bool {
        if self.index.contains_key(id) {
            self.selection = Selection::Node(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn click_edge(&mut self, edge: usize) -> bool {
        if edge < self.snapshot.edges.len() {
            self.selection = Selection::Edge(edge);
            true
        } else {
            false
        }
    }

    pub fn click_background(&mut self) {
        self.selection = Selection::None;
    }

    pub fn hover(&mut self, id: Option<&str>) {
        self.hovered = id
            .filter(|id| self.index.contains_key(*id))
            .map(str::to_string);
    }

    /// Edges incident to the selected or hovered node.
    pub fn highlighted_edges(&self) -> HashSet<usize> {
        let mut focus: Vec<&str> = Vec::new();
        if let Selection::Node(id) = &self.selection {
            focus.push(id);
        }
        if let Some(id) = &self.hovered {
            focus.push(id);
        }

        self.snapshot
            .edges
            .iter()
            .enumerate()
            .filter(|(_, e)| focus.iter().any(|id| e.touches(id)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Endpoints of the selected edge.
    pub fn highlighted_nodes(&self) -> HashSet<&str> {
        match &self.selection {
            Selection::Edge(i) => self
                .snapshot
                .edges
                .get(*i)
                .map(|e| [e.from.as_str(), e.to.as_str()].into_iter().collect())
                .unwrap_or_default(),
            _ => HashSet::new(),
        }
    }

    pub fn detail(&self) -> Option<Detail> {
        match &self.selection {
            Selection::None => None,
            Selection::Node(id) => {
                let node = self.snapshot.nodes.get(self.node_index(id)?)?;
                let mut properties = vec![("id".to_string(), node.id.clone())];
                properties.extend(flatten_properties(&node.properties));
                Some(Detail {
                    title: node.display_label().to_string(),
                    kind: node.kind.clone(),
                    properties,
                })
            }
            Selection::Edge(i) => {
                let edge = self.snapshot.edges.get(*i)?;
                let label = |id: &str| {
                    self.snapshot
                        .node(id)
                        .map(|n| n.display_label().to_string())
                        .unwrap_or_else(|| id.to_string())
                };
                let mut properties = vec![
                    ("from".to_string(), label(&edge.from)),
                    ("to".to_string(), label(&edge.to)),
                ];
                properties.extend(flatten_properties(&edge.properties));
                Some(Detail {
                    title: format!("{} → {}", label(&edge.from), label(&edge.to)),
                    kind: edge.kind.clone(),
                    properties,
                })
            }
        }
    }

    /// Closest node whose drawn radius (plus `slack`) contains `at`.
    pub fn node_at(&self, at: Point, slack: f64) -> Option<&Node> {
        self.snapshot
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| {
                let d = self.layout.position(i)?.distance(&at);
                (d <= node_style(&node.kind).size + slack).then_some((d, node))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, node)| node)
    }

    /// Closest drawable edge within `tolerance` of `at`.
    pub fn edge_at(&self, at: Point, tolerance: f64) -> Option<usize> {
        (0..self.snapshot.edges.len())
            .filter_map(|i| {
                let (a, b) = self.edge_endpoints(i)?;
                let d = distance_to_segment(at, a, b);
                (d <= tolerance).then_some((d, i))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, i)| i)
    }

    /// Step the node selection forward or backward through the node list.
    pub fn cycle_node(&mut self, forward: bool) -> Option<&Node> {
        let len = self.snapshot.nodes.len();
        if len == 0 {
            return None;
        }
        let current = match &self.selection {
            Selection::Node(id) => self.node_index(id),
            _ => None,
        };
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => len - 1,
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => (i + len - 1) % len,
        };
        self.selection = Selection::Node(self.snapshot.nodes[next].id.clone());
        self.snapshot.nodes.get(next)
    }

    /// Step the edge selection forward or backward through the edge list.
    pub fn cycle_edge(&mut self, forward: bool) -> Option<usize> {
        let len = self.snapshot.edges.len();
        if len == 0 {
            return None;
        }
        let next = match (&self.selection, forward) {
            (Selection::Edge(i), true) => (i + 1) % len,
            (Selection::Edge(i), false) => (i + len - 1) % len,
            (_, true) => 0,
            (_, false) => len - 1,
        };
        self.selection = Selection::Edge(next);
        Some(next)
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return p.distance(&a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    p.distance(&Point::new(a.x + t * dx, a.y + t * dy))
}
