//! Fixed mapping from node and edge types to visual attributes.
//!
//! Every type resolves to a style; unknown types get the default entry so
//! nothing is ever dropped from the view.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn hex(value: u32) -> Self {
        Rgb((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    Dot,
    Circle,
    Square,
    Diamond,
    Triangle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeStyle {
    pub color: Rgb,
    pub shape: NodeShape,
    /// Radius in layout units
    pub size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeStyle {
    pub color: Rgb,
    pub highlight: Rgb,
}

pub const DEFAULT_NODE_STYLE: NodeStyle = NodeStyle {
    color: Rgb::hex(0x94A3B8),
    shape: NodeShape::Circle,
    size: 14.0,
};

pub const DEFAULT_EDGE_STYLE: EdgeStyle = EdgeStyle {
    color: Rgb::hex(0x64748B),
    highlight: Rgb::hex(0xCBD5E1),
};

pub const LABEL_COLOR: Rgb = Rgb::hex(0xFFFFFF);
pub const EDGE_LABEL_COLOR: Rgb = Rgb::hex(0xCBD5E1);

pub fn node_style(kind: &str) -> NodeStyle {
    match kind {
        "Document" => NodeStyle {
            color: Rgb::hex(0x3B82F6),
            shape: NodeShape::Dot,
            size: 20.0,
        },
        "Chunk" => NodeStyle {
            color: Rgb::hex(0x10B981),
            shape: NodeShape::Circle,
            size: 16.0,
        },
        "Entity" => NodeStyle {
            color: Rgb::hex(0xF59E0B),
            shape: NodeShape::Diamond,
            size: 18.0,
        },
        "Concept" | "Topic" => NodeStyle {
            color: Rgb::hex(0x8B5CF6),
            shape: NodeShape::Square,
            size: 16.0,
        },
        "Person" | "Organization" => NodeStyle {
            color: Rgb::hex(0xEC4899),
            shape: NodeShape::Triangle,
            size: 16.0,
        },
        _ => DEFAULT_NODE_STYLE,
    }
}

pub fn edge_style(kind: &str) -> EdgeStyle {
    match kind {
        "CONTAINS" => EdgeStyle {
            color: Rgb::hex(0x60A5FA),
            highlight: Rgb::hex(0x93C5FD),
        },
        "MENTIONS" => EdgeStyle {
            color: Rgb::hex(0xF472B6),
            highlight: Rgb::hex(0xFBCFE8),
        },
        "RELATED_TO" | "SIMILAR_TO" => EdgeStyle {
            color: Rgb::hex(0xA78BFA),
            highlight: Rgb::hex(0xDDD6FE),
        },
        "NEXT" => EdgeStyle {
            color: Rgb::hex(0x34D399),
            highlight: Rgb::hex(0xA7F3D0),
        },
        _ => DEFAULT_EDGE_STYLE,
    }
}
