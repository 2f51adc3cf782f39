pub mod layout;
pub mod palette;
pub mod snapshot;
pub mod view;

pub use layout::{ForceLayout, PhysicsParams, Point};
pub use palette::{edge_style, node_style, EdgeStyle, NodeShape, NodeStyle, Rgb};
pub use snapshot::{flatten_properties, Edge, GraphSnapshot, Node, PropertyMap, PropertyValue};
pub use view::{Detail, GraphView, Selection};
