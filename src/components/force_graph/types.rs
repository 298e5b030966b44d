//! Input to the graph canvas.

use crate::model::{Edge, Node, PerspectiveType};

/// What the canvas shows: the store graph plus the active perspective.
///
/// Edges may reference missing nodes; the canvas skips them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphView {
	/// Entities to lay out.
	pub nodes: Vec<Node>,
	/// Relations between them.
	pub edges: Vec<Edge>,
	/// Only the abstract perspective is drawn.
	pub perspective: PerspectiveType,
}
