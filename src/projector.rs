//! Derived, read-only views of the graph used by the perspectives and the
//! stats overlay. Recomputed by the store after every mutation.

use std::cmp::Ordering;

use crate::model::{ChatMessage, Edge, Node};

/// Simple world statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
	/// Entity count.
	pub nodes: usize,
	/// Relation count, dangling ones included.
	pub edges: usize,
	/// Chat log length.
	pub messages: usize,
	/// True while the world has no entities.
	pub is_empty: bool,
}

/// All projections of one graph snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Projection {
	/// Nodes carrying a `coordinates` attribute, in store order.
	pub map_eligible: Vec<Node>,
	/// Nodes carrying a `timestamp` attribute, oldest first.
	pub timeline_ordered: Vec<Node>,
	/// Size statistics.
	pub counts: Counts,
}

impl Projection {
	/// Derive every view from one snapshot.
	pub fn compute(nodes: &[Node], edges: &[Edge], messages: &[ChatMessage]) -> Self {
		Self {
			map_eligible: map_eligible(nodes),
			timeline_ordered: timeline_ordered(nodes),
			counts: Counts {
				nodes: nodes.len(),
				edges: edges.len(),
				messages: messages.len(),
				is_empty: nodes.is_empty(),
			},
		}
	}
}

/// Nodes carrying usable coordinates, in store order.
pub fn map_eligible(nodes: &[Node]) -> Vec<Node> {
	nodes.iter().filter(|n| n.has_coordinates()).cloned().collect()
}

/// Stable ascending sort on the timestamp string. Nodes without a timestamp
/// (missing, null or empty) are left out; non-string timestamps keep their
/// relative order after the rest.
pub fn timeline_ordered(nodes: &[Node]) -> Vec<Node> {
	let mut ordered: Vec<Node> = nodes.iter().filter(|n| n.has_timestamp()).cloned().collect();
	ordered.sort_by(|a, b| compare_timestamps(a.timestamp(), b.timestamp()));
	ordered
}

fn compare_timestamps(a: Option<&str>, b: Option<&str>) -> Ordering {
	match (a, b) {
		(Some(a), Some(b)) => a.cmp(b),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => Ordering::Equal,
	}
}
