//! Canvas-side state: the simulation for the abstract perspective, the
//! pan/zoom transform and the hover target.

use crate::model::PerspectiveType;

use super::scale::ScaleConfig;
use super::simulation::Simulation;
use super::types::GraphView;

/// Pan and zoom transform applied to the entire graph view.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewTransform {
	/// Horizontal translation in screen pixels.
	pub x: f64,
	/// Vertical translation in screen pixels.
	pub y: f64,
	/// Zoom factor, clamped to `ScaleConfig::min_zoom..=max_zoom`.
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self {
			x: 0.0,
			y: 0.0,
			k: 1.0,
		}
	}
}

impl ViewTransform {
	/// Inverse of the canvas transform.
	pub fn screen_to_world(&self, sx: f64, sy: f64) -> (f64, f64) {
		((sx - self.x) / self.k, (sy - self.y) / self.k)
	}

	/// Scale by `factor` keeping the world point under `(sx, sy)` fixed.
	pub fn zoom_at(&mut self, sx: f64, sy: f64, factor: f64, config: &ScaleConfig) {
		let new_k = (self.k * factor).clamp(config.min_zoom, config.max_zoom);
		let ratio = new_k / self.k;
		self.x = sx - (sx - self.x) * ratio;
		self.y = sy - (sy - self.y) * ratio;
		self.k = new_k;
	}
}

/// Tracks an in-progress background drag.
#[derive(Clone, Debug, Default)]
pub struct PanState {
	/// A drag is in progress.
	pub active: bool,
	/// Pointer x where the drag began.
	pub start_x: f64,
	/// Pointer y where the drag began.
	pub start_y: f64,
	/// Transform x when the drag began.
	pub transform_start_x: f64,
	/// Transform y when the drag began.
	pub transform_start_y: f64,
}

/// What the pointer is over. Local to the canvas; never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HoverTarget {
	/// Node id.
	Node(String),
	/// Edge id.
	Edge(String),
}

/// Everything the renderer reads.
pub struct CanvasState {
	/// Present only while the abstract perspective is shown.
	pub simulation: Option<Simulation>,
	/// Pan and zoom.
	pub transform: ViewTransform,
	/// Background drag.
	pub pan: PanState,
	/// Element under the pointer.
	pub hover: Option<HoverTarget>,
	/// Canvas width in pixels.
	pub width: f64,
	/// Canvas height in pixels.
	pub height: f64,
	/// Set when something visible changed since the last frame.
	pub dirty: bool,
	view: GraphView,
}

impl CanvasState {
	/// Blank state for a canvas of the given size.
	pub fn new(width: f64, height: f64) -> Self {
		Self {
			simulation: None,
			transform: ViewTransform::default(),
			pan: PanState::default(),
			hover: None,
			width,
			height,
			dirty: true,
			view: GraphView::default(),
		}
	}

	/// Apply a new store view. The simulation is created when the abstract
	/// perspective becomes active, dropped when it goes away, and otherwise
	/// reconciled only if the graph itself changed.
	pub fn sync(&mut self, view: &GraphView) {
		let graph_changed = self.view.nodes != view.nodes || self.view.edges != view.edges;
		let perspective_changed = self.view.perspective != view.perspective;
		if !graph_changed && !perspective_changed {
			return;
		}
		self.view = view.clone();

		if view.perspective != PerspectiveType::Abstract {
			if self.simulation.take().is_some() {
				log::debug!("tapestry: stopped simulation for {} view", view.perspective);
			}
			self.hover = None;
			self.dirty = true;
			return;
		}

		let (width, height) = (self.width, self.height);
		self.simulation
			.get_or_insert_with(|| Simulation::new(width, height))
			.reconcile(&view.nodes, &view.edges);
		if let Some(target) = &self.hover {
			if !self.target_exists(target) {
				self.hover = None;
			}
		}
		self.dirty = true;
	}

	fn target_exists(&self, target: &HoverTarget) -> bool {
		let Some(sim) = &self.simulation else {
			return false;
		};
		match target {
			HoverTarget::Node(id) => sim.node(id).is_some(),
			HoverTarget::Edge(id) => sim.links().iter().any(|l| &l.id == id),
		}
	}

	/// Follow a canvas resize; re-centers and reheats the simulation.
	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
		if let Some(sim) = &mut self.simulation {
			sim.resize(width, height);
		}
		self.dirty = true;
	}

	/// Step the simulation if it is still warm. Returns whether it moved.
	pub fn tick(&mut self) -> bool {
		match &mut self.simulation {
			Some(sim) if !sim.is_settled() => {
				sim.tick();
				self.dirty = true;
				true
			}
			_ => false,
		}
	}

	/// Whether more frames are needed for the layout to settle.
	pub fn is_animating(&self) -> bool {
		self.simulation.as_ref().is_some_and(|s| !s.is_settled())
	}

	/// Node under the screen point, else the first edge within tolerance.
	pub fn hit_test(&self, sx: f64, sy: f64, config: &ScaleConfig) -> Option<HoverTarget> {
		let sim = self.simulation.as_ref()?;
		let (wx, wy) = self.transform.screen_to_world(sx, sy);

		let r2 = config.node.hit_radius * config.node.hit_radius;
		if let Some(node) = sim
			.nodes()
			.iter()
			.find(|n| (n.x - wx).powi(2) + (n.y - wy).powi(2) < r2)
		{
			return Some(HoverTarget::Node(node.id.clone()));
		}

		let nodes = sim.nodes();
		sim.links()
			.iter()
			.find(|link| {
				let (a, b) = (&nodes[link.source], &nodes[link.target]);
				segment_distance(wx, wy, a.x, a.y, b.x, b.y) < config.edge.hit_tolerance
			})
			.map(|link| HoverTarget::Edge(link.id.clone()))
	}

	/// Update hover from a pointer position; marks dirty when it changed.
	pub fn set_hover_at(&mut self, sx: f64, sy: f64, config: &ScaleConfig) {
		let hover = self.hit_test(sx, sy, config);
		if hover != self.hover {
			self.hover = hover;
			self.dirty = true;
		}
	}

	/// Pointer left the canvas.
	pub fn clear_hover(&mut self) {
		if self.hover.take().is_some() {
			self.dirty = true;
		}
	}
}

/// Distance from `(px, py)` to the segment `a..b`, projection clamped.
pub fn segment_distance(px: f64, py: f64, ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
	let (dx, dy) = (bx - ax, by - ay);
	let len2 = dx * dx + dy * dy;
	let t = if len2 == 0.0 {
		0.0
	} else {
		(((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0)
	};
	let (cx, cy) = (ax + t * dx, ay + t * dy);
	((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}
