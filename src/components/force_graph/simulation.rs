//! Velocity-Verlet force simulation with alpha cooling.
//!
//! Nodes live in an arena indexed by position, with an id lookup table so the
//! store's graph can be reconciled in place: known ids keep their position
//! and velocity, new ids are placed on a phyllotaxis spiral around the
//! viewport center, vanished ids are dropped.
//!
//! Each tick applies, in order: link springs, many-body charge, x/y
//! centering and collision, then integrates with velocity decay.

use std::collections::HashMap;
use std::f64::consts::PI;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::model::{Edge, Node, NodeType};

/// Tunable physics constants.
#[derive(Clone, Debug)]
pub struct SimulationParameters {
	/// Rest length of link springs.
	pub link_distance: f64,
	/// Many-body strength; negative repels.
	pub charge_strength: f64,
	/// Pull toward the viewport center on each axis.
	pub center_strength: f64,
	/// Collision radius per node.
	pub collide_radius: f64,
	/// How much of an overlap is resolved per tick.
	pub collide_strength: f64,
	/// Fraction of velocity lost per tick.
	pub velocity_decay: f64,
	/// The simulation is settled once alpha drops below this.
	pub alpha_min: f64,
	/// Per-tick alpha decay rate.
	pub alpha_decay: f64,
}

impl Default for SimulationParameters {
	fn default() -> Self {
		let alpha_min: f64 = 0.001;
		Self {
			link_distance: 100.0,
			charge_strength: -300.0,
			center_strength: 0.05,
			collide_radius: 30.0,
			collide_strength: 1.0,
			velocity_decay: 0.4,
			alpha_min,
			// Cools from 1 to alpha_min in 300 ticks.
			alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
		}
	}
}

/// Physical record for one graph node.
#[derive(Clone, Debug, PartialEq)]
pub struct SimNode {
	/// Graph node id.
	pub id: String,
	/// Label drawn under the node.
	pub label: String,
	/// Category, picks the fill color.
	pub kind: NodeType,
	/// World position.
	pub x: f64,
	/// World position.
	pub y: f64,
	/// Velocity.
	pub vx: f64,
	/// Velocity.
	pub vy: f64,
}

/// A link whose endpoints both exist in the arena.
#[derive(Clone, Debug, PartialEq)]
pub struct SimLink {
	/// Graph edge id.
	pub id: String,
	/// Relation label.
	pub predicate: String,
	/// Arena index of the source node.
	pub source: usize,
	/// Arena index of the target node.
	pub target: usize,
	strength: f64,
	bias: f64,
}

/// Force layout for one graph. Owns its physical records; callers feed it
/// the store graph through [`Simulation::reconcile`] and read positions back.
pub struct Simulation {
	params: SimulationParameters,
	nodes: Vec<SimNode>,
	index: HashMap<String, usize>,
	links: Vec<SimLink>,
	alpha: f64,
	width: f64,
	height: f64,
	rng: SmallRng,
}

impl Simulation {
	/// Empty simulation centered in a `width` by `height` viewport.
	pub fn new(width: f64, height: f64) -> Self {
		Self::with_parameters(SimulationParameters::default(), width, height)
	}

	/// Like [`Simulation::new`] with custom physics.
	pub fn with_parameters(params: SimulationParameters, width: f64, height: f64) -> Self {
		Self {
			params,
			nodes: Vec::new(),
			index: HashMap::new(),
			links: Vec::new(),
			alpha: 1.0,
			width,
			height,
			rng: SmallRng::seed_from_u64(0x7a9e_5771),
		}
	}

	/// Physical nodes in arena order.
	pub fn nodes(&self) -> &[SimNode] {
		&self.nodes
	}

	/// Links between existing nodes.
	pub fn links(&self) -> &[SimLink] {
		&self.links
	}

	/// Look up a node by graph id.
	pub fn node(&self, id: &str) -> Option<&SimNode> {
		self.index.get(id).map(|&i| &self.nodes[i])
	}

	/// Current temperature, 1 when hot.
	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	/// Cooled below `alpha_min`; ticking no longer moves anything visibly.
	pub fn is_settled(&self) -> bool {
		self.alpha < self.params.alpha_min
	}

	/// Point the centering forces pull toward.
	pub fn center(&self) -> (f64, f64) {
		(self.width / 2.0, self.height / 2.0)
	}

	/// Restart cooling from alpha 1.
	pub fn reheat(&mut self) {
		self.alpha = 1.0;
	}

	/// Bring the arena in line with `nodes`/`edges` and reheat.
	///
	/// Edges referencing unknown node ids are skipped.
	pub fn reconcile(&mut self, nodes: &[Node], edges: &[Edge]) {
		let (cx, cy) = self.center();
		let mut previous = std::mem::take(&mut self.nodes);
		let mut arena = Vec::with_capacity(nodes.len());
		let mut index = HashMap::with_capacity(nodes.len());

		for (i, node) in nodes.iter().enumerate() {
			if index.contains_key(&node.id) {
				continue;
			}
			let kept = self
				.index
				.get(&node.id)
				.map(|&old| std::mem::replace(&mut previous[old], placeholder()));
			let record = match kept {
				Some(mut record) => {
					record.label = node.label.clone();
					record.kind = node.kind;
					record
				}
				None => {
					let (x, y) = phyllotaxis(i, cx, cy);
					SimNode {
						id: node.id.clone(),
						label: node.label.clone(),
						kind: node.kind,
						x,
						y,
						vx: 0.0,
						vy: 0.0,
					}
				}
			};
			index.insert(node.id.clone(), arena.len());
			arena.push(record);
		}

		self.nodes = arena;
		self.index = index;
		self.rebuild_links(edges);
		self.reheat();
	}

	fn rebuild_links(&mut self, edges: &[Edge]) {
		let mut links: Vec<SimLink> = edges
			.iter()
			.filter_map(|edge| {
				let source = *self.index.get(&edge.source_id)?;
				let target = *self.index.get(&edge.target_id)?;
				Some(SimLink {
					id: edge.id.clone(),
					predicate: edge.predicate.clone(),
					source,
					target,
					strength: 0.0,
					bias: 0.0,
				})
			})
			.collect();

		let mut degree = vec![0usize; self.nodes.len()];
		for link in &links {
			degree[link.source] += 1;
			degree[link.target] += 1;
		}
		for link in &mut links {
			let (s, t) = (degree[link.source] as f64, degree[link.target] as f64);
			link.strength = 1.0 / s.min(t);
			link.bias = s / (s + t);
		}
		self.links = links;
	}

	/// Follow a viewport resize: move the centering target and reheat.
	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
		self.reheat();
	}

	/// Advance one step.
	pub fn tick(&mut self) {
		self.alpha += (0.0 - self.alpha) * self.params.alpha_decay;

		self.apply_links();
		self.apply_charge();
		self.apply_centering();
		self.apply_collision();

		let keep = 1.0 - self.params.velocity_decay;
		for node in &mut self.nodes {
			node.vx *= keep;
			node.vy *= keep;
			node.x += node.vx;
			node.y += node.vy;
		}
	}

	fn jiggle(&mut self) -> f64 {
		(self.rng.r#gen::<f64>() - 0.5) * 1e-6
	}

	fn apply_links(&mut self) {
		let distance = self.params.link_distance;
		for i in 0..self.links.len() {
			let (s, t, strength, bias) = {
				let l = &self.links[i];
				(l.source, l.target, l.strength, l.bias)
			};
			let (src, tgt) = (&self.nodes[s], &self.nodes[t]);
			let mut x = tgt.x + tgt.vx - src.x - src.vx;
			let mut y = tgt.y + tgt.vy - src.y - src.vy;
			if x == 0.0 {
				x = self.jiggle();
			}
			if y == 0.0 {
				y = self.jiggle();
			}
			let len = (x * x + y * y).sqrt();
			let f = (len - distance) / len * self.alpha * strength;
			let (x, y) = (x * f, y * f);

			let tgt = &mut self.nodes[t];
			tgt.vx -= x * bias;
			tgt.vy -= y * bias;
			let src = &mut self.nodes[s];
			src.vx += x * (1.0 - bias);
			src.vy += y * (1.0 - bias);
		}
	}

	fn apply_charge(&mut self) {
		let n = self.nodes.len();
		let strength = self.params.charge_strength * self.alpha;
		for i in 0..n {
			for j in 0..n {
				if i == j {
					continue;
				}
				let mut x = self.nodes[j].x - self.nodes[i].x;
				let mut y = self.nodes[j].y - self.nodes[i].y;
				let mut l = x * x + y * y;
				if x == 0.0 {
					x = self.jiggle();
					l += x * x;
				}
				if y == 0.0 {
					y = self.jiggle();
					l += y * y;
				}
				if l < 1.0 {
					l = l.sqrt();
				}
				let w = strength / l;
				let node = &mut self.nodes[i];
				node.vx += x * w;
				node.vy += y * w;
			}
		}
	}

	fn apply_centering(&mut self) {
		let (cx, cy) = self.center();
		let k = self.params.center_strength * self.alpha;
		for node in &mut self.nodes {
			node.vx += (cx - node.x) * k;
			node.vy += (cy - node.y) * k;
		}
	}

	fn apply_collision(&mut self) {
		let n = self.nodes.len();
		let r = self.params.collide_radius * 2.0;
		let strength = self.params.collide_strength;
		for i in 0..n {
			for j in (i + 1)..n {
				let (a, b) = (&self.nodes[i], &self.nodes[j]);
				let mut x = (a.x + a.vx) - (b.x + b.vx);
				let mut y = (a.y + a.vy) - (b.y + b.vy);
				let mut l = x * x + y * y;
				if l >= r * r {
					continue;
				}
				if x == 0.0 {
					x = self.jiggle();
					l += x * x;
				}
				if y == 0.0 {
					y = self.jiggle();
					l += y * y;
				}
				let len = l.sqrt();
				let f = (r - len) / len * strength * 0.5;
				let (x, y) = (x * f, y * f);

				let a = &mut self.nodes[i];
				a.vx += x;
				a.vy += y;
				let b = &mut self.nodes[j];
				b.vx -= x;
				b.vy -= y;
			}
		}
	}
}

fn placeholder() -> SimNode {
	SimNode {
		id: String::new(),
		label: String::new(),
		kind: NodeType::Unknown,
		x: 0.0,
		y: 0.0,
		vx: 0.0,
		vy: 0.0,
	}
}

/// Initial spot for the `i`-th node: golden-angle spiral around the center.
fn phyllotaxis(i: usize, cx: f64, cy: f64) -> (f64, f64) {
	let radius = 10.0 * (0.5 + i as f64).sqrt();
	let angle = i as f64 * PI * (3.0 - 5f64.sqrt());
	(cx + radius * angle.cos(), cy + radius * angle.sin())
}
