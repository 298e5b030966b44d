//! Geometry constants for drawing and hit-testing.
//!
//! All sizes are world-space: they are drawn after the canvas transform, so
//! they grow and shrink with the zoom level.

/// Node geometry.
#[derive(Clone, Debug)]
pub struct NodeScaleConfig {
	/// Circle radius.
	pub radius: f64,
	/// Pointer distance that counts as hovering a node.
	pub hit_radius: f64,
	/// White outline width.
	pub stroke_width: f64,
	/// Label baseline offset below the node center.
	pub label_offset: f64,
	/// CSS font of node labels.
	pub label_font: String,
}

/// Edge geometry.
#[derive(Clone, Debug)]
pub struct EdgeScaleConfig {
	/// Stroke width at rest.
	pub line_width: f64,
	/// Stroke width while hovered.
	pub hovered_line_width: f64,
	/// Pointer distance from the segment that counts as hovering an edge.
	pub hit_tolerance: f64,
}

/// Complete scale configuration for all graph elements.
#[derive(Clone, Debug)]
pub struct ScaleConfig {
	/// Node geometry.
	pub node: NodeScaleConfig,
	/// Edge geometry.
	pub edge: EdgeScaleConfig,
	/// Smallest zoom factor.
	pub min_zoom: f64,
	/// Largest zoom factor.
	pub max_zoom: f64,
	/// Zoom multiplier per wheel notch.
	pub wheel_step: f64,
}

impl Default for ScaleConfig {
	fn default() -> Self {
		Self {
			node: NodeScaleConfig {
				radius: 20.0,
				hit_radius: 20.0,
				stroke_width: 2.0,
				label_offset: 35.0,
				label_font: "12px sans-serif".to_string(),
			},
			edge: EdgeScaleConfig {
				line_width: 2.0,
				hovered_line_width: 4.0,
				hit_tolerance: 5.0,
			},
			min_zoom: 0.1,
			max_zoom: 8.0,
			wheel_step: 1.1,
		}
	}
}

impl ScaleConfig {
	/// Zoom factor for a wheel event: in for negative deltas, out otherwise.
	pub fn wheel_factor(&self, delta_y: f64) -> f64 {
		if delta_y > 0.0 {
			1.0 / self.wheel_step
		} else {
			self.wheel_step
		}
	}
}
