//! Colors and visual style for the graph canvas.

use crate::model::NodeType;

/// RGBA color representation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
	/// Red channel.
	pub r: u8,
	/// Green channel.
	pub g: u8,
	/// Blue channel.
	pub b: u8,
	/// Alpha, 0 to 1.
	pub a: f64,
}

impl Color {
	/// Opaque color.
	pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
		Self { r, g, b, a: 1.0 }
	}

	/// Color with alpha.
	pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
		Self { r, g, b, a }
	}

	/// Brighten by `k` steps of 1/0.7 per channel, saturating at 255.
	pub fn brighter(self, k: f64) -> Self {
		let f = (1.0 / 0.7f64).powf(k);
		let scale = |c: u8| (c as f64 * f).round().min(255.0) as u8;
		Self {
			r: scale(self.r),
			g: scale(self.g),
			b: scale(self.b),
			a: self.a,
		}
	}

	/// Hex when opaque, `rgba(...)` otherwise.
	pub fn to_css(self) -> String {
		if (self.a - 1.0).abs() < 0.001 {
			format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
		} else {
			format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
		}
	}
}

/// Fill color per node type.
#[derive(Clone, Debug)]
pub struct TypePalette {
	/// [`NodeType::Person`].
	pub person: Color,
	/// [`NodeType::Place`].
	pub place: Color,
	/// [`NodeType::Event`].
	pub event: Color,
	/// [`NodeType::Thing`].
	pub thing: Color,
	/// Any other type.
	pub unknown: Color,
}

impl Default for TypePalette {
	fn default() -> Self {
		Self {
			person: Color::rgb(0xff, 0x7f, 0x0e),
			place: Color::rgb(0x2c, 0xa0, 0x2c),
			event: Color::rgb(0xd6, 0x27, 0x28),
			thing: Color::rgb(0x1f, 0x77, 0xb4),
			unknown: Color::rgb(0x94, 0x67, 0xbd),
		}
	}
}

impl TypePalette {
	/// Fill for `kind`.
	pub fn color(&self, kind: NodeType) -> Color {
		match kind {
			NodeType::Person => self.person,
			NodeType::Place => self.place,
			NodeType::Event => self.event,
			NodeType::Thing => self.thing,
			NodeType::Unknown => self.unknown,
		}
	}
}

/// A drop shadow for hovered elements.
#[derive(Clone, Debug)]
pub struct Shadow {
	/// Shadow color.
	pub color: Color,
	/// Blur radius in pixels.
	pub blur: f64,
}

/// Edge visual style.
#[derive(Clone, Debug)]
pub struct EdgeStyle {
	/// Stroke at rest.
	pub color: Color,
	/// Stroke while hovered.
	pub hovered_color: Color,
	/// Shadow while hovered.
	pub hovered_shadow: Shadow,
}

/// Node visual style.
#[derive(Clone, Debug)]
pub struct NodeStyle {
	/// Outline color.
	pub border_color: Color,
	/// Label text color.
	pub label_color: Color,
	/// Shadow while hovered.
	pub hovered_shadow: Shadow,
	/// `brighter` steps applied to a hovered node's fill.
	pub hovered_brighten: f64,
}

/// Complete visual theme.
#[derive(Clone, Debug)]
pub struct Theme {
	/// Node fills.
	pub palette: TypePalette,
	/// Edge style.
	pub edge: EdgeStyle,
	/// Node style.
	pub node: NodeStyle,
}

impl Default for Theme {
	fn default() -> Self {
		Self {
			palette: TypePalette::default(),
			edge: EdgeStyle {
				color: Color::rgb(0x99, 0x99, 0x99),
				hovered_color: Color::rgb(0x55, 0x55, 0x55),
				hovered_shadow: Shadow {
					color: Color::rgba(0, 0, 0, 0.3),
					blur: 4.0,
				},
			},
			node: NodeStyle {
				border_color: Color::rgb(255, 255, 255),
				label_color: Color::rgb(0, 0, 0),
				hovered_shadow: Shadow {
					color: Color::rgba(0, 0, 0, 0.5),
					blur: 10.0,
				},
				hovered_brighten: 0.5,
			},
		}
	}
}

impl Theme {
	/// Fill for a node, brightened while hovered.
	pub fn node_fill(&self, kind: NodeType, hovered: bool) -> Color {
		let base = self.palette.color(kind);
		if hovered {
			base.brighter(self.node.hovered_brighten)
		} else {
			base
		}
	}
}
