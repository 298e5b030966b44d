//! Canvas rendering for the graph.
//!
//! Two passes inside one world-space transform: edges first, then nodes with
//! their labels on top. Only the abstract perspective draws anything; other
//! perspectives leave the canvas cleared.

use std::f64::consts::PI;

use web_sys::CanvasRenderingContext2d;

use super::scale::ScaleConfig;
use super::simulation::{SimLink, SimNode};
use super::state::{CanvasState, HoverTarget};
use super::theme::{Shadow, Theme};

/// Renders the complete graph to the canvas.
pub fn render(
	state: &CanvasState,
	ctx: &CanvasRenderingContext2d,
	config: &ScaleConfig,
	theme: &Theme,
) {
	ctx.clear_rect(0.0, 0.0, state.width, state.height);

	let Some(sim) = &state.simulation else {
		return;
	};

	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);

	ctx.set_line_cap("round");
	for link in sim.links() {
		let hovered = matches!(&state.hover, Some(HoverTarget::Edge(id)) if *id == link.id);
		draw_edge(ctx, sim.nodes(), link, hovered, config, theme);
	}

	for node in sim.nodes() {
		let hovered = matches!(&state.hover, Some(HoverTarget::Node(id)) if *id == node.id);
		draw_node(ctx, node, hovered, config, theme);
	}

	ctx.restore();
}

fn set_shadow(ctx: &CanvasRenderingContext2d, shadow: Option<&Shadow>) {
	match shadow {
		Some(s) => {
			ctx.set_shadow_color(&s.color.to_css());
			ctx.set_shadow_blur(s.blur);
		}
		None => {
			ctx.set_shadow_color("transparent");
			ctx.set_shadow_blur(0.0);
		}
	}
}

fn draw_edge(
	ctx: &CanvasRenderingContext2d,
	nodes: &[SimNode],
	link: &SimLink,
	hovered: bool,
	config: &ScaleConfig,
	theme: &Theme,
) {
	let (a, b) = (&nodes[link.source], &nodes[link.target]);

	ctx.begin_path();
	ctx.move_to(a.x, a.y);
	ctx.line_to(b.x, b.y);

	if hovered {
		ctx.set_stroke_style_str(&theme.edge.hovered_color.to_css());
		ctx.set_line_width(config.edge.hovered_line_width);
		set_shadow(ctx, Some(&theme.edge.hovered_shadow));
	} else {
		ctx.set_stroke_style_str(&theme.edge.color.to_css());
		ctx.set_line_width(config.edge.line_width);
		set_shadow(ctx, None);
	}
	ctx.stroke();
	set_shadow(ctx, None);
}

fn draw_node(
	ctx: &CanvasRenderingContext2d,
	node: &SimNode,
	hovered: bool,
	config: &ScaleConfig,
	theme: &Theme,
) {
	ctx.begin_path();
	let _ = ctx.arc(node.x, node.y, config.node.radius, 0.0, 2.0 * PI);

	set_shadow(ctx, hovered.then_some(&theme.node.hovered_shadow));
	ctx.set_fill_style_str(&theme.node_fill(node.kind, hovered).to_css());
	ctx.fill();

	ctx.set_stroke_style_str(&theme.node.border_color.to_css());
	ctx.set_line_width(config.node.stroke_width);
	ctx.stroke();
	set_shadow(ctx, None);

	ctx.set_fill_style_str(&theme.node.label_color.to_css());
	ctx.set_font(&config.node.label_font);
	ctx.set_text_align("center");
	ctx.set_text_baseline("middle");
	let _ = ctx.fill_text(&node.label, node.x, node.y + config.node.label_offset);
}
