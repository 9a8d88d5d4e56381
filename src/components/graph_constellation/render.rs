use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::interaction::NODE_RADIUS;
use super::state::ConstellationState;

const COLORS: &[&str] = &[
	"#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
	"#bcbd22", "#17becf",
];

pub fn node_color(type_index: usize) -> &'static str {
	COLORS[type_index % COLORS.len()]
}

pub fn render(state: &ConstellationState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str("#1a1a2e");
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);
	draw_edges(state, ctx);
	draw_nodes(state, ctx);
	ctx.restore();
}

fn draw_edges(state: &ConstellationState, ctx: &CanvasRenderingContext2d) {
	let k = state.transform.k;
	let (line_width, dash, gap, arrow_size) = (1.5 / k, 8.0 / k, 4.0 / k, 8.0 / k);
	let dash_offset = -(state.flow_time * 30.0) % (dash + gap);
	let layout = state.session.layout();
	let positions = layout.positions();

	for edge in layout.visible_edges() {
		let Some(visual) = state.session.edge_visual(&edge.id) else {
			continue;
		};
		let (Some(&(x1, y1)), Some(&(x2, y2))) =
			(positions.get(&edge.source), positions.get(&edge.target))
		else {
			continue;
		};
		// entrance: the edge grows from its source
		let (x2, y2) = (x1 + (x2 - x1) * visual.scale, y1 + (y2 - y1) * visual.scale);
		let (dx, dy) = (x2 - x1, y2 - y1);
		let dist = (dx * dx + dy * dy).sqrt();
		if dist < NODE_RADIUS * 2.0 + arrow_size {
			continue;
		}

		let alpha = visual.opacity * state.hover.edge_opacity(&edge.id);
		ctx.set_stroke_style_str(&format!("rgba(100, 180, 255, {})", alpha));
		ctx.set_line_width(line_width);
		let _ = ctx.set_line_dash(&js_sys::Array::of2(
			&JsValue::from_f64(dash),
			&JsValue::from_f64(gap),
		));
		ctx.set_line_dash_offset(dash_offset);

		let (ux, uy) = (dx / dist, dy / dist);
		ctx.begin_path();
		ctx.move_to(x1 + ux * NODE_RADIUS, y1 + uy * NODE_RADIUS);
		ctx.line_to(
			x2 - ux * (NODE_RADIUS + arrow_size),
			y2 - uy * (NODE_RADIUS + arrow_size),
		);
		ctx.stroke();

		let _ = ctx.set_line_dash(&js_sys::Array::new());
		ctx.set_fill_style_str(&format!("rgba(100, 180, 255, {})", (alpha + 0.2).min(1.0)));
		let (tip_x, tip_y) = (x2 - ux * NODE_RADIUS, y2 - uy * NODE_RADIUS);
		let (back_x, back_y) = (tip_x - ux * arrow_size, tip_y - uy * arrow_size);
		let (px, py) = (-uy * arrow_size * 0.5, ux * arrow_size * 0.5);
		ctx.begin_path();
		ctx.move_to(tip_x, tip_y);
		ctx.line_to(back_x + px, back_y + py);
		ctx.line_to(back_x - px, back_y - py);
		ctx.close_path();
		ctx.fill();

		if state.settings.show_edge_labels {
			if let Some(rel) = state.session.document().relationship(&edge.id) {
				ctx.set_fill_style_str(&format!("rgba(180, 210, 255, {})", alpha));
				ctx.set_font(&format!("{}px sans-serif", 9.0 / k.max(0.5)));
				let _ = ctx.fill_text(&rel.rel_type, (x1 + x2) / 2.0, (y1 + y2) / 2.0 - 3.0 / k);
			}
		}
	}
	let _ = ctx.set_line_dash(&js_sys::Array::new());
}

fn draw_nodes(state: &ConstellationState, ctx: &CanvasRenderingContext2d) {
	let (has_highlight, t, k) = (
		state.hover.has_active_highlight(),
		state.hover.eased(),
		state.transform.k,
	);
	let doc = state.session.document();
	let layout = state.session.layout();
	let selected = state.selected.as_ref().map(|d| d.id.as_str());

	for (id, (x, y)) in layout.positions() {
		let (Some(visual), Some(node)) = (state.session.node_visual(&id), doc.node(&id)) else {
			continue;
		};
		let dimmed = has_highlight && !state.hover.is_highlighted(&id);
		let alpha = visual.opacity * if dimmed { 1.0 - 0.7 * t } else { 1.0 };
		let radius = state.hover.node_radius(&id) * visual.scale;
		if radius <= 0.0 {
			continue;
		}
		let color = node_color(doc.type_index(&node.node_type));

		if state.hover.is_hovered(&id) && t > 0.01 {
			let glow_radius = radius * (1.8 + 1.2 * t);
			if let Ok(gradient) = ctx.create_radial_gradient(x, y, radius * 0.3, x, y, glow_radius) {
				let _ = gradient.add_color_stop(0.0, &format!("rgba(255, 255, 255, {})", 0.35 * t));
				let _ = gradient.add_color_stop(0.6, &format!("rgba(200, 220, 255, {})", 0.1 * t));
				let _ = gradient.add_color_stop(1.0, "rgba(255, 255, 255, 0)");
				ctx.begin_path();
				let _ = ctx.arc(x, y, glow_radius, 0.0, 2.0 * PI);
				#[allow(deprecated)]
				ctx.set_fill_style(&gradient);
				ctx.fill();
			}
		}

		ctx.set_global_alpha(alpha);
		ctx.begin_path();
		let _ = ctx.arc(x, y, radius, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(color);
		ctx.fill();

		if layout.is_pinned(&id) || selected == Some(id.as_str()) {
			ctx.begin_path();
			let _ = ctx.arc(x, y, radius + 2.0 / k, 0.0, 2.0 * PI);
			ctx.set_stroke_style_str(if selected == Some(id.as_str()) {
				"#ffd166"
			} else {
				"rgba(255, 255, 255, 0.5)"
			});
			ctx.set_line_width(1.5 / k);
			ctx.stroke();
		}
		ctx.set_global_alpha(1.0);

		if state.settings.show_node_labels {
			ctx.set_fill_style_str(&format!("rgba(255, 255, 255, {})", alpha * 0.9));
			ctx.set_font(&format!("{}px sans-serif", 11.0 / k.max(0.5)));
			let _ = ctx.fill_text(&node.label, x + radius + 3.0, y + 3.0);
		}
	}
}
