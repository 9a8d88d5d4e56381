use std::collections::HashSet;

use serde_json::Value;

use super::session::ease_out_cubic;
use super::types::GraphNode;

pub const NODE_RADIUS: f64 = 10.0;
pub const HIT_RADIUS: f64 = 14.0;
pub const HOVER_RADIUS_GROWTH: f64 = 4.0;
/// Energy target held while a node is dragged.
pub const DRAG_ALPHA_TARGET: f64 = 0.3;
/// Pointer travel (screen px) below which a press counts as a click.
pub const CLICK_SLOP: f64 = 4.0;
const MAX_DETAIL_PROPERTIES: usize = 4;

#[derive(Clone, Debug, Default)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub node: Option<String>,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start_x: f64,
	pub node_start_y: f64,
	pub moved: bool,
}

impl DragState {
	pub fn active(&self) -> bool {
		self.node.is_some()
	}
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
	pub moved: bool,
}

#[derive(Clone, Debug, Default)]
pub struct HoverState {
	pub node: Option<String>,
	pub neighbors: HashSet<String>,
	pub edges: HashSet<String>,
	pub highlight_t: f64,
	pub prev_node: Option<String>,
	pub prev_neighbors: HashSet<String>,
	pub prev_edges: HashSet<String>,
	delay_t: f64,
}

impl HoverState {
	/// Hover `node`, whose incident edges are given as `(edge_id, other_end)`.
	pub fn set(&mut self, node: Option<&str>, incident: &[(&str, &str)]) {
		if self.node.as_deref() == node {
			return;
		}
		let was_hovering = self.node.is_some();

		// keep the old highlight around so it can fade out
		if was_hovering && node.is_none() {
			self.prev_node = self.node.take();
			self.prev_neighbors = std::mem::take(&mut self.neighbors);
			self.prev_edges = std::mem::take(&mut self.edges);
		} else {
			self.prev_node = None;
			self.prev_neighbors.clear();
			self.prev_edges.clear();
		}

		self.node = node.map(str::to_string);
		self.neighbors.clear();
		self.edges.clear();

		if node.is_some() {
			if !was_hovering {
				self.delay_t = 0.0;
			}
			for &(edge, other) in incident {
				self.edges.insert(edge.to_string());
				self.neighbors.insert(other.to_string());
			}
		}
	}

	pub fn tick(&mut self, dt: f64) {
		let (target, delay, speed) = if self.node.is_some() {
			(1.0, 0.08, 1.8)
		} else {
			(0.0, 0.0, 1.26)
		};

		if self.node.is_some() {
			self.delay_t = (self.delay_t + dt).min(delay);
			if self.delay_t >= delay {
				self.highlight_t += (target - self.highlight_t) * (speed * dt).min(1.0);
			}
		} else {
			self.highlight_t += (target - self.highlight_t) * (speed * dt).min(1.0);
			if self.highlight_t < 0.01 {
				self.highlight_t = 0.0;
				self.prev_node = None;
				self.prev_neighbors.clear();
				self.prev_edges.clear();
			}
		}
	}

	pub fn has_active_highlight(&self) -> bool {
		self.node.is_some() || self.prev_node.is_some()
	}

	pub fn is_hovered(&self, id: &str) -> bool {
		self.node.as_deref() == Some(id) || self.prev_node.as_deref() == Some(id)
	}

	pub fn is_highlighted(&self, id: &str) -> bool {
		self.is_hovered(id) || self.neighbors.contains(id) || self.prev_neighbors.contains(id)
	}

	pub fn is_incident(&self, edge: &str) -> bool {
		self.edges.contains(edge) || self.prev_edges.contains(edge)
	}

	/// Eased highlight progress in `[0, 1]`.
	pub fn eased(&self) -> f64 {
		ease_out_cubic(self.highlight_t.clamp(0.0, 1.0))
	}

	pub fn node_radius(&self, id: &str) -> f64 {
		if self.is_hovered(id) {
			NODE_RADIUS + HOVER_RADIUS_GROWTH * self.eased()
		} else {
			NODE_RADIUS
		}
	}

	/// Opacity multiplier for an edge: incident edges rise to full, others dim.
	pub fn edge_opacity(&self, edge: &str) -> f64 {
		let t = self.eased();
		if !self.has_active_highlight() {
			0.6
		} else if self.is_incident(edge) {
			0.6 + 0.4 * t
		} else {
			0.6 - 0.45 * t
		}
	}
}

/// Contents of the node detail panel.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDetail {
	pub id: String,
	pub label: String,
	pub node_type: String,
	pub properties: Vec<(String, String)>,
}

impl NodeDetail {
	pub fn from_node(node: &GraphNode) -> Self {
		let properties = node
			.properties
			.iter()
			.take(MAX_DETAIL_PROPERTIES)
			.map(|(key, value)| {
				let text = match value {
					Value::String(s) => s.clone(),
					other => other.to_string(),
				};
				(key.clone(), text)
			})
			.collect();
		Self {
			id: node.id.clone(),
			label: node.label.clone(),
			node_type: node.node_type.clone(),
			properties,
		}
	}
}
