//! Force layout engine.
//!
//! `force_graph` integrates charge repulsion, edge springs and damping. On top
//! of each integration step this module runs the position passes the physics
//! crate lacks: link target distance, centering, collision and pin
//! enforcement. Energy is tracked as `alpha`, which decays geometrically
//! toward `alpha_target`; the engine stops integrating once it settles.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::f64::consts::PI;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};
use log::debug;
use thiserror::Error;

use super::config::LayoutParams;
use super::types::Position;

/// Energy a running simulation is raised to when elements are added.
pub const GROWTH_ALPHA: f64 = 0.3;
/// Distance between a seeded node and the centroid of its neighbours.
const SEED_OFFSET: f64 = 40.0;
const SEED_RADIUS: f64 = 100.0;
const GOLDEN_ANGLE: f64 = PI * (3.0 - 2.236_067_977_499_79);

#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
	#[error("edge `{edge}` references node `{node}` which is not in the layout")]
	MissingEndpoint { edge: String, node: String },
	#[error("unknown node `{0}`")]
	UnknownNode(String),
}

#[derive(Clone, Debug, Default)]
pub struct NodeInfo {
	pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutEdge {
	pub id: String,
	pub source: String,
	pub target: String,
}

/// Snapshot of one node used by the position passes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
	pub x: f64,
	pub y: f64,
	pub pinned: bool,
}

pub struct ForceLayout {
	graph: ForceGraph<NodeInfo, ()>,
	params: LayoutParams,
	width: f64,
	height: f64,
	alpha: f64,
	alpha_target: f64,
	index: HashMap<String, DefaultNodeIdx>,
	hidden_nodes: HashSet<String>,
	hidden_edges: HashSet<String>,
	pins: HashMap<String, (f64, f64)>,
	edges: Vec<LayoutEdge>,
}

impl ForceLayout {
	pub fn new(params: LayoutParams, width: f64, height: f64) -> Self {
		let graph = ForceGraph::new(SimulationParameters {
			force_charge: params.force_charge,
			force_spring: params.force_spring,
			force_max: params.force_max,
			node_speed: params.node_speed,
			damping_factor: params.damping_factor,
		});
		Self {
			graph,
			params,
			width,
			height,
			alpha: 1.0,
			alpha_target: 0.0,
			index: HashMap::new(),
			hidden_nodes: HashSet::new(),
			hidden_edges: HashSet::new(),
			pins: HashMap::new(),
			edges: Vec::new(),
		}
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}

	pub fn center(&self) -> (f64, f64) {
		(self.width / 2.0, self.height / 2.0)
	}

	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	pub fn alpha_target(&self) -> f64 {
		self.alpha_target
	}

	pub fn set_alpha_target(&mut self, target: f64) {
		self.alpha_target = target;
	}

	/// Raise energy to at least `min_alpha` without resetting a hotter simulation.
	pub fn reheat(&mut self, min_alpha: f64) {
		self.alpha = self.alpha.max(min_alpha);
	}

	pub fn is_settled(&self) -> bool {
		self.alpha < self.params.alpha_min && self.alpha_target < self.params.alpha_min
	}

	pub fn node_count(&self) -> usize {
		self.index.len()
	}

	pub fn contains_node(&self, id: &str) -> bool {
		self.index.contains_key(id)
	}

	pub fn has_visible_node(&self, id: &str) -> bool {
		self.index.contains_key(id) && !self.hidden_nodes.contains(id)
	}

	pub fn has_edge(&self, id: &str) -> bool {
		self.edges.iter().any(|e| e.id == id)
	}

	/// Add a node into the (possibly running) simulation.
	///
	/// Positions of nodes already in the layout are restored after insertion so
	/// a settled layout is not disturbed; energy is only nudged to
	/// [`GROWTH_ALPHA`]. Re-adding a known id just makes it visible again.
	pub fn add_node(&mut self, id: &str, position: Option<Position>, neighbours: &[&str]) {
		if self.index.contains_key(id) {
			self.hidden_nodes.remove(id);
			return;
		}
		let (x, y) = self.seed_position(position, neighbours);

		// force_graph keeps node velocities private, so only positions are
		// snapshotted; insertion never resets them.
		let mut snapshot = HashMap::new();
		self.graph.visit_nodes(|node| {
			snapshot.insert(node.index(), (node.data.x, node.data.y));
		});

		let pinned = position.is_some_and(|p| p.fixed);
		let idx = self.graph.add_node(NodeData {
			x: x as f32,
			y: y as f32,
			mass: 10.0,
			is_anchor: pinned,
			user_data: NodeInfo { id: id.to_string() },
		});

		self.graph.visit_nodes_mut(|node| {
			if let Some(&(sx, sy)) = snapshot.get(&node.index()) {
				node.data.x = sx;
				node.data.y = sy;
			}
		});

		self.index.insert(id.to_string(), idx);
		if pinned {
			self.pins.insert(id.to_string(), (x, y));
		}
		self.reheat(GROWTH_ALPHA);
		debug!("layout: added node {} at ({:.1}, {:.1})", id, x, y);
	}

	/// Connect two visible nodes. Fails without touching the layout when an
	/// endpoint is absent or hidden.
	pub fn add_edge(&mut self, id: &str, source: &str, target: &str) -> Result<(), LayoutError> {
		if self.has_edge(id) {
			self.hidden_edges.remove(id);
			return Ok(());
		}
		let src = self.endpoint(id, source)?;
		let tgt = self.endpoint(id, target)?;

		self.graph.add_edge(src, tgt, EdgeData::default());
		self.edges.push(LayoutEdge {
			id: id.to_string(),
			source: source.to_string(),
			target: target.to_string(),
		});
		self.reheat(GROWTH_ALPHA);
		Ok(())
	}

	fn endpoint(&self, edge: &str, node: &str) -> Result<DefaultNodeIdx, LayoutError> {
		match self.index.get(node) {
			Some(&idx) if !self.hidden_nodes.contains(node) => Ok(idx),
			_ => Err(LayoutError::MissingEndpoint {
				edge: edge.to_string(),
				node: node.to_string(),
			}),
		}
	}

	pub fn set_node_visible(&mut self, id: &str, visible: bool) {
		if visible {
			self.hidden_nodes.remove(id);
		} else if self.index.contains_key(id) {
			self.hidden_nodes.insert(id.to_string());
		}
	}

	pub fn set_edge_visible(&mut self, id: &str, visible: bool) {
		if visible {
			self.hidden_edges.remove(id);
		} else if self.has_edge(id) {
			self.hidden_edges.insert(id.to_string());
		}
	}

	pub fn visible_edges(&self) -> impl Iterator<Item = &LayoutEdge> {
		self.edges.iter().filter(|e| {
			!self.hidden_edges.contains(&e.id)
				&& self.has_visible_node(&e.source)
				&& self.has_visible_node(&e.target)
		})
	}

	/// Fix a node at `(x, y)`. Forces never move it afterwards.
	pub fn pin(&mut self, id: &str, x: f64, y: f64) -> Result<(), LayoutError> {
		let Some(&idx) = self.index.get(id) else {
			return Err(LayoutError::UnknownNode(id.to_string()));
		};
		self.pins.insert(id.to_string(), (x, y));
		self.graph.visit_nodes_mut(|node| {
			if node.index() == idx {
				node.data.x = x as f32;
				node.data.y = y as f32;
				node.data.is_anchor = true;
			}
		});
		Ok(())
	}

	pub fn is_pinned(&self, id: &str) -> bool {
		self.pins.contains_key(id)
	}

	pub fn position(&self, id: &str) -> Option<(f64, f64)> {
		let &idx = self.index.get(id)?;
		let mut found = None;
		self.graph.visit_nodes(|node| {
			if node.index() == idx {
				found = Some((node.x() as f64, node.y() as f64));
			}
		});
		found
	}

	/// Visible node positions, keyed and iterated in id order.
	pub fn positions(&self) -> BTreeMap<String, (f64, f64)> {
		let mut out = BTreeMap::new();
		self.graph.visit_nodes(|node| {
			let id = &node.data.user_data.id;
			if !self.hidden_nodes.contains(id) {
				out.insert(id.clone(), (node.x() as f64, node.y() as f64));
			}
		});
		out
	}

	/// Closest visible node within `radius` of a graph-space point.
	pub fn node_at(&self, x: f64, y: f64, radius: f64) -> Option<String> {
		let mut best: Option<(f64, String)> = None;
		for (id, (nx, ny)) in self.positions() {
			let dist = ((nx - x).powi(2) + (ny - y).powi(2)).sqrt();
			if dist < radius && best.as_ref().is_none_or(|(d, _)| dist < *d) {
				best = Some((dist, id));
			}
		}
		best.map(|(_, id)| id)
	}

	/// Advance the simulation by `dt` seconds. Returns `false` once settled.
	pub fn tick(&mut self, dt: f32) -> bool {
		if self.is_settled() {
			return false;
		}
		self.alpha += (self.alpha_target - self.alpha) * self.params.alpha_decay;
		self.graph.update(dt * self.alpha as f32);
		self.apply_position_passes();
		true
	}

	fn seed_position(&self, position: Option<Position>, neighbours: &[&str]) -> (f64, f64) {
		if let Some(p) = position {
			return (p.x, p.y);
		}
		let angle = self.index.len() as f64 * GOLDEN_ANGLE;
		let anchors: Vec<(f64, f64)> = neighbours
			.iter()
			.filter(|id| self.has_visible_node(id))
			.filter_map(|id| self.position(id))
			.collect();
		if anchors.is_empty() {
			let (cx, cy) = self.center();
			return (cx + SEED_RADIUS * angle.cos(), cy + SEED_RADIUS * angle.sin());
		}
		let n = anchors.len() as f64;
		let (sx, sy) = anchors
			.iter()
			.fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
		(
			sx / n + SEED_OFFSET * angle.cos(),
			sy / n + SEED_OFFSET * angle.sin(),
		)
	}

	fn apply_position_passes(&mut self) {
		let mut order = Vec::new();
		let mut bodies = Vec::new();
		self.graph.visit_nodes(|node| {
			let id = &node.data.user_data.id;
			if self.hidden_nodes.contains(id) {
				return;
			}
			let body = match self.pins.get(id) {
				Some(&(x, y)) => Body { x, y, pinned: true },
				None => Body {
					x: node.x() as f64,
					y: node.y() as f64,
					pinned: false,
				},
			};
			order.push(node.index());
			bodies.push(body);
		});

		let slot: HashMap<DefaultNodeIdx, usize> =
			order.iter().enumerate().map(|(i, &idx)| (idx, i)).collect();
		let links: Vec<(usize, usize)> = self
			.visible_edges()
			.filter_map(|e| {
				let src = slot.get(self.index.get(&e.source)?)?;
				let tgt = slot.get(self.index.get(&e.target)?)?;
				Some((*src, *tgt))
			})
			.collect();

		apply_link_distance(
			&mut bodies,
			&links,
			self.params.link_distance,
			self.params.link_strength * self.alpha,
		);
		let (cx, cy) = self.center();
		apply_centering(&mut bodies, cx, cy, self.params.center_strength);
		resolve_collisions(&mut bodies, self.params.collide_radius);

		let updates: HashMap<DefaultNodeIdx, Body> = order.into_iter().zip(bodies).collect();
		self.graph.visit_nodes_mut(|node| {
			if let Some(body) = updates.get(&node.index()) {
				node.data.x = body.x as f32;
				node.data.y = body.y as f32;
				if body.pinned {
					node.data.is_anchor = true;
				}
			}
		});
	}
}

/// Pull or push linked bodies toward `distance`, splitting the correction
/// between free endpoints.
pub fn apply_link_distance(bodies: &mut [Body], links: &[(usize, usize)], distance: f64, strength: f64) {
	for &(a, b) in links {
		if a == b {
			continue;
		}
		let (dx, dy) = (bodies[b].x - bodies[a].x, bodies[b].y - bodies[a].y);
		let len = (dx * dx + dy * dy).sqrt();
		if len < f64::EPSILON {
			continue;
		}
		let shift = (len - distance) / len * strength;
		let (sx, sy) = (dx * shift, dy * shift);
		match (bodies[a].pinned, bodies[b].pinned) {
			(true, true) => {}
			(false, true) => {
				bodies[a].x += sx;
				bodies[a].y += sy;
			}
			(true, false) => {
				bodies[b].x -= sx;
				bodies[b].y -= sy;
			}
			(false, false) => {
				bodies[a].x += sx / 2.0;
				bodies[a].y += sy / 2.0;
				bodies[b].x -= sx / 2.0;
				bodies[b].y -= sy / 2.0;
			}
		}
	}
}

/// Translate free bodies so their barycenter moves toward `(cx, cy)`.
pub fn apply_centering(bodies: &mut [Body], cx: f64, cy: f64, strength: f64) {
	let free: Vec<&Body> = bodies.iter().filter(|b| !b.pinned).collect();
	if free.is_empty() {
		return;
	}
	let n = free.len() as f64;
	let (mx, my) = free.iter().fold((0.0, 0.0), |(ax, ay), b| (ax + b.x, ay + b.y));
	let (sx, sy) = ((cx - mx / n) * strength, (cy - my / n) * strength);
	for body in bodies.iter_mut().filter(|b| !b.pinned) {
		body.x += sx;
		body.y += sy;
	}
}

/// Separate overlapping bodies so centers end up at least `2 * radius` apart.
pub fn resolve_collisions(bodies: &mut [Body], radius: f64) {
	let min_dist = 2.0 * radius;
	for i in 0..bodies.len() {
		for j in (i + 1)..bodies.len() {
			let (a, b) = (bodies[i], bodies[j]);
			if a.pinned && b.pinned {
				continue;
			}
			let (dx, dy) = (b.x - a.x, b.y - a.y);
			let dist = (dx * dx + dy * dy).sqrt();
			if dist >= min_dist {
				continue;
			}
			let (ux, uy) = if dist < 1e-9 {
				// Coincident: separate along a direction derived from the pair.
				let angle = (i * 31 + j * 17) as f64;
				(angle.cos(), angle.sin())
			} else {
				(dx / dist, dy / dist)
			};
			let overlap = min_dist - dist;
			let (wa, wb) = match (a.pinned, b.pinned) {
				(false, false) => (0.5, 0.5),
				(true, false) => (0.0, 1.0),
				_ => (1.0, 0.0),
			};
			bodies[i].x -= ux * overlap * wa;
			bodies[i].y -= uy * overlap * wa;
			bodies[j].x += ux * overlap * wb;
			bodies[j].y += uy * overlap * wb;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn layout() -> ForceLayout {
		ForceLayout::new(LayoutParams::default(), 800.0, 600.0)
	}

	fn free(x: f64, y: f64) -> Body {
		Body { x, y, pinned: false }
	}

	fn dist(a: Body, b: Body) -> f64 {
		((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
	}

	// ========================================================================
	// Convergence
	// ========================================================================

	#[test]
	fn alpha_settles_in_under_two_seconds() {
		let mut l = layout();
		l.add_node("a", None, &[]);
		l.add_node("b", None, &[]);
		let mut ticks = 0;
		while l.tick(0.016) {
			ticks += 1;
			assert!(ticks < 200, "simulation never settled");
		}
		// 60 frames per second
		assert!(ticks <= 120, "took {} ticks", ticks);
		assert!(l.is_settled());
		assert!(!l.tick(0.016));
	}

	#[test]
	fn alpha_target_keeps_simulation_warm() {
		let mut l = layout();
		l.add_node("a", None, &[]);
		while l.tick(0.016) {}
		l.set_alpha_target(0.3);
		assert!(!l.is_settled());
		for _ in 0..200 {
			assert!(l.tick(0.016));
		}
		assert!((l.alpha() - 0.3).abs() < 0.01);
		l.set_alpha_target(0.0);
		while l.tick(0.016) {}
		assert!(l.is_settled());
	}

	// ========================================================================
	// Pinning
	// ========================================================================

	#[test]
	fn pinned_node_never_moves() {
		let mut l = layout();
		for id in ["a", "b", "c", "d"] {
			l.add_node(id, None, &[]);
		}
		l.add_edge("ab", "a", "b").unwrap();
		l.add_edge("ac", "a", "c").unwrap();
		l.pin("a", 123.0, 321.0).unwrap();
		let before = l.position("a").unwrap();
		l.set_alpha_target(0.5);
		for _ in 0..300 {
			l.tick(0.016);
			assert_eq!(l.position("a").unwrap(), before);
		}
		assert_eq!(before, (123.0, 321.0));
		assert!(l.is_pinned("a"));
	}

	#[test]
	fn fixed_document_position_pins_from_start() {
		let mut l = layout();
		let fixed = Position {
			x: 50.0,
			y: 60.0,
			fixed: true,
		};
		l.add_node("a", Some(fixed), &[]);
		l.add_node("b", None, &["a"]);
		for _ in 0..50 {
			l.tick(0.016);
		}
		assert_eq!(l.position("a"), Some((50.0, 60.0)));
	}

	#[test]
	fn pin_unknown_node_errors() {
		let mut l = layout();
		assert_eq!(
			l.pin("ghost", 0.0, 0.0),
			Err(LayoutError::UnknownNode("ghost".into()))
		);
	}

	// ========================================================================
	// Incremental growth
	// ========================================================================

	#[test]
	fn adding_node_preserves_settled_positions_and_nudges_alpha() {
		let mut l = layout();
		l.add_node("a", None, &[]);
		l.add_node("b", None, &[]);
		while l.tick(0.016) {}
		let before = l.positions();

		l.add_node("c", None, &["a"]);
		let after = l.positions();
		assert_eq!(after["a"], before["a"]);
		assert_eq!(after["b"], before["b"]);
		assert!((l.alpha() - GROWTH_ALPHA).abs() < 1e-12);
	}

	#[test]
	fn growth_does_not_cool_a_hot_simulation() {
		let mut l = layout();
		l.add_node("a", None, &[]);
		assert_eq!(l.alpha(), 1.0);
		l.add_node("b", None, &[]);
		assert_eq!(l.alpha(), 1.0);
	}

	#[test]
	fn new_node_is_seeded_near_its_neighbours() {
		let mut l = layout();
		l.add_node(
			"a",
			Some(Position {
				x: 700.0,
				y: 500.0,
				fixed: false,
			}),
			&[],
		);
		l.add_node("b", None, &["a"]);
		let (bx, by) = l.position("b").unwrap();
		let d = ((bx - 700.0).powi(2) + (by - 500.0).powi(2)).sqrt();
		assert!((d - SEED_OFFSET).abs() < 0.01, "seeded {} away", d);
	}

	#[test]
	fn positions_iterate_in_id_order() {
		let mut l = layout();
		for id in ["delta", "alpha", "charlie", "bravo"] {
			l.add_node(id, None, &[]);
		}
		l.tick(0.016);
		let ids: Vec<String> = l.positions().into_keys().collect();
		assert_eq!(ids, ["alpha", "bravo", "charlie", "delta"]);
	}

	#[test]
	fn readding_hidden_node_makes_it_visible() {
		let mut l = layout();
		l.add_node("a", None, &[]);
		l.set_node_visible("a", false);
		assert!(!l.has_visible_node("a"));
		assert!(l.positions().is_empty());
		l.add_node("a", None, &[]);
		assert!(l.has_visible_node("a"));
		assert_eq!(l.node_count(), 1);
	}

	// ========================================================================
	// Edges
	// ========================================================================

	#[test]
	fn edge_requires_visible_endpoints() {
		let mut l = layout();
		l.add_node("a", None, &[]);
		assert_eq!(
			l.add_edge("ab", "a", "b"),
			Err(LayoutError::MissingEndpoint {
				edge: "ab".into(),
				node: "b".into()
			})
		);
		l.add_node("b", None, &[]);
		l.set_node_visible("b", false);
		assert!(l.add_edge("ab", "a", "b").is_err());
		assert!(!l.has_edge("ab"));

		l.set_node_visible("b", true);
		l.add_edge("ab", "a", "b").unwrap();
		assert_eq!(l.visible_edges().count(), 1);
	}

	#[test]
	fn node_at_returns_closest_visible_node() {
		let mut l = layout();
		let at = |x, y| {
			Some(Position {
				x,
				y,
				fixed: false,
			})
		};
		l.add_node("a", at(100.0, 100.0), &[]);
		l.add_node("b", at(110.0, 100.0), &[]);
		assert_eq!(l.node_at(108.0, 100.0, 12.0).as_deref(), Some("b"));
		assert_eq!(l.node_at(300.0, 300.0, 12.0), None);
		l.set_node_visible("b", false);
		assert_eq!(l.node_at(108.0, 100.0, 12.0).as_deref(), Some("a"));
	}

	// ========================================================================
	// Position passes
	// ========================================================================

	#[test]
	fn collision_separates_overlapping_free_bodies() {
		let mut bodies = vec![free(0.0, 0.0), free(10.0, 0.0)];
		resolve_collisions(&mut bodies, 20.0);
		assert!((dist(bodies[0], bodies[1]) - 40.0).abs() < 1e-9);
		assert!((bodies[0].x + bodies[1].x - 10.0).abs() < 1e-9);
	}

	#[test]
	fn collision_separates_coincident_bodies() {
		let mut bodies = vec![free(5.0, 5.0), free(5.0, 5.0)];
		resolve_collisions(&mut bodies, 10.0);
		assert!((dist(bodies[0], bodies[1]) - 20.0).abs() < 1e-9);
	}

	#[test]
	fn collision_never_moves_pinned_body() {
		let pinned = Body {
			x: 0.0,
			y: 0.0,
			pinned: true,
		};
		let mut bodies = vec![pinned, free(5.0, 0.0)];
		resolve_collisions(&mut bodies, 10.0);
		assert_eq!(bodies[0], pinned);
		assert!((bodies[1].x - 20.0).abs() < 1e-9);
	}

	#[test]
	fn centering_moves_barycenter_toward_center() {
		let mut bodies = vec![free(0.0, 0.0), free(20.0, 0.0)];
		apply_centering(&mut bodies, 110.0, 0.0, 1.0);
		assert_eq!(bodies[0].x, 100.0);
		assert_eq!(bodies[1].x, 120.0);
	}

	#[test]
	fn link_distance_pulls_toward_target_length() {
		let mut bodies = vec![free(0.0, 0.0), free(200.0, 0.0)];
		apply_link_distance(&mut bodies, &[(0, 1)], 100.0, 1.0);
		assert!((dist(bodies[0], bodies[1]) - 100.0).abs() < 1e-9);
	}
}
