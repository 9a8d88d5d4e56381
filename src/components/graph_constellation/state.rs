use std::rc::Rc;

use log::info;

use super::config::{ConstellationConfig, DisplaySettings};
use super::interaction::{
	CLICK_SLOP, DRAG_ALPHA_TARGET, DragState, HIT_RADIUS, HoverState, NodeDetail, PanState,
	ViewTransform,
};
use super::session::{AnimationSession, SessionEvent};
use super::types::GraphDocument;

/// Everything one mounted constellation owns.
pub struct ConstellationState {
	pub session: AnimationSession,
	pub transform: ViewTransform,
	pub drag: DragState,
	pub pan: PanState,
	pub hover: HoverState,
	pub selected: Option<NodeDetail>,
	pub settings: DisplaySettings,
	pub width: f64,
	pub height: f64,
	pub flow_time: f64,
	document: Rc<GraphDocument>,
	config: ConstellationConfig,
}

impl ConstellationState {
	pub fn new(document: Rc<GraphDocument>, config: ConstellationConfig) -> Self {
		Self {
			session: AnimationSession::new(document.clone(), config.clone()),
			transform: ViewTransform {
				x: 0.0,
				y: 0.0,
				k: 1.0,
			},
			drag: DragState::default(),
			pan: PanState::default(),
			hover: HoverState::default(),
			selected: None,
			settings: config.initial_settings,
			width: config.width,
			height: config.height,
			flow_time: 0.0,
			document,
			config,
		}
	}

	pub fn start(&mut self, stage: usize) -> Vec<SessionEvent> {
		self.session.start(stage)
	}

	pub fn sync_stage(&mut self, stage: usize) -> Vec<SessionEvent> {
		self.session.sync_stage(stage)
	}

	/// Throw the current run away and animate again from `stage`.
	pub fn replay(&mut self, stage: usize) -> Vec<SessionEvent> {
		self.session.dispose();
		let mut config = self.config.clone();
		config.width = self.width;
		config.height = self.height;
		self.session = AnimationSession::new(self.document.clone(), config);
		self.drag = DragState::default();
		self.pan = PanState::default();
		self.hover = HoverState::default();
		self.selected = None;
		self.flow_time = 0.0;
		info!("constellation: replay from stage {}", stage);
		self.session.start(stage)
	}

	pub fn dispose(&mut self) {
		self.session.dispose();
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<String> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		// HIT_RADIUS is in world-space, scales with zoom like nodes
		self.session.layout().node_at(gx, gy, HIT_RADIUS)
	}

	pub fn set_hover(&mut self, node: Option<String>) {
		let layout = self.session.layout();
		let incident: Vec<(&str, &str)> = match node.as_deref() {
			Some(id) => layout
				.visible_edges()
				.filter_map(|e| {
					if e.source == id {
						Some((e.id.as_str(), e.target.as_str()))
					} else if e.target == id {
						Some((e.id.as_str(), e.source.as_str()))
					} else {
						None
					}
				})
				.collect(),
			None => Vec::new(),
		};
		self.hover.set(node.as_deref(), &incident);
	}

	/// Press at a canvas point. Returns `true` when a node drag started.
	pub fn pointer_down(&mut self, x: f64, y: f64) -> bool {
		if let Some(id) = self.node_at_position(x, y) {
			let Some((nx, ny)) = self.session.layout().position(&id) else {
				return false;
			};
			let layout = self.session.layout_mut();
			if layout.pin(&id, nx, ny).is_err() {
				return false;
			}
			layout.set_alpha_target(DRAG_ALPHA_TARGET);
			self.drag = DragState {
				node: Some(id),
				start_x: x,
				start_y: y,
				node_start_x: nx,
				node_start_y: ny,
				moved: false,
			};
			true
		} else {
			self.pan = PanState {
				active: true,
				start_x: x,
				start_y: y,
				transform_start_x: self.transform.x,
				transform_start_y: self.transform.y,
				moved: false,
			};
			false
		}
	}

	pub fn pointer_move(&mut self, x: f64, y: f64) {
		if let Some(id) = self.drag.node.clone() {
			let (dx, dy) = (x - self.drag.start_x, y - self.drag.start_y);
			if dx.hypot(dy) > CLICK_SLOP {
				self.drag.moved = true;
			}
			let (nx, ny) = (
				self.drag.node_start_x + dx / self.transform.k,
				self.drag.node_start_y + dy / self.transform.k,
			);
			let _ = self.session.layout_mut().pin(&id, nx, ny);
		} else if self.pan.active {
			let (dx, dy) = (x - self.pan.start_x, y - self.pan.start_y);
			if dx.hypot(dy) > CLICK_SLOP {
				self.pan.moved = true;
			}
			self.transform.x = self.pan.transform_start_x + dx;
			self.transform.y = self.pan.transform_start_y + dy;
		} else {
			let hovered = self.node_at_position(x, y);
			self.set_hover(hovered);
		}
	}

	/// Release. The dragged node stays pinned where it was dropped; a press
	/// that did not travel selects the node, or clears the selection on
	/// empty canvas.
	pub fn pointer_up(&mut self) {
		if let Some(id) = self.drag.node.take() {
			self.session.layout_mut().set_alpha_target(0.0);
			if !self.drag.moved {
				self.select(Some(&id));
			}
		} else if self.pan.active && !self.pan.moved {
			self.select(None);
		}
		self.drag = DragState::default();
		self.pan = PanState::default();
	}

	pub fn pointer_leave(&mut self) {
		self.pan = PanState::default();
		self.set_hover(None);
	}

	pub fn select(&mut self, id: Option<&str>) {
		self.selected = id
			.and_then(|id| self.document.node(id))
			.map(NodeDetail::from_node);
	}

	pub fn zoom(&mut self, x: f64, y: f64, delta_y: f64) {
		let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
		let new_k = (self.transform.k * factor).clamp(0.1, 10.0);
		let ratio = new_k / self.transform.k;
		self.transform.x = x - (x - self.transform.x) * ratio;
		self.transform.y = y - (y - self.transform.y) * ratio;
		self.transform.k = new_k;
	}

	/// One animation frame of `dt` seconds.
	pub fn tick(&mut self, dt: f64) -> Vec<SessionEvent> {
		self.flow_time += dt;
		self.hover.tick(dt);
		self.session.advance(dt * 1000.0)
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
		self.session.layout_mut().resize(width, height);
	}
}
