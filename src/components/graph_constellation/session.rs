use std::collections::HashMap;
use std::rc::Rc;

use log::{info, warn};

use super::config::ConstellationConfig;
use super::layout::ForceLayout;
use super::plan::RevealPlan;
use super::sequencer::{SequencerEvent, SequencerState, StageSequencer};
use super::types::{ElementRef, GraphDocument};

pub const REVEAL_TRANSITION_MS: f64 = 400.0;

pub fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

/// Notifications for the host.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
	StageComplete(usize),
	AnimationComplete,
}

/// Entrance state of one revealed element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Visual {
	pub opacity: f64,
	pub scale: f64,
}

impl Visual {
	pub fn is_complete(&self) -> bool {
		self.opacity >= 1.0 && self.scale >= 1.0
	}
}

/// One run of the constellation animation: layout, reveal timers and
/// entrance transitions. Replay builds a new session instead of resetting
/// this one.
pub struct AnimationSession {
	document: Rc<GraphDocument>,
	config: ConstellationConfig,
	layout: ForceLayout,
	sequencer: StageSequencer,
	/// Reveal start time per element; `NEG_INFINITY` means fully shown.
	transitions: HashMap<ElementRef, f64>,
	/// Skipped edges with the stage they were skipped in.
	deferred: Vec<(String, usize)>,
	now: f64,
	disposed: bool,
}

impl AnimationSession {
	pub fn new(document: Rc<GraphDocument>, config: ConstellationConfig) -> Self {
		let plan = RevealPlan::build(
			&document,
			config.animation_mode,
			config.stage_duration,
			config.animation_duration,
		);
		let sequencer = StageSequencer::new(plan, config.animation_mode, config.auto_advance_stages);
		let layout = ForceLayout::new(config.layout.clone(), config.width, config.height);
		Self {
			document,
			config,
			layout,
			sequencer,
			transitions: HashMap::new(),
			deferred: Vec::new(),
			now: 0.0,
			disposed: false,
		}
	}

	pub fn document(&self) -> &GraphDocument {
		&self.document
	}

	pub fn config(&self) -> &ConstellationConfig {
		&self.config
	}

	pub fn layout(&self) -> &ForceLayout {
		&self.layout
	}

	pub fn layout_mut(&mut self) -> &mut ForceLayout {
		&mut self.layout
	}

	pub fn state(&self) -> SequencerState {
		self.sequencer.state()
	}

	pub fn deferred_edges(&self) -> Vec<&str> {
		self.deferred.iter().map(|(id, _)| id.as_str()).collect()
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed
	}

	/// Begin revealing at `stage`. Without animation every element is shown at once.
	pub fn start(&mut self, stage: usize) -> Vec<SessionEvent> {
		if self.disposed {
			return Vec::new();
		}
		if !self.config.animated {
			let everything: Vec<ElementRef> = self
				.sequencer
				.plan()
				.entries()
				.iter()
				.map(|p| p.element.clone())
				.collect();
			// nodes first so every edge finds its endpoints
			let (nodes, edges): (Vec<_>, Vec<_>) = everything
				.into_iter()
				.partition(|e| matches!(e, ElementRef::Node(_)));
			for element in nodes.into_iter().chain(edges) {
				self.reveal(element, true);
			}
			return vec![SessionEvent::AnimationComplete];
		}
		let events = self.sequencer.start(stage);
		self.apply(events)
	}

	/// Follow the host's stage index.
	pub fn sync_stage(&mut self, stage: usize) -> Vec<SessionEvent> {
		if self.disposed || !self.config.animated {
			return Vec::new();
		}
		let events = self.sequencer.set_stage(stage);
		self.apply(events)
	}

	/// Advance by `dt` milliseconds: tick the layout, then fire due reveals.
	pub fn advance(&mut self, dt: f64) -> Vec<SessionEvent> {
		if self.disposed {
			return Vec::new();
		}
		self.now += dt;
		self.layout.tick((dt / 1000.0) as f32);
		let events = self.sequencer.advance(dt);
		self.apply(events)
	}

	/// Stop revealing. Elements already shown stay.
	pub fn cancel(&mut self) {
		self.sequencer.cancel();
	}

	/// Tear down: pending timers are dropped and later calls do nothing.
	pub fn dispose(&mut self) {
		if self.disposed {
			return;
		}
		self.cancel();
		self.deferred.clear();
		self.disposed = true;
		info!("session: disposed");
	}

	/// Entrance state of an element, `None` while it is not revealed.
	pub fn visual(&self, element: &ElementRef) -> Option<Visual> {
		let &started = self.transitions.get(element)?;
		let t = ((self.now - started) / REVEAL_TRANSITION_MS).clamp(0.0, 1.0);
		let eased = ease_out_cubic(t);
		Some(Visual {
			opacity: eased,
			scale: eased,
		})
	}

	pub fn node_visual(&self, id: &str) -> Option<Visual> {
		self.visual(&ElementRef::Node(id.to_string()))
	}

	pub fn edge_visual(&self, id: &str) -> Option<Visual> {
		self.visual(&ElementRef::Edge(id.to_string()))
	}

	fn apply(&mut self, events: Vec<SequencerEvent>) -> Vec<SessionEvent> {
		let mut out = Vec::new();
		for event in events {
			match event {
				SequencerEvent::StageBegin(_) => {
					for started in self.transitions.values_mut() {
						*started = f64::NEG_INFINITY;
					}
				}
				SequencerEvent::Reveal { element, instant } => self.reveal(element, instant),
				SequencerEvent::Hide(element) => self.hide(&element),
				SequencerEvent::StageComplete(stage) => {
					self.retry_deferred(stage);
					out.push(SessionEvent::StageComplete(stage));
				}
				SequencerEvent::AnimationComplete => out.push(SessionEvent::AnimationComplete),
			}
		}
		out
	}

	fn reveal(&mut self, element: ElementRef, instant: bool) {
		let started = if instant { f64::NEG_INFINITY } else { self.now };
		match &element {
			ElementRef::Node(id) => {
				let Some(node) = self.document.node(id) else {
					return;
				};
				let neighbours: Vec<&str> = self
					.document
					.relationships
					.iter()
					.filter_map(|r| {
						if r.source == *id {
							Some(r.target.as_str())
						} else if r.target == *id {
							Some(r.source.as_str())
						} else {
							None
						}
					})
					.collect();
				self.layout.add_node(id, node.position, &neighbours);
			}
			ElementRef::Edge(id) => {
				let Some(rel) = self.document.relationship(id) else {
					return;
				};
				if let Err(err) = self.layout.add_edge(id, &rel.source, &rel.target) {
					warn!("skipping edge reveal: {}", err);
					let stage = self.sequencer.plan().stage_of(&element).unwrap_or(0);
					if !self.deferred.iter().any(|(d, _)| d == id) {
						self.deferred.push((id.clone(), stage));
					}
					return;
				}
			}
		}
		self.transitions.insert(element, started);
	}

	fn hide(&mut self, element: &ElementRef) {
		match element {
			ElementRef::Node(id) => self.layout.set_node_visible(id, false),
			ElementRef::Edge(id) => {
				self.layout.set_edge_visible(id, false);
				self.deferred.retain(|(d, _)| d != id);
			}
		}
		self.transitions.remove(element);
	}

	/// Retry edges skipped in stages before `completed`. Edges skipped in
	/// `completed` itself wait for the next stage to settle.
	fn retry_deferred(&mut self, completed: usize) {
		for (id, stage) in std::mem::take(&mut self.deferred) {
			if stage >= completed {
				self.deferred.push((id, stage));
				continue;
			}
			let Some(rel) = self.document.relationship(&id) else {
				continue;
			};
			match self.layout.add_edge(&id, &rel.source, &rel.target) {
				Ok(()) => {
					info!("session: deferred edge {} revealed", id);
					self.transitions.insert(ElementRef::Edge(id), f64::NEG_INFINITY);
				}
				Err(_) => self.deferred.push((id, stage)),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;
	use crate::components::graph_constellation::config::AnimationMode;
	use crate::components::graph_constellation::types::GraphMetadata;
	use crate::components::graph_constellation::types::fixtures::{edge, node, three_stage};

	const FRAME: f64 = 16.0;

	fn staged_config(auto: bool) -> ConstellationConfig {
		ConstellationConfig {
			animation_mode: AnimationMode::Staged,
			stage_duration: 1000.0,
			auto_advance_stages: auto,
			..Default::default()
		}
	}

	fn run(session: &mut AnimationSession, ms: f64) -> Vec<SessionEvent> {
		let mut events = Vec::new();
		let mut elapsed = 0.0;
		while elapsed < ms {
			events.extend(session.advance(FRAME));
			elapsed += FRAME;
		}
		events
	}

	#[test]
	fn three_stage_scenario() {
		let mut session = AnimationSession::new(Rc::new(three_stage()), staged_config(false));
		session.start(0);
		let events = run(&mut session, 3000.0);
		assert_eq!(events, vec![SessionEvent::StageComplete(0)]);

		let layout = session.layout();
		assert!(layout.has_visible_node("A") && layout.has_visible_node("B"));
		assert!(!layout.contains_node("C"));
		assert!(layout.is_settled());
		let before = layout.positions();

		session.sync_stage(1);
		session.advance(FRAME);
		let layout = session.layout();
		assert!(layout.has_visible_node("C"));
		let after = layout.positions();
		assert_eq!(after["A"], before["A"]);
		assert_eq!(after["B"], before["B"]);

		run(&mut session, 1000.0);
		assert!(!session.layout().has_edge("A-C"));
		session.sync_stage(2);
		let events = run(&mut session, 1000.0);
		assert!(session.layout().has_edge("A-C"));
		assert_eq!(
			events,
			vec![
				SessionEvent::StageComplete(2),
				SessionEvent::AnimationComplete
			]
		);
	}

	#[test]
	fn edge_with_absent_endpoint_is_skipped_then_retried() {
		let doc = GraphDocument {
			nodes: vec![node("A", Some(0), None), node("C", Some(3), None)],
			relationships: vec![edge("A-C", "A", "C", Some(2))],
			metadata: GraphMetadata::default(),
		};
		let mut session = AnimationSession::new(Rc::new(doc), staged_config(false));
		session.start(0);
		run(&mut session, 1000.0);
		session.sync_stage(2);
		run(&mut session, 1000.0);

		assert!(!session.layout().has_edge("A-C"));
		assert_eq!(session.deferred_edges(), vec!["A-C"]);
		assert_eq!(session.edge_visual("A-C"), None);

		session.sync_stage(3);
		run(&mut session, 1000.0);
		assert!(session.layout().has_edge("A-C"));
		assert!(session.deferred_edges().is_empty());
		assert!(session.edge_visual("A-C").unwrap().is_complete());
	}

	#[test]
	fn edge_skipped_in_a_stage_waits_for_the_next_stage_to_settle() {
		let doc = GraphDocument {
			nodes: vec![
				node("A", Some(0), Some(0)),
				node("B", Some(0), Some(2)),
				node("D", Some(1), None),
			],
			relationships: vec![{
				let mut e = edge("A-B", "A", "B", Some(0));
				e.animation_order = Some(1);
				e
			}],
			metadata: GraphMetadata::default(),
		};
		let mut session = AnimationSession::new(Rc::new(doc), staged_config(false));
		session.start(0);
		let events = run(&mut session, 3200.0);

		assert_eq!(events, vec![SessionEvent::StageComplete(0)]);
		assert!(session.layout().has_visible_node("B"));
		assert!(!session.layout().has_edge("A-B"));
		assert_eq!(session.deferred_edges(), vec!["A-B"]);

		session.sync_stage(1);
		run(&mut session, 2000.0);
		assert!(session.layout().has_edge("A-B"));
		assert!(session.deferred_edges().is_empty());
	}

	#[test]
	fn earlier_stages_are_fully_shown_before_a_stage_reveals() {
		let mut session = AnimationSession::new(Rc::new(three_stage()), staged_config(true));
		session.start(0);
		let doc = three_stage();
		let stage_of = |el: &ElementRef| session_stage(&doc, el);
		for _ in 0..400 {
			session.advance(FRAME);
			let shown: Vec<(ElementRef, Visual)> = all_elements(&doc)
				.into_iter()
				.filter_map(|el| session.visual(&el).map(|v| (el, v)))
				.collect();
			let Some(newest) = shown.iter().map(|(el, _)| stage_of(el)).max() else {
				continue;
			};
			for (el, visual) in &shown {
				if stage_of(el) < newest {
					assert!(visual.is_complete(), "{:?} still animating", el);
				}
			}
		}
	}

	#[test]
	fn jumping_stages_snaps_previous_transitions() {
		let mut session = AnimationSession::new(Rc::new(three_stage()), staged_config(false));
		session.start(0);
		session.advance(FRAME);
		assert!(!session.node_visual("A").unwrap().is_complete());

		session.sync_stage(1);
		assert!(session.node_visual("A").unwrap().is_complete());
		assert!(session.node_visual("B").unwrap().is_complete());
		assert_eq!(session.node_visual("C"), None);
	}

	#[test]
	fn reveal_transition_eases_in() {
		let mut session = AnimationSession::new(Rc::new(three_stage()), staged_config(false));
		session.start(0);
		session.advance(0.0);
		assert_eq!(session.node_visual("A").unwrap().opacity, 0.0);
		session.advance(REVEAL_TRANSITION_MS / 2.0);
		let half = session.node_visual("A").unwrap();
		assert!(half.opacity > 0.5 && half.opacity < 1.0);
		session.advance(REVEAL_TRANSITION_MS);
		assert!(session.node_visual("A").unwrap().is_complete());
	}

	#[test]
	fn rewinding_hides_later_elements() {
		let mut session = AnimationSession::new(Rc::new(three_stage()), staged_config(true));
		session.start(0);
		run(&mut session, 5000.0);
		session.sync_stage(0);
		assert!(!session.layout().has_visible_node("C"));
		assert_eq!(session.layout().visible_edges().count(), 0);
		assert!(session.layout().has_visible_node("A"));
		assert_eq!(session.node_visual("C"), None);
	}

	#[test]
	fn unanimated_session_shows_everything_at_once() {
		let config = ConstellationConfig {
			animated: false,
			..staged_config(false)
		};
		let mut session = AnimationSession::new(Rc::new(three_stage()), config);
		assert_eq!(session.start(0), vec![SessionEvent::AnimationComplete]);
		assert_eq!(session.layout().node_count(), 3);
		assert!(session.layout().has_edge("A-C"));
		assert!(session.edge_visual("A-C").unwrap().is_complete());
	}

	#[test]
	fn continuous_session_completes_once() {
		let config = ConstellationConfig {
			animation_duration: 800.0,
			..Default::default()
		};
		let mut session = AnimationSession::new(Rc::new(three_stage()), config);
		session.start(0);
		let events = run(&mut session, 3000.0);
		assert_eq!(events, vec![SessionEvent::AnimationComplete]);
		assert!(session.layout().has_edge("A-C"));
	}

	#[test]
	fn disposed_session_ignores_time() {
		let mut session = AnimationSession::new(Rc::new(three_stage()), staged_config(true));
		session.start(0);
		session.advance(FRAME);
		session.dispose();
		assert!(session.is_disposed());
		assert!(run(&mut session, 10_000.0).is_empty());
		assert!(!session.layout().contains_node("B"));
		assert_eq!(session.state(), SequencerState::Idle);
	}

	#[test]
	fn replay_yields_the_same_element_set() {
		let doc = Rc::new(three_stage());
		let finish = |doc: Rc<GraphDocument>| {
			let mut session = AnimationSession::new(doc, staged_config(true));
			session.start(0);
			run(&mut session, 10_000.0);
			let nodes: HashSet<String> = session.layout().positions().into_keys().collect();
			let edges: HashSet<String> =
				session.layout().visible_edges().map(|e| e.id.clone()).collect();
			(nodes, edges)
		};
		assert_eq!(finish(doc.clone()), finish(doc));
	}

	fn all_elements(doc: &GraphDocument) -> Vec<ElementRef> {
		doc.nodes
			.iter()
			.map(|n| ElementRef::Node(n.id.clone()))
			.chain(doc.relationships.iter().map(|r| ElementRef::Edge(r.id.clone())))
			.collect()
	}

	fn session_stage(doc: &GraphDocument, el: &ElementRef) -> usize {
		match el {
			ElementRef::Node(id) => doc.node(id).and_then(|n| n.animation_stage),
			ElementRef::Edge(id) => doc.relationship(id).and_then(|r| r.animation_stage),
		}
		.unwrap_or(0)
	}
}
