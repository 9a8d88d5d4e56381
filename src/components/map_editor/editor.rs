use log::{debug, info};

use super::geometry::{ConnectionPoint, Point, Shape, distance_to_segment};
use super::path::{DEGENERATE_EPSILON, LinePath, LineType, RouteError};

/// Pointer distance from a shape at which smart connection engages.
pub const SMART_CONNECT_DISTANCE: f64 = 30.0;
/// Hover time before a smart binding is confirmed.
pub const SMART_CONFIRM_MS: f64 = 500.0;
pub const SEGMENT_HIT_TOLERANCE: f64 = 6.0;

#[derive(Clone, Debug, PartialEq)]
pub enum LineEnd {
	Free(Point),
	Attached {
		shape_id: String,
		point: ConnectionPoint,
	},
}

impl LineEnd {
	pub fn shape_id(&self) -> Option<&str> {
		match self {
			LineEnd::Attached { shape_id, .. } => Some(shape_id),
			LineEnd::Free(_) => None,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Line {
	pub id: String,
	pub line_type: LineType,
	pub start: LineEnd,
	pub end: LineEnd,
	pub path: LinePath,
}

/// A shape the free end is hovering, waiting for confirmation.
#[derive(Clone, Debug, PartialEq)]
struct SmartCandidate {
	shape_id: String,
	point: ConnectionPoint,
	since_ms: f64,
}

/// The line being drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct DraftLine {
	pub line_type: LineType,
	pub start: LineEnd,
	pub pointer: Point,
	pub preview_end: Point,
	/// Where the pointer went down.
	origin: Point,
	candidate: Option<SmartCandidate>,
}

/// What happened to the smart-connection timer on a draft update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmartTimer {
	Unchanged,
	/// A new confirmation window opened; poll after `SMART_CONFIRM_MS`.
	Started,
	Cancelled,
}

#[derive(Clone, Debug, PartialEq)]
enum Drag {
	Segment {
		line_id: String,
		index: usize,
		last: Point,
	},
	Shape {
		shape_id: String,
		last: Point,
	},
}

/// Editing state for shapes joined by connector lines.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LineEditor {
	shapes: Vec<Shape>,
	lines: Vec<Line>,
	draft: Option<DraftLine>,
	hovered_shape_id: Option<String>,
	drag: Option<Drag>,
	next_line: usize,
}

impl LineEditor {
	pub fn new(shapes: Vec<Shape>) -> Self {
		Self {
			shapes,
			..Default::default()
		}
	}

	pub fn shapes(&self) -> &[Shape] {
		&self.shapes
	}

	pub fn shape(&self, id: &str) -> Option<&Shape> {
		self.shapes.iter().find(|s| s.id == id)
	}

	pub fn lines(&self) -> &[Line] {
		&self.lines
	}

	pub fn line(&self, id: &str) -> Option<&Line> {
		self.lines.iter().find(|l| l.id == id)
	}

	pub fn draft(&self) -> Option<&DraftLine> {
		self.draft.as_ref()
	}

	/// Shape whose smart binding has been confirmed for the draft.
	pub fn hovered_shape_id(&self) -> Option<&str> {
		self.hovered_shape_id.as_deref()
	}

	/// Shape currently waiting out the confirmation window, if any.
	pub fn pending_shape_id(&self) -> Option<&str> {
		self.draft
			.as_ref()?
			.candidate
			.as_ref()
			.map(|c| c.shape_id.as_str())
	}

	pub fn is_dragging(&self) -> bool {
		self.drag.is_some()
	}

	fn resolve(&self, end: &LineEnd) -> Point {
		match end {
			LineEnd::Free(p) => *p,
			LineEnd::Attached { shape_id, point } => match self.shape(shape_id) {
				Some(shape) => point.resolve(shape),
				None => Point::default(),
			},
		}
	}

	fn shape_near(&self, p: Point, exclude: Option<&str>) -> Option<&Shape> {
		self.shapes
			.iter()
			.filter(|s| Some(s.id.as_str()) != exclude)
			.map(|s| (s, s.distance_to(p)))
			.filter(|(_, d)| *d <= SMART_CONNECT_DISTANCE)
			.min_by(|a, b| a.1.total_cmp(&b.1))
			.map(|(s, _)| s)
	}

	// === Drawing ===

	/// Start a line at `p`, bound to the shape under it when there is one.
	pub fn begin_line(&mut self, p: Point, line_type: LineType) {
		let start = match self.shapes.iter().rev().find(|s| s.contains(p)) {
			Some(shape) => LineEnd::Attached {
				shape_id: shape.id.clone(),
				point: shape.snap(p, SMART_CONNECT_DISTANCE),
			},
			None => LineEnd::Free(p),
		};
		debug!("map editor: begin line at ({}, {})", p.x, p.y);
		self.hovered_shape_id = None;
		self.draft = Some(DraftLine {
			line_type,
			start,
			pointer: p,
			preview_end: p,
			origin: p,
			candidate: None,
		});
	}

	/// Move the draft's free end. Snaps the preview near a shape and opens or
	/// closes the confirmation window.
	pub fn update_draft(&mut self, p: Point, now_ms: f64) -> SmartTimer {
		let Some(draft) = self.draft.as_ref() else {
			return SmartTimer::Unchanged;
		};
		let near = self
			.shape_near(p, draft.start.shape_id())
			.map(|s| (s.id.clone(), s.snap(p, SMART_CONNECT_DISTANCE), s.clone()));
		let previous = draft.candidate.as_ref().map(|c| c.shape_id.clone());

		let Some(draft) = self.draft.as_mut() else {
			return SmartTimer::Unchanged;
		};
		draft.pointer = p;
		match near {
			Some((shape_id, point, shape)) => {
				draft.preview_end = point.resolve(&shape);
				if previous.as_deref() == Some(shape_id.as_str()) {
					if let Some(c) = draft.candidate.as_mut() {
						c.point = point;
					}
					SmartTimer::Unchanged
				} else {
					draft.candidate = Some(SmartCandidate {
						shape_id,
						point,
						since_ms: now_ms,
					});
					self.hovered_shape_id = None;
					SmartTimer::Started
				}
			}
			None => {
				draft.preview_end = p;
				self.hovered_shape_id = None;
				if draft.candidate.take().is_some() {
					SmartTimer::Cancelled
				} else {
					SmartTimer::Unchanged
				}
			}
		}
	}

	/// Confirm the pending binding once its window has elapsed.
	pub fn poll(&mut self, now_ms: f64) -> bool {
		let Some(candidate) = self.draft.as_ref().and_then(|d| d.candidate.as_ref()) else {
			return false;
		};
		if now_ms - candidate.since_ms < SMART_CONFIRM_MS
			|| self.hovered_shape_id.as_deref() == Some(candidate.shape_id.as_str())
		{
			return false;
		}
		debug!("map editor: smart connection to {}", candidate.shape_id);
		self.hovered_shape_id = Some(candidate.shape_id.clone());
		true
	}

	/// Preview route of the draft.
	pub fn draft_path(&self) -> Option<LinePath> {
		let draft = self.draft.as_ref()?;
		Some(LinePath::generate(
			draft.line_type,
			self.resolve(&draft.start),
			draft.preview_end,
		))
	}

	/// Commit the draft. Returns the new line's id.
	pub fn finish_line(&mut self) -> Option<String> {
		let draft = self.draft.take()?;
		let hovered = self.hovered_shape_id.take();
		let confirmed = draft
			.candidate
			.as_ref()
			.is_some_and(|c| hovered.as_deref() == Some(c.shape_id.as_str()));
		// a click without movement is a cancel, not a zero-length line
		if !confirmed && draft.origin.distance(draft.pointer) < DEGENERATE_EPSILON {
			debug!("map editor: line cancelled on release");
			return None;
		}
		let end = match draft.candidate {
			Some(c) if hovered.as_deref() == Some(c.shape_id.as_str()) => LineEnd::Attached {
				shape_id: c.shape_id,
				point: c.point,
			},
			_ => LineEnd::Free(draft.pointer),
		};
		self.next_line += 1;
		let id = format!("line-{}", self.next_line);
		let path = LinePath::generate(draft.line_type, self.resolve(&draft.start), self.resolve(&end));
		info!("map editor: added {} ({:?})", id, path.line_type());
		self.lines.push(Line {
			id: id.clone(),
			line_type: draft.line_type,
			start: draft.start,
			end,
			path,
		});
		Some(id)
	}

	/// Discard the draft along with any pending or confirmed smart binding.
	pub fn cancel_line(&mut self) {
		if self.draft.take().is_some() {
			debug!("map editor: line cancelled");
		}
		self.hovered_shape_id = None;
	}

	// === Editing ===

	/// Draggable segment of an orthogonal line within `tolerance` of `p`.
	pub fn segment_at(&self, p: Point, tolerance: f64) -> Option<(String, usize)> {
		self.lines
			.iter()
			.filter(|l| l.path.is_orthogonal())
			.flat_map(|l| {
				l.path
					.segments()
					.into_iter()
					.enumerate()
					.filter(|(_, s)| s.draggable)
					.map(move |(i, s)| (l.id.as_str(), i, distance_to_segment(p, s.start, s.end)))
			})
			.filter(|(_, _, d)| *d <= tolerance)
			.min_by(|a, b| a.2.total_cmp(&b.2))
			.map(|(id, i, _)| (id.to_string(), i))
	}

	/// Grab a segment or, failing that, a shape under `p`.
	pub fn begin_drag(&mut self, p: Point) -> bool {
		if let Some((line_id, index)) = self.segment_at(p, SEGMENT_HIT_TOLERANCE) {
			self.drag = Some(Drag::Segment {
				line_id,
				index,
				last: p,
			});
		} else if let Some(shape) = self.shapes.iter().rev().find(|s| s.contains(p)) {
			self.drag = Some(Drag::Shape {
				shape_id: shape.id.clone(),
				last: p,
			});
		}
		self.drag.is_some()
	}

	pub fn drag_to(&mut self, p: Point) -> Result<(), RouteError> {
		match self.drag.as_mut() {
			Some(Drag::Segment {
				line_id,
				index,
				last,
			}) => {
				let delta = Point::new(p.x - last.x, p.y - last.y);
				*last = p;
				let (line_id, index) = (line_id.clone(), *index);
				match self.lines.iter_mut().find(|l| l.id == line_id) {
					Some(line) => line.path.drag_segment(index, delta),
					None => Ok(()),
				}
			}
			Some(Drag::Shape { shape_id, last }) => {
				let (dx, dy) = (p.x - last.x, p.y - last.y);
				*last = p;
				let shape_id = shape_id.clone();
				self.move_shape(&shape_id, dx, dy);
				Ok(())
			}
			None => Ok(()),
		}
	}

	pub fn end_drag(&mut self) {
		self.drag = None;
	}

	/// Move a shape and reroute every line attached to it.
	pub fn move_shape(&mut self, id: &str, dx: f64, dy: f64) {
		let Some(shape) = self.shapes.iter_mut().find(|s| s.id == id) else {
			return;
		};
		shape.translate(dx, dy);
		let attached: Vec<usize> = self
			.lines
			.iter()
			.enumerate()
			.filter(|(_, l)| l.start.shape_id() == Some(id) || l.end.shape_id() == Some(id))
			.map(|(i, _)| i)
			.collect();
		for i in attached {
			let (start, end) = (self.resolve(&self.lines[i].start), self.resolve(&self.lines[i].end));
			let line = &mut self.lines[i];
			line.path = LinePath::generate(line.line_type, start, end);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::map_editor::geometry::Side;

	fn editor() -> LineEditor {
		LineEditor::new(vec![
			Shape::new("a", 0.0, 0.0, 100.0, 60.0),
			Shape::new("b", 300.0, 200.0, 100.0, 60.0),
		])
	}

	// === Smart connection ===

	#[test]
	fn hovering_near_a_shape_for_the_window_confirms_it() {
		let mut e = editor();
		e.begin_line(Point::new(50.0, 30.0), LineType::Elbow);
		assert_eq!(e.update_draft(Point::new(285.0, 228.0), 1000.0), SmartTimer::Started);
		assert_eq!(e.pending_shape_id(), Some("b"));
		// preview snaps to the left midpoint
		assert_eq!(e.draft().unwrap().preview_end, Point::new(300.0, 230.0));

		assert_eq!(e.update_draft(Point::new(287.0, 231.0), 1200.0), SmartTimer::Unchanged);
		assert!(!e.poll(1499.0));
		assert_eq!(e.hovered_shape_id(), None);
		assert!(e.poll(1500.0));
		assert_eq!(e.hovered_shape_id(), Some("b"));
	}

	#[test]
	fn moving_away_before_the_window_cancels_it() {
		let mut e = editor();
		e.begin_line(Point::new(50.0, 30.0), LineType::Straight);
		e.update_draft(Point::new(285.0, 228.0), 1000.0);
		assert_eq!(e.update_draft(Point::new(200.0, 120.0), 1300.0), SmartTimer::Cancelled);
		assert_eq!(e.pending_shape_id(), None);
		assert!(!e.poll(1600.0));
		assert_eq!(e.hovered_shape_id(), None);
		assert_eq!(e.draft().unwrap().preview_end, Point::new(200.0, 120.0));
	}

	#[test]
	fn start_shape_never_becomes_a_target() {
		let mut e = editor();
		e.begin_line(Point::new(50.0, 30.0), LineType::Straight);
		assert_eq!(e.update_draft(Point::new(110.0, 30.0), 0.0), SmartTimer::Unchanged);
		assert_eq!(e.pending_shape_id(), None);
	}

	#[test]
	fn switching_shapes_restarts_the_window() {
		let mut e = LineEditor::new(vec![
			Shape::new("a", 0.0, 0.0, 50.0, 50.0),
			Shape::new("b", 200.0, 0.0, 50.0, 50.0),
			Shape::new("c", 200.0, 200.0, 50.0, 50.0),
		]);
		e.begin_line(Point::new(25.0, 25.0), LineType::Straight);
		e.update_draft(Point::new(190.0, 25.0), 0.0);
		assert_eq!(e.update_draft(Point::new(225.0, 190.0), 400.0), SmartTimer::Started);
		assert!(!e.poll(600.0));
		assert!(e.poll(900.0));
		assert_eq!(e.hovered_shape_id(), Some("c"));
	}

	#[test]
	fn escape_clears_draft_timer_and_hover() {
		let mut e = editor();
		e.begin_line(Point::new(50.0, 30.0), LineType::Straight);
		e.update_draft(Point::new(285.0, 228.0), 0.0);
		e.poll(600.0);
		assert_eq!(e.hovered_shape_id(), Some("b"));

		e.cancel_line();
		assert!(e.draft().is_none());
		assert_eq!(e.pending_shape_id(), None);
		assert_eq!(e.hovered_shape_id(), None);
		assert!(!e.poll(2000.0));
		assert_eq!(e.finish_line(), None);
		assert!(e.lines().is_empty());
	}

	// === Commit ===

	#[test]
	fn confirmed_line_attaches_to_the_target() {
		let mut e = editor();
		e.begin_line(Point::new(50.0, 30.0), LineType::Elbow);
		e.update_draft(Point::new(285.0, 228.0), 0.0);
		e.poll(500.0);
		let id = e.finish_line().unwrap();

		let line = e.line(&id).unwrap();
		assert_eq!(line.start.shape_id(), Some("a"));
		assert_eq!(
			line.end,
			LineEnd::Attached {
				shape_id: "b".into(),
				point: ConnectionPoint::Side(Side::Left),
			}
		);
		assert_eq!(line.path.end(), Point::new(300.0, 230.0));
		assert_eq!(e.hovered_shape_id(), None);
	}

	#[test]
	fn unconfirmed_line_ends_at_the_free_point() {
		let mut e = editor();
		e.begin_line(Point::new(50.0, 30.0), LineType::Straight);
		e.update_draft(Point::new(285.0, 228.0), 0.0);
		let id = e.finish_line().unwrap();
		assert_eq!(e.line(&id).unwrap().end, LineEnd::Free(Point::new(285.0, 228.0)));
	}

	#[test]
	fn click_without_movement_adds_no_line() {
		let mut e = editor();
		e.begin_line(Point::new(200.0, 120.0), LineType::Elbow);
		assert_eq!(e.finish_line(), None);
		assert!(e.draft().is_none());
		assert!(e.lines().is_empty());

		e.begin_line(Point::new(50.0, 30.0), LineType::Straight);
		e.update_draft(Point::new(50.2, 30.1), 0.0);
		assert_eq!(e.finish_line(), None);
		assert!(e.lines().is_empty());

		e.begin_line(Point::new(200.0, 120.0), LineType::Straight);
		e.update_draft(Point::new(210.0, 120.0), 0.0);
		assert_eq!(e.finish_line().as_deref(), Some("line-1"));
	}

	// === Dragging ===

	fn elbow_between_shapes() -> (LineEditor, String) {
		let mut e = editor();
		e.begin_line(Point::new(90.0, 30.0), LineType::Elbow);
		e.update_draft(Point::new(295.0, 230.0), 0.0);
		e.poll(500.0);
		let id = e.finish_line().unwrap();
		(e, id)
	}

	#[test]
	fn segment_drag_reroutes_the_middle_segment() {
		let (mut e, id) = elbow_between_shapes();
		let middle = e.line(&id).unwrap().path.segments()[1];
		let grab = middle.midpoint();
		assert_eq!(e.segment_at(grab, SEGMENT_HIT_TOLERANCE), Some((id.clone(), 1)));

		assert!(e.begin_drag(grab));
		e.drag_to(grab.offset(20.0, 0.0)).unwrap();
		e.end_drag();
		let moved = e.line(&id).unwrap().path.segments()[1];
		assert_eq!(moved.start.x, middle.start.x + 20.0);
		assert_eq!(moved.end.x, middle.end.x + 20.0);
	}

	#[test]
	fn shape_drag_regenerates_attached_lines() {
		let (mut e, id) = elbow_between_shapes();
		assert!(e.begin_drag(Point::new(350.0, 250.0)));
		e.drag_to(Point::new(350.0, 290.0)).unwrap();
		e.end_drag();

		assert_eq!(e.shape("b").unwrap().y, 240.0);
		let path = &e.line(&id).unwrap().path;
		assert_eq!(path.end(), Point::new(300.0, 270.0));
		assert_eq!(path.waypoints().len(), 4);
	}

	#[test]
	fn drag_on_empty_space_grabs_nothing() {
		let (mut e, _) = elbow_between_shapes();
		assert!(!e.begin_drag(Point::new(600.0, 600.0)));
		assert!(!e.is_dragging());
	}
}
