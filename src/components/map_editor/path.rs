use thiserror::Error;

use super::geometry::{Point, distance_to_segment};

/// Lines shorter than this, or elbow deltas smaller than it, route straight.
pub const DEGENERATE_EPSILON: f64 = 0.5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineType {
	#[default]
	Straight,
	Elbow,
	Curved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
	Horizontal,
	Vertical,
	Diagonal,
}

impl Orientation {
	fn of(a: Point, b: Point) -> Self {
		if (b.y - a.y).abs() < DEGENERATE_EPSILON {
			Orientation::Horizontal
		} else if (b.x - a.x).abs() < DEGENERATE_EPSILON {
			Orientation::Vertical
		} else {
			Orientation::Diagonal
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineSegment {
	pub start: Point,
	pub end: Point,
	pub orientation: Orientation,
	pub draggable: bool,
}

impl LineSegment {
	pub fn midpoint(&self) -> Point {
		Point::new(
			(self.start.x + self.end.x) / 2.0,
			(self.start.y + self.end.y) / 2.0,
		)
	}
}

#[derive(Debug, Error, PartialEq)]
pub enum RouteError {
	#[error("segment {index} out of range for a path of {count} segments")]
	OutOfRange { index: usize, count: usize },
	#[error("segment {0} is fixed and cannot be dragged")]
	NotDraggable(usize),
}

/// Routed geometry of one connector.
#[derive(Clone, Debug, PartialEq)]
pub struct LinePath {
	line_type: LineType,
	waypoints: Vec<Point>,
	controls: Option<(Point, Point)>,
}

impl LinePath {
	/// Route from `start` to `end`. Degenerate input routes straight.
	pub fn generate(line_type: LineType, start: Point, end: Point) -> Self {
		let (dx, dy) = (end.x - start.x, end.y - start.y);
		let (mx, my) = ((start.x + end.x) / 2.0, (start.y + end.y) / 2.0);
		let degenerate = start.distance(end) < DEGENERATE_EPSILON;

		match line_type {
			LineType::Elbow
				if !degenerate && dx.abs() >= DEGENERATE_EPSILON && dy.abs() >= DEGENERATE_EPSILON =>
			{
				let waypoints = if dx.abs() >= dy.abs() {
					vec![start, Point::new(mx, start.y), Point::new(mx, end.y), end]
				} else {
					vec![start, Point::new(start.x, my), Point::new(end.x, my), end]
				};
				Self {
					line_type,
					waypoints,
					controls: None,
				}
			}
			LineType::Curved if !degenerate => {
				let controls = if dx.abs() >= dy.abs() {
					(Point::new(mx, start.y), Point::new(mx, end.y))
				} else {
					(Point::new(start.x, my), Point::new(end.x, my))
				};
				Self {
					line_type,
					waypoints: vec![start, end],
					controls: Some(controls),
				}
			}
			_ => Self {
				line_type: LineType::Straight,
				waypoints: vec![start, end],
				controls: None,
			},
		}
	}

	/// Routing actually used, after any degenerate fallback.
	pub fn line_type(&self) -> LineType {
		self.line_type
	}

	pub fn waypoints(&self) -> &[Point] {
		&self.waypoints
	}

	pub fn controls(&self) -> Option<(Point, Point)> {
		self.controls
	}

	pub fn start(&self) -> Point {
		self.waypoints[0]
	}

	pub fn end(&self) -> Point {
		self.waypoints[self.waypoints.len() - 1]
	}

	pub fn is_orthogonal(&self) -> bool {
		self.line_type == LineType::Elbow
	}

	pub fn segments(&self) -> Vec<LineSegment> {
		let last = self.waypoints.len().saturating_sub(2);
		self.waypoints
			.windows(2)
			.enumerate()
			.map(|(i, pair)| LineSegment {
				start: pair[0],
				end: pair[1],
				orientation: Orientation::of(pair[0], pair[1]),
				// segments touching a connection point stay put
				draggable: self.is_orthogonal() && i != 0 && i != last,
			})
			.collect()
	}

	/// Shift a draggable segment along its perpendicular axis. The shared
	/// waypoints carry the neighbouring segments along with it.
	pub fn drag_segment(&mut self, index: usize, delta: Point) -> Result<(), RouteError> {
		let segments = self.segments();
		let segment = segments.get(index).ok_or(RouteError::OutOfRange {
			index,
			count: segments.len(),
		})?;
		if !segment.draggable {
			return Err(RouteError::NotDraggable(index));
		}
		match segment.orientation {
			Orientation::Vertical => {
				self.waypoints[index].x += delta.x;
				self.waypoints[index + 1].x += delta.x;
			}
			Orientation::Horizontal => {
				self.waypoints[index].y += delta.y;
				self.waypoints[index + 1].y += delta.y;
			}
			Orientation::Diagonal => return Err(RouteError::NotDraggable(index)),
		}
		Ok(())
	}

	pub fn to_svg(&self) -> String {
		let start = self.start();
		let mut d = format!("M {} {}", start.x, start.y);
		match self.controls {
			Some((c1, c2)) => {
				let end = self.end();
				d.push_str(&format!(" C {} {} {} {} {} {}", c1.x, c1.y, c2.x, c2.y, end.x, end.y));
			}
			None => {
				for p in &self.waypoints[1..] {
					d.push_str(&format!(" L {} {}", p.x, p.y));
				}
			}
		}
		d
	}

	/// Distance from `p` to the drawn polyline (the chord for curves).
	pub fn distance_to(&self, p: Point) -> f64 {
		self.waypoints
			.windows(2)
			.map(|pair| distance_to_segment(p, pair[0], pair[1]))
			.fold(f64::INFINITY, f64::min)
	}
}
