/// A point in editor (SVG user) space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

impl Point {
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	pub fn distance(self, other: Point) -> f64 {
		(other.x - self.x).hypot(other.y - self.y)
	}

	pub fn offset(self, dx: f64, dy: f64) -> Self {
		Self::new(self.x + dx, self.y + dy)
	}
}

/// Distance from `p` to the segment `a`-`b`.
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
	let (dx, dy) = (b.x - a.x, b.y - a.y);
	let len_sq = dx * dx + dy * dy;
	if len_sq == 0.0 {
		return p.distance(a);
	}
	let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
	p.distance(Point::new(a.x + t * dx, a.y + t * dy))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
	Top,
	Right,
	Bottom,
	Left,
}

impl Side {
	pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];
}

/// Where a line end is bound on a shape. Stored relative to the shape so it
/// follows the shape when it moves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConnectionPoint {
	/// Midpoint of a side; the four defaults.
	Side(Side),
	/// Arbitrary point on a side, `t` in `[0, 1]` along it.
	Edge { side: Side, t: f64 },
}

impl ConnectionPoint {
	pub fn side(&self) -> Side {
		match *self {
			ConnectionPoint::Side(side) | ConnectionPoint::Edge { side, .. } => side,
		}
	}

	pub fn resolve(&self, shape: &Shape) -> Point {
		match *self {
			ConnectionPoint::Side(side) => shape.point_on(side, 0.5),
			ConnectionPoint::Edge { side, t } => shape.point_on(side, t),
		}
	}
}

/// An axis-aligned box; `x`/`y` is the top-left corner.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
	pub id: String,
	pub x: f64,
	pub y: f64,
	pub width: f64,
	pub height: f64,
}

impl Shape {
	pub fn new(id: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
		Self {
			id: id.into(),
			x,
			y,
			width,
			height,
		}
	}

	pub fn center(&self) -> Point {
		Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
	}

	pub fn contains(&self, p: Point) -> bool {
		p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
	}

	pub fn point_on(&self, side: Side, t: f64) -> Point {
		let t = t.clamp(0.0, 1.0);
		match side {
			Side::Top => Point::new(self.x + self.width * t, self.y),
			Side::Right => Point::new(self.x + self.width, self.y + self.height * t),
			Side::Bottom => Point::new(self.x + self.width * t, self.y + self.height),
			Side::Left => Point::new(self.x, self.y + self.height * t),
		}
	}

	pub fn default_points(&self) -> [(Side, Point); 4] {
		Side::ALL.map(|side| (side, self.point_on(side, 0.5)))
	}

	/// Closest point on the outline to `p`, whether `p` is inside or out.
	pub fn nearest_edge_point(&self, p: Point) -> (Side, f64, Point) {
		let ratio = |v: f64, origin: f64, extent: f64| {
			if extent > 0.0 {
				((v - origin) / extent).clamp(0.0, 1.0)
			} else {
				0.5
			}
		};
		let (tx, ty) = (ratio(p.x, self.x, self.width), ratio(p.y, self.y, self.height));
		let mut best = (Side::Top, tx, self.point_on(Side::Top, tx));
		for (side, t) in [(Side::Right, ty), (Side::Bottom, tx), (Side::Left, ty)] {
			let candidate = self.point_on(side, t);
			if p.distance(candidate) < p.distance(best.2) {
				best = (side, t, candidate);
			}
		}
		best
	}

	/// Distance from `p` to the shape; zero inside it.
	pub fn distance_to(&self, p: Point) -> f64 {
		if self.contains(p) {
			0.0
		} else {
			p.distance(self.nearest_edge_point(p).2)
		}
	}

	/// Binding for a line end near this shape: the closest default point when
	/// it lies within `snap_distance`, otherwise the nearest outline point.
	pub fn snap(&self, p: Point, snap_distance: f64) -> ConnectionPoint {
		let nearest_default = self
			.default_points()
			.into_iter()
			.map(|(side, point)| (side, p.distance(point)))
			.min_by(|a, b| a.1.total_cmp(&b.1));
		match nearest_default {
			Some((side, d)) if d <= snap_distance => ConnectionPoint::Side(side),
			_ => {
				let (side, t, _) = self.nearest_edge_point(p);
				ConnectionPoint::Edge { side, t }
			}
		}
	}

	pub fn translate(&mut self, dx: f64, dy: f64) {
		self.x += dx;
		self.y += dy;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn shape() -> Shape {
		Shape::new("s", 100.0, 100.0, 120.0, 60.0)
	}

	#[test]
	fn default_points_are_side_midpoints() {
		let points = shape().default_points();
		assert_eq!(points[0], (Side::Top, Point::new(160.0, 100.0)));
		assert_eq!(points[1], (Side::Right, Point::new(220.0, 130.0)));
		assert_eq!(points[2], (Side::Bottom, Point::new(160.0, 160.0)));
		assert_eq!(points[3], (Side::Left, Point::new(100.0, 130.0)));
	}

	#[test]
	fn nearest_edge_point_from_outside_and_inside() {
		let s = shape();
		let (side, _, p) = s.nearest_edge_point(Point::new(120.0, 80.0));
		assert_eq!((side, p), (Side::Top, Point::new(120.0, 100.0)));

		let (side, _, p) = s.nearest_edge_point(Point::new(215.0, 140.0));
		assert_eq!((side, p), (Side::Right, Point::new(220.0, 140.0)));
	}

	#[test]
	fn distance_is_zero_inside() {
		let s = shape();
		assert_eq!(s.distance_to(Point::new(150.0, 120.0)), 0.0);
		assert_eq!(s.distance_to(Point::new(250.0, 130.0)), 30.0);
	}

	#[test]
	fn snap_prefers_default_point_within_distance() {
		let s = shape();
		assert_eq!(
			s.snap(Point::new(235.0, 140.0), 30.0),
			ConnectionPoint::Side(Side::Right)
		);
		// far along the top edge, no midpoint nearby
		match s.snap(Point::new(105.0, 90.0), 30.0) {
			ConnectionPoint::Edge { side, t } => {
				assert_eq!(side, Side::Top);
				assert!((t - 5.0 / 120.0).abs() < 1e-9);
			}
			other => panic!("expected an edge point, got {other:?}"),
		}
	}

	#[test]
	fn connection_point_follows_shape() {
		let mut s = shape();
		let cp = ConnectionPoint::Edge {
			side: Side::Bottom,
			t: 0.25,
		};
		assert_eq!(cp.resolve(&s), Point::new(130.0, 160.0));
		s.translate(10.0, -20.0);
		assert_eq!(cp.resolve(&s), Point::new(140.0, 140.0));
	}

	#[test]
	fn distance_to_segment_clamps_to_endpoints() {
		let (a, b) = (Point::new(0.0, 0.0), Point::new(10.0, 0.0));
		assert_eq!(distance_to_segment(Point::new(5.0, 3.0), a, b), 3.0);
		assert_eq!(distance_to_segment(Point::new(13.0, 4.0), a, b), 5.0);
		assert_eq!(distance_to_segment(Point::new(3.0, 4.0), a, a), 5.0);
	}
}
