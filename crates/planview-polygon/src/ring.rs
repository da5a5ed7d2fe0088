//! Integer points and rings.
//!
//! All predicates here are exact: coordinates are `i64` and every cross
//! product is evaluated in `i128`.

/// A fixed-point 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntPoint {
    /// X coordinate.
    pub x: i64,
    /// Y coordinate.
    pub y: i64,
}

impl IntPoint {
    /// Create a point.
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Twice the signed area of triangle `(a, b, c)`; positive when counter-clockwise.
#[inline]
pub fn orient(a: IntPoint, b: IntPoint, c: IntPoint) -> i128 {
    let abx = (b.x - a.x) as i128;
    let aby = (b.y - a.y) as i128;
    let acx = (c.x - a.x) as i128;
    let acy = (c.y - a.y) as i128;
    abx * acy - aby * acx
}

/// True if `p` lies on the closed segment `[a, b]`.
pub fn on_segment(p: IntPoint, a: IntPoint, b: IntPoint) -> bool {
    orient(a, b, p) == 0
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

/// True if the closed segments `[a, b]` and `[c, d]` share at least one point.
pub fn segments_touch(a: IntPoint, b: IntPoint, c: IntPoint, d: IntPoint) -> bool {
    let d1 = orient(c, d, a).signum();
    let d2 = orient(c, d, b).signum();
    let d3 = orient(a, b, c).signum();
    let d4 = orient(a, b, d).signum();

    if d1 * d2 < 0 && d3 * d4 < 0 {
        return true;
    }
    (d1 == 0 && on_segment(a, c, d))
        || (d2 == 0 && on_segment(b, c, d))
        || (d3 == 0 && on_segment(c, a, b))
        || (d4 == 0 && on_segment(d, a, b))
}

/// True if `p` lies inside or on the closed triangle, in either winding.
///
/// Degenerate triangles contain nothing.
pub fn triangle_contains(tri: &[IntPoint; 3], p: IntPoint) -> bool {
    let sign = orient(tri[0], tri[1], tri[2]).signum();
    if sign == 0 {
        return false;
    }
    (0..3).all(|i| orient(tri[i], tri[(i + 1) % 3], p).signum() * sign >= 0)
}

/// A closed ring of integer points (the closing point is implicit).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntRing {
    points: Vec<IntPoint>,
}

impl IntRing {
    /// Create a ring from its vertices.
    pub fn new(points: Vec<IntPoint>) -> Self {
        Self { points }
    }

    /// Ring vertices.
    pub fn points(&self) -> &[IntPoint] {
        &self.points
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the ring has no vertices.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate the ring's edges, including the closing one.
    pub fn segments(&self) -> impl Iterator<Item = (IntPoint, IntPoint)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// Twice the signed area (shoelace); positive when counter-clockwise.
    pub fn signed_area2(&self) -> i128 {
        self.segments()
            .map(|(a, b)| a.x as i128 * b.y as i128 - b.x as i128 * a.y as i128)
            .sum()
    }

    /// Reverse the winding in place.
    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Make the winding counter-clockwise (`true`) or clockwise (`false`).
    pub fn orient(&mut self, ccw: bool) {
        let area = self.signed_area2();
        if (area > 0) != ccw && area != 0 {
            self.reverse();
        }
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty ring.
    pub fn bounds(&self) -> Option<(IntPoint, IntPoint)> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (
                IntPoint::new(lo.x.min(p.x), lo.y.min(p.y)),
                IntPoint::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }

    /// Even-odd crossing count of a ray from `p` toward +X.
    ///
    /// Points exactly on an edge never toggle; callers that care about the
    /// boundary check it separately with [`IntRing::touches_segment`].
    pub fn crossings(&self, p: IntPoint) -> usize {
        self.segments()
            .filter(|&(a, b)| {
                if (a.y > p.y) == (b.y > p.y) {
                    return false;
                }
                let cross = orient(a, b, p);
                cross != 0 && (cross > 0) == (b.y > a.y)
            })
            .count()
    }

    /// True if any edge of the ring touches the closed segment `[a, b]`.
    pub fn touches_segment(&self, a: IntPoint, b: IntPoint) -> bool {
        self.segments().any(|(c, d)| segments_touch(a, b, c, d))
    }

    /// Remove duplicate, collinear and spike vertices.
    ///
    /// A vertex is dropped when it lies within `tolerance` of the chord
    /// between its neighbours. Returns `None` when fewer than three vertices
    /// or zero area remain.
    pub fn compacted(&self, tolerance: f64) -> Option<IntRing> {
        let mut points = self.points.clone();
        points.dedup();
        while points.len() > 1 && points.first() == points.last() {
            points.pop();
        }

        let mut changed = true;
        while changed && points.len() >= 3 {
            changed = false;
            let n = points.len();
            let mut kept: Vec<IntPoint> = Vec::with_capacity(n);
            for i in 0..n {
                let prev = kept.last().copied().unwrap_or(points[(i + n - 1) % n]);
                let next = points[(i + 1) % n];
                if is_redundant(prev, points[i], next, tolerance) {
                    changed = true;
                } else {
                    kept.push(points[i]);
                }
            }
            points = kept;
        }

        let ring = IntRing::new(points);
        (ring.len() >= 3 && ring.signed_area2() != 0).then_some(ring)
    }
}

fn is_redundant(prev: IntPoint, p: IntPoint, next: IntPoint, tolerance: f64) -> bool {
    if p == prev || p == next {
        return true;
    }
    if prev == next {
        // Spike.
        return true;
    }
    let dx = (next.x - prev.x) as f64;
    let dy = (next.y - prev.y) as f64;
    let chord = (dx * dx + dy * dy).sqrt();
    (orient(prev, next, p) as f64).abs() / chord <= tolerance
}

/// Push each vertex of a triangle outward from its centroid by `amount` units.
///
/// The result is counter-clockwise.
pub fn inflate_triangle(tri: &[IntPoint; 3], amount: i64) -> IntRing {
    let cx = tri.iter().map(|p| p.x as f64).sum::<f64>() / 3.0;
    let cy = tri.iter().map(|p| p.y as f64).sum::<f64>() / 3.0;
    let points = tri
        .iter()
        .map(|p| {
            let dx = p.x as f64 - cx;
            let dy = p.y as f64 - cy;
            let len = (dx * dx + dy * dy).sqrt();
            if len == 0.0 {
                return *p;
            }
            let k = amount as f64 / len;
            IntPoint::new(
                (p.x as f64 + dx * k).round() as i64,
                (p.y as f64 + dy * k).round() as i64,
            )
        })
        .collect();
    let mut ring = IntRing::new(points);
    ring.orient(true);
    ring
}
