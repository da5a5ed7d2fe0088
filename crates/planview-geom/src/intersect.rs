//! Triangle/plane and triangle/triangle intersection.

use crate::{Line3, Plane, Point3, Triangle, EPSILON, POINT_EPSILON};

/// Cut a triangle with a plane.
///
/// Returns the segment where the plane crosses the triangle, or `None` when
/// the triangle lies on one side, touches at a single vertex, or lies in the
/// plane.
pub fn triangle_plane_cut(tri: &Triangle, plane: &Plane) -> Option<Line3> {
    let pts = tri.points();
    let d = pts.map(|p| plane.signed_distance(&p));

    let mut hits: Vec<Point3> = Vec::with_capacity(3);
    let mut push_unique = |p: Point3| {
        if !hits.iter().any(|q| (q - p).norm() < POINT_EPSILON) {
            hits.push(p);
        }
    };

    for i in 0..3 {
        let j = (i + 1) % 3;
        if d[i].abs() < EPSILON {
            push_unique(pts[i]);
        }
        let crosses = (d[i] > EPSILON && d[j] < -EPSILON) || (d[i] < -EPSILON && d[j] > EPSILON);
        if crosses {
            let t = d[i] / (d[i] - d[j]);
            push_unique(pts[i] + (pts[j] - pts[i]) * t);
        }
    }

    if hits.len() == 2 {
        Some(Line3::new(hits[0], hits[1]))
    } else {
        None
    }
}

/// Segment along which two triangles cross.
///
/// Returns `None` for parallel or coplanar triangles, zero-area triangles,
/// and pairs that only touch at a point.
pub fn triangle_intersection(a: &Triangle, b: &Triangle) -> Option<Line3> {
    let pa = a.plane()?;
    let pb = b.plane()?;

    let dir = pa.normal.cross(&pb.normal);
    let dir_len = dir.norm();
    if dir_len < EPSILON {
        return None;
    }
    let dir = dir / dir_len;

    let seg_a = triangle_plane_cut(a, &pb)?;
    let seg_b = triangle_plane_cut(b, &pa)?;

    // Both segments lie on the planes' common line; orient them along `dir`
    // and intersect their extents.
    let orient = |seg: Line3| {
        if dir.dot(&seg.delta()) < 0.0 {
            seg.reversed()
        } else {
            seg
        }
    };
    let seg_a = orient(seg_a);
    let seg_b = orient(seg_b);
    let proj = |p: &Point3| dir.dot(&p.coords);

    let start = if proj(&seg_a.start) >= proj(&seg_b.start) {
        seg_a.start
    } else {
        seg_b.start
    };
    let end = if proj(&seg_a.end) <= proj(&seg_b.end) {
        seg_a.end
    } else {
        seg_b.end
    };

    if proj(&end) - proj(&start) < POINT_EPSILON {
        return None;
    }
    Some(Line3::new(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat() -> Triangle {
        Triangle::new(
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(2.0, -1.0, 0.0),
            Point3::new(-1.0, 2.0, 0.0),
        )
    }

    #[test]
    fn test_plane_cut_crossing() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, -1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        );
        let cut = triangle_plane_cut(&tri, &flat().plane().unwrap()).unwrap();
        assert!(cut.start.z.abs() < 1e-12 && cut.end.z.abs() < 1e-12);
        assert!((cut.length() - (0.5f64 * 0.5 * 2.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_plane_cut_one_side() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.0, 1.0, 2.0),
        );
        assert!(triangle_plane_cut(&tri, &flat().plane().unwrap()).is_none());
    }

    #[test]
    fn test_crossing_triangles() {
        let vertical = Triangle::new(
            Point3::new(0.0, 0.0, -1.0),
            Point3::new(0.5, 0.0, 1.0),
            Point3::new(-0.5, 0.0, 1.0),
        );
        let seg = triangle_intersection(&flat(), &vertical).unwrap();
        assert!(seg.start.y.abs() < 1e-12 && seg.end.y.abs() < 1e-12);
        assert!((seg.length() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_coplanar_triangles_do_not_intersect() {
        let other = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        assert!(triangle_intersection(&flat(), &other).is_none());
    }

    #[test]
    fn test_separated_triangles() {
        let far = Triangle::new(
            Point3::new(10.0, 0.0, -1.0),
            Point3::new(10.5, 0.0, 1.0),
            Point3::new(9.5, 0.0, 1.0),
        );
        assert!(triangle_intersection(&flat(), &far).is_none());
    }
}
