//! Tree structure and traversal.

use planview_geom::{Aabb3, Ray, Transform};

use crate::build::{build_node, BuildItem};

/// A BVH node - either a leaf holding primitive indices or an internal node.
#[derive(Debug, Clone)]
pub enum BvhNode {
    /// Leaf node.
    Leaf {
        /// Bounds of every primitive in the leaf.
        aabb: Aabb3,
        /// Primitive indices contained in this leaf.
        primitives: Vec<u32>,
    },
    /// Internal node with two children.
    Internal {
        /// Bounds of both children.
        aabb: Aabb3,
        /// Left child node.
        left: Box<BvhNode>,
        /// Right child node.
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    /// Bounding box of this node.
    pub fn aabb(&self) -> &Aabb3 {
        match self {
            BvhNode::Leaf { aabb, .. } => aabb,
            BvhNode::Internal { aabb, .. } => aabb,
        }
    }

    fn depth(&self) -> usize {
        match self {
            BvhNode::Leaf { .. } => 1,
            BvhNode::Internal { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Bounding volume hierarchy over a set of primitive boxes.
#[derive(Debug, Clone)]
pub struct Bvh {
    root: Option<BvhNode>,
    primitive_bounds: Vec<Aabb3>,
}

impl Bvh {
    /// Build a BVH over `bounds` (one box per primitive, indexed by position).
    ///
    /// Empty boxes are left out of the tree and are never reported.
    pub fn build(bounds: &[Aabb3], max_leaf_size: usize) -> Self {
        let mut items: Vec<BuildItem> = bounds
            .iter()
            .enumerate()
            .filter(|(_, aabb)| !aabb.is_empty())
            .map(|(i, aabb)| (i as u32, *aabb, aabb.center()))
            .collect();

        let root = if items.is_empty() {
            None
        } else {
            Some(build_node(&mut items, max_leaf_size.max(1)))
        };

        Self {
            root,
            primitive_bounds: bounds.to_vec(),
        }
    }

    /// Root node, if any primitives were indexed.
    pub fn root(&self) -> Option<&BvhNode> {
        self.root.as_ref()
    }

    /// Bounds of the whole tree (empty for an empty tree).
    pub fn bounds(&self) -> Aabb3 {
        self.root.as_ref().map_or_else(Aabb3::empty, |r| *r.aabb())
    }

    /// Box of primitive `index` as given to [`Bvh::build`].
    pub fn primitive_bounds(&self, index: u32) -> &Aabb3 {
        &self.primitive_bounds[index as usize]
    }

    /// Number of primitives (including skipped empty ones).
    pub fn len(&self) -> usize {
        self.primitive_bounds.len()
    }

    /// True if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Tree depth (0 for an empty tree).
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, BvhNode::depth)
    }

    /// Visit every primitive whose leaf box the ray enters within `[0, max_t]`.
    pub fn raycast(&self, ray: &Ray, max_t: f64, mut visit: impl FnMut(u32)) {
        if let Some(root) = &self.root {
            raycast_node(root, ray, max_t, &self.primitive_bounds, &mut visit);
        }
    }

    /// Descend into nodes accepted by `intersects_bounds` and call
    /// `intersects_primitive` for each primitive of an accepted leaf.
    ///
    /// Returns `true` as soon as `intersects_primitive` returns `true`.
    pub fn shapecast<B, P>(&self, mut intersects_bounds: B, mut intersects_primitive: P) -> bool
    where
        B: FnMut(&Aabb3) -> bool,
        P: FnMut(u32) -> bool,
    {
        match &self.root {
            Some(root) => shapecast_node(
                root,
                &self.primitive_bounds,
                &mut intersects_bounds,
                &mut intersects_primitive,
            ),
            None => false,
        }
    }

    /// Joint traversal of `self` and `other`.
    ///
    /// `other_to_self` maps `other`'s frame into this tree's frame. `visit`
    /// receives `(self_primitive, other_primitive)` for every pair whose
    /// boxes overlap; returning `true` stops the traversal, and the call then
    /// returns `true`.
    pub fn bvhcast<F>(&self, other: &Bvh, other_to_self: &Transform, mut visit: F) -> bool
    where
        F: FnMut(u32, u32) -> bool,
    {
        let (Some(a), Some(b)) = (&self.root, &other.root) else {
            return false;
        };
        let transform = (!other_to_self.is_identity()).then_some(other_to_self);
        let mut cast = DualCast {
            a_bounds: &self.primitive_bounds,
            b_bounds: &other.primitive_bounds,
            transform,
            visit: &mut visit,
        };
        cast.pair(a, b)
    }
}

fn raycast_node(
    node: &BvhNode,
    ray: &Ray,
    max_t: f64,
    bounds: &[Aabb3],
    visit: &mut impl FnMut(u32),
) {
    if !ray.hits_aabb_within(node.aabb(), max_t) {
        return;
    }
    match node {
        BvhNode::Leaf { primitives, .. } => {
            for &p in primitives {
                if ray.hits_aabb_within(&bounds[p as usize], max_t) {
                    visit(p);
                }
            }
        }
        BvhNode::Internal { left, right, .. } => {
            raycast_node(left, ray, max_t, bounds, visit);
            raycast_node(right, ray, max_t, bounds, visit);
        }
    }
}

fn shapecast_node<B, P>(
    node: &BvhNode,
    bounds: &[Aabb3],
    intersects_bounds: &mut B,
    intersects_primitive: &mut P,
) -> bool
where
    B: FnMut(&Aabb3) -> bool,
    P: FnMut(u32) -> bool,
{
    if !intersects_bounds(node.aabb()) {
        return false;
    }
    match node {
        BvhNode::Leaf { primitives, .. } => {
            for &p in primitives {
                if intersects_bounds(&bounds[p as usize]) && intersects_primitive(p) {
                    return true;
                }
            }
            false
        }
        BvhNode::Internal { left, right, .. } => {
            shapecast_node(left, bounds, intersects_bounds, intersects_primitive)
                || shapecast_node(right, bounds, intersects_bounds, intersects_primitive)
        }
    }
}

struct DualCast<'a, F> {
    a_bounds: &'a [Aabb3],
    b_bounds: &'a [Aabb3],
    transform: Option<&'a Transform>,
    visit: &'a mut F,
}

impl<F> DualCast<'_, F>
where
    F: FnMut(u32, u32) -> bool,
{
    fn to_a_frame(&self, aabb: &Aabb3) -> Aabb3 {
        match self.transform {
            Some(t) => aabb.transformed(t),
            None => *aabb,
        }
    }

    fn pair(&mut self, a: &BvhNode, b: &BvhNode) -> bool {
        let b_box = self.to_a_frame(b.aabb());
        if !a.aabb().overlaps(&b_box) {
            return false;
        }

        match (a, b) {
            (
                BvhNode::Leaf { primitives: pa, .. },
                BvhNode::Leaf { primitives: pb, .. },
            ) => {
                for &j in pb {
                    let bj = self.to_a_frame(&self.b_bounds[j as usize]);
                    for &i in pa {
                        if self.a_bounds[i as usize].overlaps(&bj) && (self.visit)(i, j) {
                            return true;
                        }
                    }
                }
                false
            }
            (BvhNode::Leaf { .. }, BvhNode::Internal { left, right, .. }) => {
                self.pair(a, left) || self.pair(a, right)
            }
            (BvhNode::Internal { left, right, .. }, BvhNode::Leaf { .. }) => {
                self.pair(left, b) || self.pair(right, b)
            }
            (
                BvhNode::Internal {
                    left: al,
                    right: ar,
                    ..
                },
                BvhNode::Internal {
                    left: bl,
                    right: br,
                    ..
                },
            ) => {
                // Split the larger node first to keep the pair boxes balanced.
                if a.aabb().surface_area() >= b_box.surface_area() {
                    self.pair(al, b) || self.pair(ar, b)
                } else {
                    self.pair(a, bl) || self.pair(a, br)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planview_geom::{Point3, Vec3};

    fn unit_boxes_along_x(n: usize) -> Vec<Aabb3> {
        (0..n)
            .map(|i| {
                let x = i as f64 * 2.0;
                Aabb3::new(Point3::new(x, 0.0, 0.0), Point3::new(x + 1.0, 1.0, 1.0))
            })
            .collect()
    }

    #[test]
    fn test_build_empty() {
        let bvh = Bvh::build(&[], 4);
        assert!(bvh.is_empty());
        assert!(!bvh.shapecast(|_| true, |_| true));
    }

    #[test]
    fn test_leaf_size_respected() {
        let bvh = Bvh::build(&unit_boxes_along_x(64), 4);
        fn check(node: &BvhNode) {
            match node {
                BvhNode::Leaf { primitives, .. } => assert!(primitives.len() <= 4),
                BvhNode::Internal { left, right, .. } => {
                    check(left);
                    check(right);
                }
            }
        }
        check(bvh.root().unwrap());
        assert!(bvh.depth() > 1);
    }

    #[test]
    fn test_shapecast_collects_overlaps() {
        let boxes = unit_boxes_along_x(32);
        let bvh = Bvh::build(&boxes, 4);
        let query = Aabb3::new(Point3::new(3.5, 0.5, 0.5), Point3::new(8.5, 0.6, 0.6));
        let mut found = Vec::new();
        bvh.shapecast(
            |aabb| aabb.overlaps(&query),
            |p| {
                found.push(p);
                false
            },
        );
        found.sort_unstable();
        assert_eq!(found, vec![2, 3, 4]);
    }

    #[test]
    fn test_shapecast_stops_early() {
        let bvh = Bvh::build(&unit_boxes_along_x(32), 2);
        let mut visited = 0;
        let stopped = bvh.shapecast(
            |_| true,
            |_| {
                visited += 1;
                true
            },
        );
        assert!(stopped);
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_raycast_hits_boxes_in_range() {
        let bvh = Bvh::build(&unit_boxes_along_x(8), 2);
        let ray = Ray::new(Point3::new(-1.0, 0.5, 0.5), Vec3::x());
        let mut hit = Vec::new();
        bvh.raycast(&ray, 5.5, |p| hit.push(p));
        hit.sort_unstable();
        assert_eq!(hit, vec![0, 1, 2]);
    }

    #[test]
    fn test_bvhcast_matches_brute_force() {
        let a = unit_boxes_along_x(20);
        let b: Vec<Aabb3> = (0..15)
            .map(|i| {
                let x = i as f64 * 2.7;
                Aabb3::new(Point3::new(x, 0.2, 0.2), Point3::new(x + 0.5, 0.8, 0.8))
            })
            .collect();
        let ta = Bvh::build(&a, 3);
        let tb = Bvh::build(&b, 3);

        let mut pairs = Vec::new();
        ta.bvhcast(&tb, &Transform::identity(), |i, j| {
            pairs.push((i, j));
            false
        });
        pairs.sort_unstable();

        let mut expected = Vec::new();
        for (i, ba) in a.iter().enumerate() {
            for (j, bb) in b.iter().enumerate() {
                if ba.overlaps(bb) {
                    expected.push((i as u32, j as u32));
                }
            }
        }
        assert_eq!(pairs, expected);
    }

    #[test]
    fn test_bvhcast_under_transform() {
        let a = unit_boxes_along_x(4);
        let b = unit_boxes_along_x(1);
        let ta = Bvh::build(&a, 1);
        let tb = Bvh::build(&b, 1);
        // Move the single box onto the third box of `a`.
        let t = Transform::translation(4.0, 0.0, 0.0);
        let mut pairs = Vec::new();
        ta.bvhcast(&tb, &t, |i, j| {
            pairs.push((i, j));
            false
        });
        assert_eq!(pairs, vec![(2, 0)]);
    }
}
