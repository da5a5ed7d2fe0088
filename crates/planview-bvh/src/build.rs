//! Surface Area Heuristic construction.

use planview_geom::{Aabb3, Point3};

use crate::BvhNode;

/// A primitive being sorted into the tree: (index, bounds, centroid).
pub(crate) type BuildItem = (u32, Aabb3, Point3);

const NUM_BUCKETS: usize = 12;

/// SAH traversal cost relative to one primitive test.
const TRAVERSAL_COST: f64 = 0.125;

/// Build a BVH node recursively using SAH.
pub(crate) fn build_node(items: &mut [BuildItem], max_leaf_size: usize) -> BvhNode {
    let mut bounds = Aabb3::empty();
    for (_, aabb, _) in items.iter() {
        bounds.include_aabb(aabb);
    }

    if items.len() <= max_leaf_size {
        return BvhNode::Leaf {
            aabb: bounds,
            primitives: items.iter().map(|(id, _, _)| *id).collect(),
        };
    }

    let mid = match find_best_split(items) {
        Some((axis, pos)) => partition(items, axis, pos),
        None => 0,
    };

    // Centroids all coincide or SAH found nothing useful: split by count.
    let mid = if mid == 0 || mid == items.len() {
        items.len() / 2
    } else {
        mid
    };

    let (left, right) = items.split_at_mut(mid);
    BvhNode::Internal {
        aabb: bounds,
        left: Box::new(build_node(left, max_leaf_size)),
        right: Box::new(build_node(right, max_leaf_size)),
    }
}

/// Find the best split axis and position over centroid bounds.
fn find_best_split(items: &[BuildItem]) -> Option<(usize, f64)> {
    let mut centroid_bounds = Aabb3::empty();
    let mut total = Aabb3::empty();
    for (_, aabb, c) in items {
        centroid_bounds.include_point(c);
        total.include_aabb(aabb);
    }
    let total_area = total.surface_area();

    let mut best: Option<(usize, f64)> = None;
    let mut best_cost = f64::INFINITY;

    for axis in 0..3 {
        let axis_min = centroid_bounds.min[axis];
        let axis_extent = centroid_bounds.max[axis] - axis_min;
        if axis_extent < 1e-12 {
            continue;
        }

        let mut bucket_counts = [0usize; NUM_BUCKETS];
        let mut bucket_bounds = [Aabb3::empty(); NUM_BUCKETS];

        for (_, aabb, c) in items {
            let b = ((c[axis] - axis_min) / axis_extent * NUM_BUCKETS as f64) as usize;
            let b = b.min(NUM_BUCKETS - 1);
            bucket_counts[b] += 1;
            bucket_bounds[b].include_aabb(aabb);
        }

        for split in 1..NUM_BUCKETS {
            let mut left_count = 0;
            let mut left_bounds = Aabb3::empty();
            for i in 0..split {
                left_count += bucket_counts[i];
                left_bounds.include_aabb(&bucket_bounds[i]);
            }

            let mut right_count = 0;
            let mut right_bounds = Aabb3::empty();
            for i in split..NUM_BUCKETS {
                right_count += bucket_counts[i];
                right_bounds.include_aabb(&bucket_bounds[i]);
            }

            if left_count == 0 || right_count == 0 {
                continue;
            }

            // Flat (zero-area) scenes degrade to a count-balanced cost.
            let cost = if total_area > 0.0 {
                TRAVERSAL_COST
                    + left_bounds.surface_area() / total_area * left_count as f64
                    + right_bounds.surface_area() / total_area * right_count as f64
            } else {
                TRAVERSAL_COST + (left_count as f64 - right_count as f64).abs()
            };

            if cost < best_cost {
                best_cost = cost;
                best = Some((
                    axis,
                    axis_min + (split as f64 / NUM_BUCKETS as f64) * axis_extent,
                ));
            }
        }
    }

    best
}

/// Partition items by centroid along an axis, returning the split index.
fn partition(items: &mut [BuildItem], axis: usize, pos: f64) -> usize {
    let mut left = 0;
    let mut right = items.len();

    while left < right {
        if items[left].2[axis] < pos {
            left += 1;
        } else {
            right -= 1;
            items.swap(left, right);
        }
    }

    left
}
