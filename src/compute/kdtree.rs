//! Static KD-tree over 2D points.
//!
//! Points are stored flat and reordered in place so that every subtree is a
//! contiguous run of the arrays: the median of a run splits it on alternating
//! axes until a run holds at most `node_size + 1` points. Queries walk the
//! same runs with an explicit stack and fall back to a linear scan at the
//! leaves. The tree is immutable once built; it is rebuilt, never edited.

use smallvec::SmallVec;

type Stack = SmallVec<[(usize, usize, usize); 32]>;

/// Immutable KD-tree returning the insertion indices of matching points.
#[derive(Debug, Clone)]
pub struct KdTree {
    node_size: usize,
    ids: Vec<usize>,
    coords: Vec<[f64; 2]>,
}

impl KdTree {
    /// Build a tree from points given in insertion order.
    ///
    /// # Examples
    ///
    /// ```
    /// use mapcluster::compute::kdtree::KdTree;
    ///
    /// let tree = KdTree::build([[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]], 64);
    /// assert_eq!(tree.range(0.5, 0.5, 1.5, 1.5), vec![1]);
    /// ```
    pub fn build<I>(points: I, node_size: usize) -> Self
    where
        I: IntoIterator<Item = [f64; 2]>,
    {
        let node_size = node_size.max(1);
        let mut entries: Vec<(usize, [f64; 2])> = points.into_iter().enumerate().collect();
        sort_runs(&mut entries, node_size, 0);

        let (ids, coords) = entries.into_iter().unzip();
        Self {
            node_size,
            ids,
            coords,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Indices of all points inside the axis-aligned box, edges included.
    pub fn range(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<usize> {
        let mut result = Vec::new();
        if self.is_empty() {
            return result;
        }

        let inside = |[x, y]: [f64; 2]| x >= min_x && x <= max_x && y >= min_y && y <= max_y;

        let mut stack: Stack = SmallVec::new();
        stack.push((0, self.ids.len() - 1, 0));

        while let Some((left, right, axis)) = stack.pop() {
            if right - left <= self.node_size {
                for i in left..=right {
                    if inside(self.coords[i]) {
                        result.push(self.ids[i]);
                    }
                }
                continue;
            }

            let m = (left + right) / 2;
            let coord = self.coords[m];
            if inside(coord) {
                result.push(self.ids[m]);
            }

            let (low, high) = if axis == 0 { (min_x, max_x) } else { (min_y, max_y) };
            if low <= coord[axis] {
                stack.push((left, m - 1, 1 - axis));
            }
            if high >= coord[axis] {
                stack.push((m + 1, right, 1 - axis));
            }
        }

        result
    }

    /// Indices of all points within `radius` of `(x, y)`, boundary included.
    pub fn within(&self, x: f64, y: f64, radius: f64) -> Vec<usize> {
        let mut result = Vec::new();
        if self.is_empty() || radius < 0.0 {
            return result;
        }

        let r2 = radius * radius;
        let close = |[px, py]: [f64; 2]| {
            let dx = px - x;
            let dy = py - y;
            dx * dx + dy * dy <= r2
        };

        let mut stack: Stack = SmallVec::new();
        stack.push((0, self.ids.len() - 1, 0));

        while let Some((left, right, axis)) = stack.pop() {
            if right - left <= self.node_size {
                for i in left..=right {
                    if close(self.coords[i]) {
                        result.push(self.ids[i]);
                    }
                }
                continue;
            }

            let m = (left + right) / 2;
            let coord = self.coords[m];
            if close(coord) {
                result.push(self.ids[m]);
            }

            let center = if axis == 0 { x } else { y };
            if center - radius <= coord[axis] {
                stack.push((left, m - 1, 1 - axis));
            }
            if center + radius >= coord[axis] {
                stack.push((m + 1, right, 1 - axis));
            }
        }

        result
    }
}

// Runs longer than `node_size + 1` are split at their median; the split index
// matches the `(left + right) / 2` used by the queries.
fn sort_runs(entries: &mut [(usize, [f64; 2])], node_size: usize, axis: usize) {
    if entries.len() <= node_size + 1 {
        return;
    }

    let m = (entries.len() - 1) / 2;
    entries.select_nth_unstable_by(m, |a, b| a.1[axis].total_cmp(&b.1[axis]));

    let (low, rest) = entries.split_at_mut(m);
    sort_runs(low, node_size, 1 - axis);
    sort_runs(&mut rest[1..], node_size, 1 - axis);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scatter(n: usize) -> Vec<[f64; 2]> {
        // Deterministic LCG so failures reproduce.
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        (0..n).map(|_| [next(), next()]).collect()
    }

    fn sorted(mut ids: Vec<usize>) -> Vec<usize> {
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(std::iter::empty(), 8);
        assert!(tree.is_empty());
        assert!(tree.range(0.0, 0.0, 1.0, 1.0).is_empty());
        assert!(tree.within(0.5, 0.5, 1.0).is_empty());
    }

    #[test]
    fn test_range_matches_brute_force() {
        let points = scatter(2_000);
        for node_size in [1, 4, 64] {
            let tree = KdTree::build(points.iter().copied(), node_size);
            assert_eq!(tree.len(), points.len());

            let (min_x, min_y, max_x, max_y) = (0.2, 0.35, 0.45, 0.6);
            let expected: Vec<usize> = points
                .iter()
                .enumerate()
                .filter(|(_, [x, y])| *x >= min_x && *x <= max_x && *y >= min_y && *y <= max_y)
                .map(|(i, _)| i)
                .collect();

            assert_eq!(sorted(tree.range(min_x, min_y, max_x, max_y)), expected);
        }
    }

    #[test]
    fn test_within_matches_brute_force() {
        let points = scatter(1_500);
        let tree = KdTree::build(points.iter().copied(), 3);

        let (cx, cy, r) = (0.5, 0.5, 0.1);
        let expected: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, [x, y])| (x - cx).powi(2) + (y - cy).powi(2) <= r * r)
            .map(|(i, _)| i)
            .collect();

        assert!(!expected.is_empty());
        assert_eq!(sorted(tree.within(cx, cy, r)), expected);
    }

    #[test]
    fn test_duplicate_points_are_all_returned() {
        let tree = KdTree::build(vec![[0.5, 0.5]; 10], 2);
        assert_eq!(sorted(tree.within(0.5, 0.5, 0.0)), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_query_order_is_deterministic() {
        let points = scatter(500);
        let a = KdTree::build(points.iter().copied(), 4);
        let b = KdTree::build(points.iter().copied(), 4);
        assert_eq!(
            a.range(0.1, 0.1, 0.9, 0.9),
            b.range(0.1, 0.1, 0.9, 0.9)
        );
    }
}
