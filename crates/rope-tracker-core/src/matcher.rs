//! Template history and nearest-template matching, used by the
//! recovery controller to re-seed tracking after catastrophic failure.

use std::collections::VecDeque;

use glam::DVec3;
use kiddo::{KdTree, SquaredEuclidean};

/// Sum of nearest-neighbor squared distances from each point in `query` to
/// its closest point in `target`, accelerated with a k-d tree over `target`.
fn nearest_sqdist_sum(query: &[DVec3], target: &[DVec3]) -> f64 {
    if target.is_empty() {
        return 0.0;
    }
    let mut tree: KdTree<f64, 3> = KdTree::new();
    for (i, p) in target.iter().enumerate() {
        tree.add(&[p.x, p.y, p.z], i as u64);
    }
    query
        .iter()
        .map(|p| tree.nearest_one::<SquaredEuclidean>(&[p.x, p.y, p.z]).distance)
        .sum()
}

/// Symmetric Chamfer distance between two voxel-downsampled clouds, used as
/// the template matcher's similarity metric. Lower is more similar.
pub fn chamfer_distance(a: &[DVec3], b: &[DVec3]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return f64::INFINITY;
    }
    let a_to_b = nearest_sqdist_sum(a, b) / a.len() as f64;
    let b_to_a = nearest_sqdist_sum(b, a) / b.len() as f64;
    a_to_b + b_to_a
}

/// An ordered, capacity-bounded history of (downsampled cloud, tracked
/// vertices) pairs, read by the recovery controller and written to only
/// when recovery is not triggered.
pub struct TemplateMatcher {
    capacity: usize,
    entries: VecDeque<(Vec<DVec3>, Vec<DVec3>)>,
}

impl TemplateMatcher {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a new entry, evicting the oldest once over capacity.
    pub fn add_template(&mut self, cloud_down: Vec<DVec3>, y: Vec<DVec3>) {
        self.entries.push_back((cloud_down, y));
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Returns the `Y`s of the `k` entries whose stored cloud is most
    /// similar to `cloud_down`. Ties are broken by insertion recency (the
    /// more recently added entry wins).
    pub fn query_template(&self, cloud_down: &[DVec3], k: usize) -> Vec<Vec<DVec3>> {
        let mut scored: Vec<(f64, usize)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, (cloud, _))| (chamfer_distance(cloud_down, cloud), idx))
            .collect();

        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then(b.1.cmp(&a.1)));

        scored
            .into_iter()
            .take(k)
            .map(|(_, idx)| self.entries[idx].1.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut matcher = TemplateMatcher::new(2);
        matcher.add_template(vec![DVec3::ZERO], vec![DVec3::new(1.0, 0.0, 0.0)]);
        matcher.add_template(vec![DVec3::ZERO], vec![DVec3::new(2.0, 0.0, 0.0)]);
        matcher.add_template(vec![DVec3::ZERO], vec![DVec3::new(3.0, 0.0, 0.0)]);
        assert_eq!(matcher.len(), 2);
    }

    #[test]
    fn query_returns_closest_cloud_first() {
        let mut matcher = TemplateMatcher::new(10);
        matcher.add_template(vec![DVec3::new(0.0, 0.0, 0.0)], vec![DVec3::new(100.0, 0.0, 0.0)]);
        matcher.add_template(vec![DVec3::new(5.0, 0.0, 0.0)], vec![DVec3::new(200.0, 0.0, 0.0)]);

        let query = vec![DVec3::new(0.1, 0.0, 0.0)];
        let results = matcher.query_template(&query, 1);
        assert_eq!(results[0][0], DVec3::new(100.0, 0.0, 0.0));
    }

    #[test]
    fn empty_matcher_returns_no_candidates() {
        let matcher = TemplateMatcher::new(10);
        let results = matcher.query_template(&[DVec3::ZERO], 5);
        assert!(results.is_empty());
    }
}
