//! Core data types shared across the tracking pipeline.

use glam::DVec3;

/// The reference pose of the tracked object: an ordered vertex set plus the
/// undirected edges connecting them. Built once at [`crate::tracker::RopeTracker::new`]
/// and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Template {
    pub vertices: Vec<DVec3>,
    pub edges: Vec<(usize, usize)>,
}

impl Template {
    pub fn new(vertices: Vec<DVec3>, edges: Vec<(usize, usize)>) -> Self {
        Self { vertices, edges }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Rest length of every edge, in the same order as `self.edges`.
    pub fn rest_lengths(&self) -> Vec<f64> {
        self.edges
            .iter()
            .map(|&(i, j)| (self.vertices[i] - self.vertices[j]).length())
            .collect()
    }
}

/// A hard equality constraint consumed only by the post-optimizer: vertex
/// `index` must land exactly on `position` after optimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPoint {
    pub index: usize,
    pub position: DVec3,
}

/// Componentwise axis-aligned bounding box, `lo <= hi` on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lo: DVec3,
    pub hi: DVec3,
}

impl BoundingBox {
    pub const DEFAULT_LO: DVec3 = DVec3::new(-5.0, -5.0, -5.0);
    pub const DEFAULT_HI: DVec3 = DVec3::new(5.0, 5.0, 5.0);

    pub fn default_bounds() -> Self {
        Self {
            lo: Self::DEFAULT_LO,
            hi: Self::DEFAULT_HI,
        }
    }

    pub fn contains(&self, p: DVec3) -> bool {
        p.cmpge(self.lo).all() && p.cmple(self.hi).all()
    }

    pub fn expanded(&self, margin: f64) -> Self {
        let m = DVec3::splat(margin);
        Self {
            lo: self.lo - m,
            hi: self.hi + m,
        }
    }

    /// Componentwise min/max bounding box of a point set. Returns `None` for
    /// an empty set (there is nothing to bound).
    pub fn of_points(points: &[DVec3]) -> Option<Self> {
        let mut iter = points.iter().copied();
        let first = iter.next()?;
        let (lo, hi) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self { lo, hi })
    }
}

/// An RGB-tagged 3D point in the unfiltered organized cloud, or `None` where
/// the source pixel had invalid (zero) depth.
pub type OrganizedPoint = Option<(DVec3, [u8; 3])>;

/// The five-cloud bundle returned from every [`crate::tracker::RopeTracker::step`] call.
#[derive(Debug, Clone)]
pub struct TrackOutput {
    /// One entry per pixel, in row-major order; `None` where depth was invalid.
    pub unfiltered: Vec<OrganizedPoint>,
    /// Masked points inside the (expanded) bounding box.
    pub filtered: Vec<DVec3>,
    /// Voxel-downsampled `filtered`.
    pub downsampled: Vec<DVec3>,
    /// The template vertices as supplied this frame.
    pub template_in: Vec<DVec3>,
    /// The newly tracked vertex positions.
    pub tracked: Vec<DVec3>,
}
