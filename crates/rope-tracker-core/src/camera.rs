//! The 3x4 camera projection matrix and the intrinsics derived from it.

use crate::error::TrackerError;
use glam::DVec3;

/// A 3x4 camera projection matrix, row-major. Intrinsics (fx, fy, cx, cy)
/// are read from its left 3x3 block per the constructor contract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    rows: [[f64; 4]; 3],
}

impl Projection {
    pub fn new(rows: [[f64; 4]; 3]) -> Self {
        Self { rows }
    }

    /// Builds a `Projection` from a flat row-major 12-element slice,
    /// validating shape per the input-shape-violation error kind.
    pub fn from_row_major(values: &[f64]) -> Result<Self, TrackerError> {
        if values.len() != 12 {
            return Err(TrackerError::InputShape(format!(
                "projection matrix must have 12 elements (3x4), got {}",
                values.len()
            )));
        }
        let mut rows = [[0.0; 4]; 3];
        for r in 0..3 {
            rows[r].copy_from_slice(&values[r * 4..r * 4 + 4]);
        }
        Ok(Self { rows })
    }

    pub fn fx(&self) -> f64 {
        self.rows[0][0]
    }
    pub fn fy(&self) -> f64 {
        self.rows[1][1]
    }
    pub fn cx(&self) -> f64 {
        self.rows[0][2]
    }
    pub fn cy(&self) -> f64 {
        self.rows[1][2]
    }

    /// The left 3x3 block: the intrinsics matrix K.
    pub fn intrinsics(&self) -> [[f64; 3]; 3] {
        [
            [self.rows[0][0], self.rows[0][1], self.rows[0][2]],
            [self.rows[1][0], self.rows[1][1], self.rows[1][2]],
            [self.rows[2][0], self.rows[2][1], self.rows[2][2]],
        ]
    }

    /// Projects a 3D point with the full 3x4 matrix to homogeneous
    /// (u, v, z) image coordinates (before the perspective divide).
    pub fn project_full(&self, p: DVec3) -> DVec3 {
        let r = &self.rows;
        DVec3::new(
            r[0][0] * p.x + r[0][1] * p.y + r[0][2] * p.z + r[0][3],
            r[1][0] * p.x + r[1][1] * p.y + r[1][2] * p.z + r[1][3],
            r[2][0] * p.x + r[2][1] * p.y + r[2][2] * p.z + r[2][3],
        )
    }

    /// Projects a 3D point with only the 3x3 intrinsics block K. The
    /// free-space cost projects with this intrinsics-only block while the
    /// visibility prior projects with the full matrix; that asymmetry is
    /// intentional and both projections are kept as distinct methods.
    pub fn project_intrinsics(&self, p: DVec3) -> DVec3 {
        let k = self.intrinsics();
        DVec3::new(
            k[0][0] * p.x + k[0][1] * p.y + k[0][2] * p.z,
            k[1][0] * p.x + k[1][1] * p.y + k[1][2] * p.z,
            k[2][0] * p.x + k[2][1] * p.y + k[2][2] * p.z,
        )
    }
}

/// Perspective-divides a homogeneous (u, v, z) vector into pixel (u, v).
/// Returns `None` for non-finite results (degenerate z).
pub fn perspective_divide(uvz: DVec3) -> Option<(f64, f64)> {
    if uvz.z == 0.0 || !uvz.z.is_finite() {
        return None;
    }
    let u = uvz.x / uvz.z;
    let v = uvz.y / uvz.z;
    if u.is_finite() && v.is_finite() {
        Some((u, v))
    } else {
        None
    }
}
