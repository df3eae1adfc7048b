//! Voxel-grid downsampling: one centroid per occupied axis-aligned cubic cell.

use std::collections::HashMap;

use glam::DVec3;

#[derive(Default, Clone, Copy)]
struct Accum {
    sum: DVec3,
    count: u32,
}

/// Reduces `points` to one representative per occupied voxel of side `leaf`,
/// the representative being the centroid of the points that fell in it.
///
/// Deterministic with respect to input ordering up to floating-point
/// summation: voxel keys are emitted in sorted order so that `HashMap`'s
/// unspecified iteration order never leaks into the result.
pub fn voxel_downsample(points: &[DVec3], leaf: f64) -> Vec<DVec3> {
    if points.is_empty() || leaf <= 0.0 {
        return points.to_vec();
    }

    let mut voxels: HashMap<(i64, i64, i64), Accum> = HashMap::new();
    for &p in points {
        let key = (
            (p.x / leaf).floor() as i64,
            (p.y / leaf).floor() as i64,
            (p.z / leaf).floor() as i64,
        );
        let entry = voxels.entry(key).or_default();
        entry.sum += p;
        entry.count += 1;
    }

    let mut keys: Vec<_> = voxels.keys().copied().collect();
    keys.sort_unstable();

    keys.into_iter()
        .map(|k| {
            let a = voxels[&k];
            a.sum / a.count as f64
        })
        .collect()
}
