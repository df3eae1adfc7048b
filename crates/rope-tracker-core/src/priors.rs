//! The visibility prior and the free-space cost. Both project
//! template vertices into the depth/mask image and combine a depth-ordering
//! term with a distance-to-mask term; they deliberately differ in which
//! projection they use, whether the distance image is normalized, and the
//! sign of the depth difference.

use glam::DVec3;

use crate::camera::Projection;
use crate::cloud::DEPTH_SCALE;

/// Approximate Euclidean distance transform of the mask *complement*: the
/// value at each pixel is the (chamfer-approximated) Euclidean distance to
/// the nearest pixel where `mask != 0`.
///
/// This is a two-pass chamfer transform (weights 1 for axis-aligned steps,
/// sqrt(2) for diagonal steps), not an exact EDT. Adequate at the mask
/// feature scales relevant here, and there is no OpenCV-equivalent exact-EDT
/// crate in this stack.
pub fn chamfer_distance_to_mask(mask: &[u8], width: usize, height: usize) -> Vec<f64> {
    const INF: f64 = f64::MAX / 4.0;
    const STEP: f64 = 1.0;
    const DIAG: f64 = std::f64::consts::SQRT_2;

    let mut dist = vec![INF; width * height];
    for (i, &m) in mask.iter().enumerate() {
        if m != 0 {
            dist[i] = 0.0;
        }
    }

    let idx = |x: i64, y: i64| -> usize { y as usize * width + x as usize };

    // Forward pass: top-left to bottom-right.
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let mut best = dist[idx(x, y)];
            if x > 0 {
                best = best.min(dist[idx(x - 1, y)] + STEP);
            }
            if y > 0 {
                best = best.min(dist[idx(x, y - 1)] + STEP);
                if x > 0 {
                    best = best.min(dist[idx(x - 1, y - 1)] + DIAG);
                }
                if x + 1 < width as i64 {
                    best = best.min(dist[idx(x + 1, y - 1)] + DIAG);
                }
            }
            dist[idx(x, y)] = best;
        }
    }

    // Backward pass: bottom-right to top-left.
    for y in (0..height as i64).rev() {
        for x in (0..width as i64).rev() {
            let mut best = dist[idx(x, y)];
            if x + 1 < width as i64 {
                best = best.min(dist[idx(x + 1, y)] + STEP);
            }
            if y + 1 < height as i64 {
                best = best.min(dist[idx(x, y + 1)] + STEP);
                if x + 1 < width as i64 {
                    best = best.min(dist[idx(x + 1, y + 1)] + DIAG);
                }
                if x > 0 {
                    best = best.min(dist[idx(x - 1, y + 1)] + DIAG);
                }
            }
            dist[idx(x, y)] = best;
        }
    }

    dist
}

/// Min-max normalizes `values` to `[0, 1]`. Returns all-zero if the range is
/// degenerate (constant image), matching `cv::normalize`'s behavior of being
/// a no-op-ish clamp rather than dividing by zero.
fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|&v| (v - min) / range).collect()
}

/// Clamps `x` to `[lo, hi]`; NaN maps to `lo`, matching the source's
/// `min(max(x, lo), hi)` idiom evaluated under C++'s NaN-propagates-as-false
/// comparison semantics (a NaN input there ends up pinned to the lower
/// bound once it passes through both comparisons).
fn clamp_continuous(x: f64, lo: f64, hi: f64) -> f64 {
    if x.is_nan() {
        return lo;
    }
    x.clamp(lo, hi)
}

/// Projects `p` to pixel coordinates using `project`, applies the continuous
/// clamp to `[0, W] x [0, H]`, then the final integer-pixel clamp to
/// `[0, W-1] x [1, H-1]`. The vertical lower bound of 1 (not 0) is
/// intentional and preserved from the source.
fn project_to_pixel(uvz: DVec3, width: usize, height: usize) -> (usize, usize) {
    let (u, v) = if uvz.z != 0.0 && uvz.z.is_finite() {
        (uvz.x / uvz.z, uvz.y / uvz.z)
    } else {
        (f64::NAN, f64::NAN)
    };

    let u = clamp_continuous(u, 0.0, width as f64);
    let v = clamp_continuous(v, 0.0, height as f64);

    let pu = (u as i64).clamp(0, width as i64 - 1);
    let pv = (v as i64).clamp(1, height as i64 - 1);
    (pu as usize, pv as usize)
}

/// Non-normalized probability that each template vertex could have produced
/// any observed point, given depth ordering and distance-to-mask.
pub fn visibility_prior(
    vertices: &[DVec3],
    proj: &Projection,
    depth: &[u16],
    mask: &[u8],
    width: usize,
    height: usize,
    k: f64,
) -> Vec<f64> {
    let dist_raw = chamfer_distance_to_mask(mask, width, height);
    let dist_norm = min_max_normalize(&dist_raw);

    vertices
        .iter()
        .map(|&v| {
            let uvz = proj.project_full(v);
            let (pu, pv) = project_to_pixel(uvz, width, height);
            let pixel = pv * width + pu;

            let d_raw = depth[pixel];
            let mut delta = if d_raw != 0 {
                v.z - d_raw as f64 * DEPTH_SCALE
            } else {
                0.02
            };
            delta = delta.max(0.0);

            let dm = dist_norm[pixel];
            let score = dm * delta;
            (-k * score).exp()
        })
        .collect()
}

/// Smooth free-space cost: fraction of vertices that project into free,
/// far-from-mask space. Large values (near 1) indicate tracking has likely
/// been lost; used by the recovery controller.
pub fn free_space_cost(
    vertices: &[DVec3],
    proj: &Projection,
    depth: &[u16],
    mask: &[u8],
    width: usize,
    height: usize,
    k: f64,
) -> f64 {
    let dist_raw = chamfer_distance_to_mask(mask, width, height);

    let mut sum = 0.0;
    let mut count = 0u32;

    for &v in vertices {
        let uvz = proj.project_intrinsics(v);
        let (pu, pv) = project_to_pixel(uvz, width, height);
        let pixel = pv * width + pu;

        let d_raw = depth[pixel];
        if d_raw == 0 {
            continue; // delta is NaN here; excluded from the mean, per spec.
        }
        let delta = d_raw as f64 * DEPTH_SCALE - v.z;

        let dm = dist_raw[pixel];
        let prob = 1.0 - (-k * dm * delta.max(0.0)).exp();
        sum += prob;
        count += 1;
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
