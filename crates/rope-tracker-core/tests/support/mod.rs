//! Synthetic scene generator shared by the seed-scenario integration tests:
//! a straight-line rope template, a pinhole camera, and rendered depth/mask
//! buffers so every scenario is a literal, reproducible input rather than a
//! hand-typed pixel array.

use glam::DVec3;
use rope_tracker_core::Projection;

pub const WIDTH: usize = 128;
pub const HEIGHT: usize = 128;

/// A straight-line rope template lying at `z` meters from the camera,
/// `n` vertices, `spacing` meters apart, centered on the optical axis.
pub fn straight_line_template(n: usize, spacing: f64, z: f64) -> Vec<DVec3> {
    (0..n)
        .map(|i| DVec3::new((i as f64 - (n as f64 - 1.0) / 2.0) * spacing, 0.0, z))
        .collect()
}

pub fn chain_edges(n: usize) -> Vec<(usize, usize)> {
    (0..n - 1).map(|i| (i, i + 1)).collect()
}

pub fn test_projection() -> Projection {
    Projection::new([
        [200.0, 0.0, WIDTH as f64 / 2.0, 0.0],
        [0.0, 200.0, HEIGHT as f64 / 2.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ])
}

/// Renders `depth` (millimeters), `mask` (0/255), and a flat gray `rgb`
/// buffer for a rope made of `points`, splatting each projected vertex onto
/// a small disk of pixels so voxel downsampling has real neighborhoods to
/// work with.
pub fn render_scene(points: &[DVec3], width: usize, height: usize) -> (Vec<u16>, Vec<u8>, Vec<u8>) {
    let proj = test_projection();
    let mut depth = vec![0u16; width * height];
    let mut mask = vec![0u8; width * height];

    for p in points {
        let uvz = proj.project_full(*p);
        if uvz.z <= 0.0 {
            continue;
        }
        let u = (uvz.x / uvz.z).round() as i64;
        let v = (uvz.y / uvz.z).round() as i64;
        for dv in -1..=1 {
            for du in -1..=1 {
                let pu = u + du;
                let pv = v + dv;
                if pu < 0 || pv < 0 || pu >= width as i64 || pv >= height as i64 {
                    continue;
                }
                let idx = pv as usize * width + pu as usize;
                depth[idx] = (p.z * 1000.0).round() as u16;
                mask[idx] = 255;
            }
        }
    }
    let rgb = vec![128u8; width * height * 3];
    (depth, mask, rgb)
}

/// Zeroes the mask (and depth) on pixel columns `>= width/2`, simulating an
/// occluder covering the right half of the scene.
pub fn occlude_right_half(depth: &mut [u16], mask: &mut [u8], width: usize, height: usize) {
    for v in 0..height {
        for u in width / 2..width {
            let idx = v * width + u;
            depth[idx] = 0;
            mask[idx] = 0;
        }
    }
}
