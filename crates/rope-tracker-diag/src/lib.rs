//! Optional diagnostic dumps for inspecting a tracking run offline.
//!
//! Nothing in `rope-tracker-core` calls into this crate; every function here
//! is an opt-in side effect a caller wires up explicitly (e.g. behind a CLI
//! flag or an environment variable check at the call site). None of it is
//! load-bearing for tracking correctness.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use glam::DVec3;
use image::{GrayImage, Luma};
use rope_tracker_core::priors::chamfer_distance_to_mask;
use rope_tracker_core::TrackOutput;

/// Writes a point set as plain-text `x y z` rows, one point per line.
pub fn write_point_cloud_xyz(path: impl AsRef<Path>, points: &[DVec3]) -> Result<()> {
    let file = File::create(&path).with_context(|| format!("creating {}", path.as_ref().display()))?;
    let mut w = BufWriter::new(file);
    for p in points {
        writeln!(w, "{} {} {}", p.x, p.y, p.z)?;
    }
    Ok(())
}

/// Writes the binary mask as an 8-bit grayscale PNG (0 or 255 per pixel).
pub fn write_mask_png(path: impl AsRef<Path>, mask: &[u8], width: u32, height: u32) -> Result<()> {
    let mut img = GrayImage::new(width, height);
    for (i, px) in img.pixels_mut().enumerate() {
        *px = Luma([if mask[i] != 0 { 255 } else { 0 }]);
    }
    img.save(&path)
        .with_context(|| format!("saving {}", path.as_ref().display()))
}

/// Renders the mask's chamfer distance transform as a normalized grayscale
/// PNG, brightest where farthest from any masked pixel. Useful for
/// sanity-checking the distance field the visibility prior and free-space
/// cost are built on.
pub fn write_distance_transform_png(path: impl AsRef<Path>, mask: &[u8], width: u32, height: u32) -> Result<()> {
    let dist = chamfer_distance_to_mask(mask, width as usize, height as usize);
    let max = dist.iter().copied().fold(0.0_f64, f64::max).max(1e-9);

    let mut img = GrayImage::new(width, height);
    for (i, px) in img.pixels_mut().enumerate() {
        let v = ((dist[i] / max).clamp(0.0, 1.0) * 255.0).round() as u8;
        *px = Luma([v]);
    }
    img.save(&path)
        .with_context(|| format!("saving {}", path.as_ref().display()))
}

/// Dumps every cloud in a [`TrackOutput`] to `dir` as `.xyz` files, named by
/// pipeline stage. Skips the `unfiltered` organized cloud (dense, one entry
/// per pixel with gaps) since it is rarely useful outside interactive replay.
pub fn dump_track_output(dir: impl AsRef<Path>, output: &TrackOutput) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    write_point_cloud_xyz(dir.join("filtered.xyz"), &output.filtered)?;
    write_point_cloud_xyz(dir.join("downsampled.xyz"), &output.downsampled)?;
    write_point_cloud_xyz(dir.join("template_in.xyz"), &output.template_in)?;
    write_point_cloud_xyz(dir.join("tracked.xyz"), &output.tracked)?;

    tracing::debug!(dir = %dir.display(), "wrote diagnostic clouds for this frame");
    Ok(())
}
