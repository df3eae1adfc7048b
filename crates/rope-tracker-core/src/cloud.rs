//! Back-projects depth + RGB + mask into an unfiltered organized cloud and a
//! filtered, masked, box-clipped cloud of candidate object points.

use glam::DVec3;
use tracing::trace;

use crate::camera::Projection;
use crate::error::TrackerError;
use crate::types::{BoundingBox, OrganizedPoint};

/// Millimeters-to-meters scale applied to raw depth samples.
pub const DEPTH_SCALE: f64 = 1e-3;

pub struct CloudBuilderInput<'a> {
    pub depth: &'a [u16],
    pub rgb: &'a [u8],
    pub mask: &'a [u8],
    pub width: usize,
    pub height: usize,
}

impl CloudBuilderInput<'_> {
    fn validate(&self) -> Result<(), TrackerError> {
        let n = self.width * self.height;
        if self.depth.len() != n {
            return Err(TrackerError::InputShape(format!(
                "depth buffer has {} elements, expected {}x{}={}",
                self.depth.len(),
                self.width,
                self.height,
                n
            )));
        }
        if self.mask.len() != n {
            return Err(TrackerError::InputShape(format!(
                "mask buffer has {} elements, expected {}",
                self.mask.len(),
                n
            )));
        }
        if self.rgb.len() != n * 3 {
            return Err(TrackerError::InputShape(format!(
                "rgb buffer has {} elements, expected {}",
                self.rgb.len(),
                n * 3
            )));
        }
        Ok(())
    }
}

pub struct CloudBuilderOutput {
    /// Row-major, one entry per pixel; `None` where depth was invalid.
    pub unfiltered: Vec<OrganizedPoint>,
    /// Masked points that also fall inside `bbox`.
    pub filtered: Vec<DVec3>,
    /// Pixel coordinates (u, v) of each `filtered` point, parallel to it.
    pub filtered_pixels: Vec<(u32, u32)>,
}

/// Builds the organized and filtered clouds for one frame. Masked points that
/// land outside `bbox` are dropped silently (a single aggregate diagnostic is
/// traced at the end of the call, per-pixel tracing would be far too noisy at
/// frame rate).
pub fn build_clouds(
    input: &CloudBuilderInput<'_>,
    proj: &Projection,
    bbox: &BoundingBox,
) -> Result<CloudBuilderOutput, TrackerError> {
    input.validate()?;

    let (fx, fy, cx, cy) = (proj.fx(), proj.fy(), proj.cx(), proj.cy());
    let width = input.width;
    let height = input.height;

    let mut unfiltered = Vec::with_capacity(width * height);
    let mut filtered = Vec::new();
    let mut filtered_pixels = Vec::new();
    let mut dropped_out_of_box = 0u64;

    for v in 0..height {
        for u in 0..width {
            let idx = v * width + u;
            let d = input.depth[idx];
            if d == 0 {
                unfiltered.push(None);
                continue;
            }

            let z = d as f64 * DEPTH_SCALE;
            let x = (u as f64 - cx) * z / fx;
            let y = (v as f64 - cy) * z / fy;
            let point = DVec3::new(x, y, z);

            let rgb_idx = idx * 3;
            let rgb = [
                input.rgb[rgb_idx],
                input.rgb[rgb_idx + 1],
                input.rgb[rgb_idx + 2],
            ];
            unfiltered.push(Some((point, rgb)));

            if input.mask[idx] != 0 {
                if bbox.contains(point) {
                    filtered.push(point);
                    filtered_pixels.push((u as u32, v as u32));
                } else {
                    dropped_out_of_box += 1;
                }
            }
        }
    }

    if dropped_out_of_box > 0 {
        trace!(
            dropped_out_of_box,
            "masked points fell outside the expanded bounding box and were dropped"
        );
    }

    Ok(CloudBuilderOutput {
        unfiltered,
        filtered,
        filtered_pixels,
    })
}
