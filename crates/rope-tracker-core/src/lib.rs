//! Frame-to-frame tracking of a deformable 1D object (rope, cable, hose)
//! from posed RGB-D + mask input, using visibility-weighted CPD-LLE
//! registration followed by a geometric post-optimizer and a
//! template-history recovery controller.
//!
//! [`RopeTracker`] is the entry point: build one from a reference cloud and
//! edge topology, then call [`RopeTracker::step`] once per frame.

pub mod camera;
pub mod cloud;
pub mod config;
pub mod cpd;
pub mod error;
pub mod lle;
pub mod matcher;
pub mod post_optimizer;
pub mod priors;
pub mod tracker;
pub mod types;
pub mod voxel;

pub use camera::Projection;
pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use post_optimizer::{PostOptimizer, ProjectedGaussSeidelOptimizer};
pub use tracker::RopeTracker;
pub use types::{BoundingBox, FixedPoint, OrganizedPoint, Template, TrackOutput};
