//! Every tunable knob the tracker exposes, bundled into one serializable
//! struct so a caller can round-trip a configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// LLE neighborhood size.
    pub k_lle: usize,
    /// LLE Gram-matrix regularizer.
    pub lle_reg: f64,

    /// CPD membrane stiffness.
    pub alpha: f64,
    /// CPD coherence kernel width squared.
    pub beta: f64,
    /// CPD outlier weight.
    pub w: f64,
    /// Scales the data-driven initial sigma^2 estimate.
    pub initial_sigma_scale: f64,
    /// Initial LLE annealing weight.
    pub start_lambda: f64,
    /// Per-iteration multiplicative decay of the LLE annealing weight.
    pub annealing_factor: f64,
    /// CPD convergence tolerance on sigma^2 change.
    pub tolerance: f64,
    /// Maximum CPD iterations.
    pub max_iterations: usize,

    /// Voxel-downsampler leaf size, in meters.
    pub voxel_leaf: f64,
    /// Bounding-box expansion margin applied before cloud building, in meters.
    pub bounding_box_margin: f64,

    /// Post-optimizer edge-length slack factor (edges are capped at
    /// `rest_length * (1 + post_optimizer_slack)`).
    pub post_optimizer_slack: f64,

    /// Visibility-prior exponential decay constant.
    pub visibility_k: f64,
    /// Free-space-cost exponential decay constant.
    pub free_space_k: f64,

    /// Recovery trigger threshold on the free-space cost.
    pub recovery_tau: f64,
    /// Recovery is only attempted once the matcher holds more than this many templates.
    pub recovery_k_r: usize,
    /// Template-history capacity.
    pub matcher_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            k_lle: 8,
            lle_reg: 1e-3,

            alpha: 3.0,
            beta: 1.0,
            w: 0.1,
            initial_sigma_scale: 1.0 / 8.0,
            start_lambda: 1.0,
            annealing_factor: 0.6,
            tolerance: 1e-4,
            max_iterations: 100,

            voxel_leaf: 0.02,
            bounding_box_margin: 0.1,

            post_optimizer_slack: 1.0,

            visibility_k: 10.0,
            free_space_k: 1e2,

            recovery_tau: 0.5,
            recovery_k_r: 12,
            matcher_capacity: 1500,
        }
    }
}
