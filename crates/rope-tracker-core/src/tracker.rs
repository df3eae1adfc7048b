//! Top-level orchestration: ties the cloud builder, voxel downsampler,
//! visibility prior, CPD-LLE registration, post-optimizer, and recovery
//! controller together into the single blocking `step` call.

use glam::DVec3;
use nalgebra::DMatrix;
use tracing::{info_span, warn};

use crate::camera::Projection;
use crate::cloud::{build_clouds, CloudBuilderInput};
use crate::config::TrackerConfig;
use crate::cpd;
use crate::error::{Result, TrackerError};
use crate::lle::compute_lle;
use crate::matcher::TemplateMatcher;
use crate::post_optimizer::{PostOptimizer, ProjectedGaussSeidelOptimizer};
use crate::priors::{free_space_cost, visibility_prior};
use crate::types::{BoundingBox, FixedPoint, Template, TrackOutput};
use crate::voxel::voxel_downsample;

/// The per-frame tracking engine. Owns everything that persists across
/// calls to [`step`](RopeTracker::step): the reference template, its edge
/// rest-lengths, the LLE operator, the camera projection, the template
/// history, the bounding box, and the current vertex estimate.
pub struct RopeTracker {
    template: Template,
    rest_lengths: Vec<f64>,
    m_lle: DMatrix<f64>,
    projection: Projection,
    bbox: BoundingBox,
    matcher: TemplateMatcher,
    y: Vec<DVec3>,
    use_recovery: bool,
    config: TrackerConfig,
    post_optimizer: Box<dyn PostOptimizer + Send>,
}

impl RopeTracker {
    /// Builds a tracker from a reference cloud (establishing T0), its edge
    /// topology, the camera projection, and whether recovery is enabled.
    pub fn new(
        reference_cloud: Vec<DVec3>,
        edges: Vec<(usize, usize)>,
        projection: Projection,
        use_recovery: bool,
        config: TrackerConfig,
    ) -> Self {
        let template = Template::new(reference_cloud, edges);
        let rest_lengths = template.rest_lengths();
        let (_, m_lle) = compute_lle(&template.vertices, config.k_lle, config.lle_reg);
        let y = template.vertices.clone();

        Self {
            template,
            rest_lengths,
            m_lle,
            projection,
            bbox: BoundingBox::default_bounds(),
            matcher: TemplateMatcher::new(config.matcher_capacity),
            y,
            use_recovery,
            config,
            post_optimizer: Box::new(ProjectedGaussSeidelOptimizer::default()),
        }
    }

    /// Swaps in a different post-optimizer (e.g. a real SOCP/QP solver
    /// binding), keeping the "external collaborator" seam genuinely open.
    pub fn with_post_optimizer(mut self, post_optimizer: Box<dyn PostOptimizer + Send>) -> Self {
        self.post_optimizer = post_optimizer;
        self
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    pub fn current_estimate(&self) -> &[DVec3] {
        &self.y
    }

    pub fn history_len(&self) -> usize {
        self.matcher.len()
    }

    /// Runs one full tracking step: builds the clouds, registers with
    /// CPD-LLE, enforces geometric constraints, and (if enabled) runs
    /// recovery. Blocking, synchronous, and single-threaded.
    pub fn step(
        &mut self,
        rgb: &[u8],
        depth: &[u16],
        mask: &[u8],
        width: usize,
        height: usize,
        template_cloud: &[DVec3],
        edges: &[(usize, usize)],
        fixed_points: &[FixedPoint],
    ) -> Result<TrackOutput> {
        let _span = info_span!("rope_tracker_step").entered();

        if edges.len() != self.rest_lengths.len() {
            return Err(TrackerError::InputShape(format!(
                "edge list has {} entries but the template was built with {}",
                edges.len(),
                self.rest_lengths.len()
            )));
        }

        let expanded_bbox = self.bbox.expanded(self.config.bounding_box_margin);
        let cloud_out = build_clouds(
            &CloudBuilderInput {
                depth,
                rgb,
                mask,
                width,
                height,
            },
            &self.projection,
            &expanded_bbox,
        )?;

        if cloud_out.filtered.is_empty() {
            warn!("filtered cloud is empty this frame; skipping CPD and resetting the bounding box");
            self.bbox = BoundingBox::default_bounds();
            return Ok(TrackOutput {
                unfiltered: cloud_out.unfiltered,
                filtered: cloud_out.filtered,
                downsampled: Vec::new(),
                template_in: template_cloud.to_vec(),
                tracked: self.y.clone(),
            });
        }

        let downsampled = voxel_downsample(&cloud_out.filtered, self.config.voxel_leaf);

        let seed = self.y.clone();
        let primary_y = self.track_from_seed(&downsampled, &seed, depth, mask, width, height, edges, fixed_points)?;

        let mut final_y = primary_y.clone();

        if self.use_recovery {
            let cost = free_space_cost(
                &primary_y,
                &self.projection,
                depth,
                mask,
                width,
                height,
                self.config.free_space_k,
            );

            if cost > self.config.recovery_tau && self.matcher.len() > self.config.recovery_k_r {
                let mut best_cost = cost;
                let candidates = self.matcher.query_template(&downsampled, self.config.recovery_k_r);
                for candidate_seed in candidates {
                    let candidate_y = self.track_from_seed(
                        &downsampled,
                        &candidate_seed,
                        depth,
                        mask,
                        width,
                        height,
                        edges,
                        fixed_points,
                    )?;
                    let candidate_cost = free_space_cost(
                        &candidate_y,
                        &self.projection,
                        depth,
                        mask,
                        width,
                        height,
                        self.config.free_space_k,
                    );
                    if candidate_cost < best_cost {
                        best_cost = candidate_cost;
                        final_y = candidate_y;
                    }
                }
                // Recovered (or retained) result is not added to the matcher
                // this frame.
            } else {
                self.matcher.add_template(downsampled.clone(), final_y.clone());
            }
        }

        self.y = final_y.clone();
        self.bbox = BoundingBox::of_points(&final_y).unwrap_or_else(BoundingBox::default_bounds);

        Ok(TrackOutput {
            unfiltered: cloud_out.unfiltered,
            filtered: cloud_out.filtered,
            downsampled,
            template_in: template_cloud.to_vec(),
            tracked: final_y,
        })
    }

    /// Runs visibility-weighted CPD-LLE registration from `seed_y`, then the
    /// post-optimizer, returning the constrained result. Shared by the
    /// primary tracking pass and every recovery candidate the recovery
    /// controller tries.
    fn track_from_seed(
        &self,
        downsampled: &[DVec3],
        seed_y: &[DVec3],
        depth: &[u16],
        mask: &[u8],
        width: usize,
        height: usize,
        edges: &[(usize, usize)],
        fixed_points: &[FixedPoint],
    ) -> Result<Vec<DVec3>> {
        let prior = visibility_prior(
            seed_y,
            &self.projection,
            depth,
            mask,
            width,
            height,
            self.config.visibility_k,
        );
        let ty = cpd::register(downsampled, seed_y, &self.m_lle, &prior, &self.config);
        self.post_optimizer.optimize(
            &ty,
            edges,
            &self.rest_lengths,
            self.config.post_optimizer_slack,
            fixed_points,
        )
    }
}
