//! CPD-LLE registration: the Gaussian-mixture EM loop that deforms
//! the template `Y` toward the observed cloud `X`, regularized by the LLE
//! coherence operator and biased by the per-vertex visibility prior.
//!
//! Two deliberate departures from textbook CPD, preserved from the source:
//! the fixed `Y` (not the running `TY`) appears in the M-step's `B` term,
//! and `M_lle` contributes a linear-manifold coherence penalty on top of the
//! Gaussian kernel.

use glam::DVec3;
use nalgebra::DMatrix;
use tracing::warn;

use crate::config::TrackerConfig;

fn points_to_matrix(points: &[DVec3]) -> DMatrix<f64> {
    let n = points.len();
    let mut m = DMatrix::<f64>::zeros(n, 3);
    for (i, p) in points.iter().enumerate() {
        m[(i, 0)] = p.x;
        m[(i, 1)] = p.y;
        m[(i, 2)] = p.z;
    }
    m
}

fn matrix_to_points(m: &DMatrix<f64>) -> Vec<DVec3> {
    (0..m.nrows())
        .map(|i| DVec3::new(m[(i, 0)], m[(i, 1)], m[(i, 2)]))
        .collect()
}

/// `G_ij = exp(-||Y_i - Y_j||^2 / (2*beta))`, recomputed from the current
/// seed `Y` on every CPD call (unlike `M_lle`, which is fixed at construction).
pub fn gaussian_kernel(y: &[DVec3], beta: f64) -> DMatrix<f64> {
    let m = y.len();
    let mut g = DMatrix::<f64>::zeros(m, m);
    for i in 0..m {
        for j in 0..m {
            let d2 = (y[i] - y[j]).length_squared();
            g[(i, j)] = (-d2 / (2.0 * beta)).exp();
        }
    }
    g
}

/// Runs the CPD-LLE EM loop to convergence (or `max_iterations`), returning
/// the deformed vertex set `TY`.
///
/// `prior` is the per-vertex visibility prior, one entry per `y`
/// vertex. `m_lle` is the operator precomputed once from the reference
/// template (constant across calls, unlike `y` itself, which may be
/// a recovery candidate rather than the tracker's own last estimate).
pub fn register(
    x: &[DVec3],
    y: &[DVec3],
    m_lle: &DMatrix<f64>,
    prior: &[f64],
    config: &TrackerConfig,
) -> Vec<DVec3> {
    let n = x.len();
    let m = y.len();
    const D: f64 = 3.0;

    if n == 0 || m == 0 {
        return y.to_vec();
    }

    let g = gaussian_kernel(y, config.beta);
    let y_mat = points_to_matrix(y);
    let x_mat = points_to_matrix(x);
    let mut ty_mat = y_mat.clone();

    let mut sigma2 = {
        let mut total = 0.0;
        for &xi in x {
            for &yj in y {
                total += (xi - yj).length_squared();
            }
        }
        config.initial_sigma_scale * total / (n as f64 * m as f64 * D)
    };

    let mut iterations = 0usize;
    let mut error = config.tolerance + 1.0;

    while iterations <= config.max_iterations && error > config.tolerance {
        let sigma2_prev = sigma2;

        // E-step.
        let mut p = DMatrix::<f64>::zeros(m, n);
        for i in 0..m {
            let ty_i = DVec3::new(ty_mat[(i, 0)], ty_mat[(i, 1)], ty_mat[(i, 2)]);
            let prior_i = prior[i];
            for j in 0..n {
                let d2 = (x[j] - ty_i).length_squared();
                p[(i, j)] = (-d2 / (2.0 * sigma2)).exp() * prior_i;
            }
        }

        let c = (2.0 * std::f64::consts::PI * sigma2).powf(D / 2.0) * (config.w / (1.0 - config.w))
            * (m as f64 / n as f64);

        let mut den = vec![0.0; n];
        for j in 0..n {
            let mut s = 0.0;
            for i in 0..m {
                s += p[(i, j)];
            }
            den[j] = s + c;
        }
        for i in 0..m {
            for j in 0..n {
                let d_j = den[j];
                // NaN/non-finite denominators are treated as +inf: the row
                // contributes zero rather than propagating NaN.
                p[(i, j)] = if d_j.is_finite() && d_j > 0.0 {
                    p[(i, j)] / d_j
                } else {
                    0.0
                };
            }
        }

        // M-step.
        let mut pt1 = vec![0.0; n]; // column sums, length N
        for j in 0..n {
            let mut s = 0.0;
            for i in 0..m {
                s += p[(i, j)];
            }
            pt1[j] = s;
        }
        let mut p1 = vec![0.0; m]; // row sums, length M
        for i in 0..m {
            let mut s = 0.0;
            for j in 0..n {
                s += p[(i, j)];
            }
            p1[i] = s;
        }
        let np: f64 = p1.iter().sum();

        let lambda = config.start_lambda * config.annealing_factor.powi((iterations + 1) as i32);

        // A = diag(P1) G + alpha*sigma2*I + sigma2*lambda*(M_lle * G)
        let mlle_g = m_lle * &g;
        let mut a = DMatrix::<f64>::zeros(m, m);
        for i in 0..m {
            for j in 0..m {
                a[(i, j)] = p1[i] * g[(i, j)] + sigma2 * lambda * mlle_g[(i, j)];
            }
            a[(i, i)] += config.alpha * sigma2;
        }

        // B = P*X - (diag(P1) + sigma2*lambda*M_lle) * Y
        let px = &p * &x_mat; // M x 3
        let mut diag_plus = m_lle * (sigma2 * lambda);
        for i in 0..m {
            diag_plus[(i, i)] += p1[i];
        }
        let diag_plus_y = &diag_plus * &y_mat;
        let b = &px - &diag_plus_y;

        let w_sol = match a.lu().solve(&b) {
            Some(w) => w,
            None => {
                warn!("CPD system matrix A is singular; aborting iteration with last valid TY");
                sigma2 = config.tolerance / 10.0;
                break;
            }
        };

        let gw = &g * &w_sol;
        ty_mat = &y_mat + &gw;

        let x_sqnorms: Vec<f64> = x.iter().map(|p| p.length_squared()).collect();
        let x_px: f64 = (0..n).map(|j| pt1[j] * x_sqnorms[j]).sum();

        let ty_sqnorms: Vec<f64> = (0..m)
            .map(|i| {
                let row = DVec3::new(ty_mat[(i, 0)], ty_mat[(i, 1)], ty_mat[(i, 2)]);
                row.length_squared()
            })
            .collect();
        let y_py: f64 = (0..m).map(|i| p1[i] * ty_sqnorms[i]).sum();

        let tr_pxy: f64 = (0..m)
            .map(|i| {
                ty_mat[(i, 0)] * px[(i, 0)] + ty_mat[(i, 1)] * px[(i, 1)] + ty_mat[(i, 2)] * px[(i, 2)]
            })
            .sum();

        let mut sigma2_new = (x_px - 2.0 * tr_pxy + y_py) / (np * D);
        if !(sigma2_new > 0.0) {
            sigma2_new = config.tolerance / 10.0;
        }
        error = (sigma2_new - sigma2_prev).abs();
        sigma2 = sigma2_new;
        iterations += 1;
    }

    matrix_to_points(&ty_mat)
}
