//! Locally Linear Embedding precomputation: the barycentric-weights
//! matrix `W` and the coherence operator `M_lle = W^T W - W - W^T + I`.

use glam::DVec3;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{DMatrix, DVector};
use tracing::warn;

/// Precomputes `W` (row-stochastic barycentric weights, exactly `k_lle`
/// nonzero entries per row) and `M_lle` from the reference template.
///
/// Degenerate rows (a rank-deficient Gram matrix even after regularization)
/// fall back to uniform barycentric weights.
pub fn compute_lle(template: &[DVec3], k_lle: usize, reg: f64) -> (DMatrix<f64>, DMatrix<f64>) {
    let m = template.len();
    let mut w = DMatrix::<f64>::zeros(m, m);

    if m <= 1 {
        let identity = DMatrix::<f64>::identity(m, m);
        return (w, identity);
    }

    let mut tree: KdTree<f64, 3> = KdTree::new();
    for (i, p) in template.iter().enumerate() {
        tree.add(&[p.x, p.y, p.z], i as u64);
    }

    let k = k_lle.min(m - 1);

    for i in 0..m {
        let p = template[i];
        let query = [p.x, p.y, p.z];

        // Pull every point back (m is small, 30-200 in this domain) and
        // break ties deterministically by ascending index.
        let mut candidates = tree.nearest_n::<SquaredEuclidean>(&query, m);
        candidates.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .expect("squared distances are never NaN")
                .then(a.item.cmp(&b.item))
        });

        let neighbors: Vec<usize> = candidates
            .into_iter()
            .map(|n| n.item as usize)
            .filter(|&idx| idx != i)
            .take(k)
            .collect();

        if neighbors.is_empty() {
            continue;
        }
        let k_row = neighbors.len();

        let c_rows: Vec<DVec3> = neighbors.iter().map(|&j| template[j] - p).collect();

        let mut g = DMatrix::<f64>::zeros(k_row, k_row);
        for a in 0..k_row {
            for b in 0..k_row {
                g[(a, b)] = c_rows[a].dot(c_rows[b]);
            }
        }

        let trace: f64 = (0..k_row).map(|a| g[(a, a)]).sum();
        let r = if trace > 0.0 { reg * trace } else { reg };
        for a in 0..k_row {
            g[(a, a)] += r;
        }

        let ones = DVector::<f64>::from_element(k_row, 1.0);
        let weights = match g.clone().cholesky() {
            Some(chol) => chol.solve(&ones),
            None => {
                warn!(
                    vertex = i,
                    "LLE Gram matrix is not positive definite even after regularization; \
                     falling back to uniform barycentric weights"
                );
                DVector::from_element(k_row, 1.0 / k_row as f64)
            }
        };

        let sum: f64 = weights.iter().sum();
        let normalized = if sum.abs() > 1e-12 {
            weights / sum
        } else {
            DVector::from_element(k_row, 1.0 / k_row as f64)
        };

        for (a, &j) in neighbors.iter().enumerate() {
            w[(i, j)] = normalized[a];
        }
    }

    let identity = DMatrix::<f64>::identity(m, m);
    let wt = w.transpose();
    let wtw = &wt * &w;
    let sum1 = &wtw - &wt;
    let sum2 = &sum1 - &w;
    let m_lle = &sum2 + &identity;
    (w, m_lle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_line_template(n: usize) -> Vec<DVec3> {
        (0..n).map(|i| DVec3::new(i as f64 * 0.05, 0.0, 0.0)).collect()
    }

    #[test]
    fn rows_are_stochastic_with_at_most_k_nonzero_entries() {
        let template = straight_line_template(20);
        let (w, _) = compute_lle(&template, 4, 1e-3);
        for i in 0..template.len() {
            let row_sum: f64 = (0..template.len()).map(|j| w[(i, j)]).sum();
            assert!((row_sum - 1.0).abs() < 1e-6, "row {i} sum = {row_sum}");
            let nonzero = (0..template.len()).filter(|&j| w[(i, j)] != 0.0).count();
            assert!(nonzero <= 4);
        }
    }

    #[test]
    fn m_lle_is_symmetric() {
        let template = straight_line_template(15);
        let (_, m_lle) = compute_lle(&template, 5, 1e-3);
        let asym = &m_lle - m_lle.transpose();
        let max_abs = asym.iter().copied().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        assert!(max_abs < 1e-6);
    }

    #[test]
    fn collinear_template_does_not_panic_and_is_finite() {
        let template = straight_line_template(10);
        let (w, m_lle) = compute_lle(&template, 3, 1e-3);
        assert!(w.iter().all(|v| v.is_finite()));
        assert!(m_lle.iter().all(|v| v.is_finite()));
    }
}
