//! sample_allocation::transform — budget-exact reparameterization of
//! recursion-tree sample counts.
//!
//! Purpose
//! -------
//! Map an unconstrained vector `θ ∈ R^{M−1}` onto per-model sample counts
//! `N` that satisfy, for every `θ`:
//!
//! - `N_0 ≥ 1`;
//! - `N_k ≥ N_{parent(k)} + 1` for every low-fidelity model `k`;
//! - `Σ_k c_k N_k = T` exactly.
//!
//! This replaces the constrained formulation (inequality constraints on the
//! ratios plus a budget equality) with a smooth unconstrained problem that
//! L-BFGS can solve directly.
//!
//! Key behaviors
//! -------------
//! - The minimal feasible allocation gives model `k` exactly
//!   `depth(k) + 1` samples and costs `B = Σ_k c_k (depth(k) + 1)`.
//! - The remaining budget `R = T − B` is split by `w = softmax([0, θ])`:
//!   node `a` receives `e_a = R w_a / C_a` extra samples, where `C_a` is
//!   the cost of the subtree rooted at `a`, and those samples are added to
//!   `a` and all of its descendants. Hence `Σ_a C_a e_a = R`.
//! - [`BudgetTree::nsamples_vjp`] pulls a gradient with respect to `N` back
//!   to `θ`; [`BudgetTree::theta_from_ratios`] inverts the map for an
//!   initial guess.
//!
//! Invariants & assumptions
//! ------------------------
//! - `T ≥ B`, checked at construction (`InfeasibleBudget` otherwise).
//! - `N` depends on `θ` only through the softmax weights, so `θ` may take
//!   any finite value.
use crate::{
    allocation::{RecursionIndex, nsamples_per_model},
    errors::{MfError, MfResult},
    optimization::{
        minimizer::Theta,
        numerical_stability::{MIN_SIMPLEX_WEIGHT, safe_softmax, safe_softmax_deriv, softmax_logits},
    },
};
use ndarray::{Array1, ArrayView1};

/// Budget-exact map from `θ` to nested sample counts for one recursion tree.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetTree {
    target_cost: f64,
    costs: Array1<f64>,
    rec: RecursionIndex,
    min_counts: Array1<f64>,
    subtree_costs: Array1<f64>,
    excess: f64,
}

impl BudgetTree {
    /// Build the map for `costs`, recursion index `rec` and budget `T`.
    ///
    /// # Errors
    /// - `InvalidTargetCost` for non-finite or non-positive `T`.
    /// - `DimensionMismatch` when `rec` and `costs` disagree on `M`.
    /// - `InfeasibleBudget` when `T` is below the minimal tree cost.
    pub fn new(costs: ArrayView1<f64>, rec: RecursionIndex, target_cost: f64) -> MfResult<Self> {
        if !target_cost.is_finite() || target_cost <= 0.0 {
            return Err(MfError::InvalidTargetCost { value: target_cost });
        }
        let nmodels = costs.len();
        if rec.nmodels() != nmodels {
            return Err(MfError::DimensionMismatch {
                what: "recursion index models",
                expected: nmodels,
                found: rec.nmodels(),
            });
        }
        let min_counts = Array1::from_shape_fn(nmodels, |k| (rec.depth(k) + 1) as f64);
        let base_cost = costs.dot(&min_counts);
        if target_cost < base_cost {
            return Err(MfError::InfeasibleBudget { target_cost, required_cost: base_cost });
        }
        let subtree_costs =
            Array1::from_shape_fn(nmodels, |k| rec.subtree(k).iter().map(|&j| costs[j]).sum::<f64>());
        Ok(Self {
            target_cost,
            costs: costs.to_owned(),
            rec,
            min_counts,
            subtree_costs,
            excess: target_cost - base_cost,
        })
    }

    /// Number of free parameters, `M − 1`.
    pub fn nparams(&self) -> usize {
        self.costs.len() - 1
    }

    pub fn target_cost(&self) -> f64 {
        self.target_cost
    }

    pub fn costs(&self) -> ArrayView1<'_, f64> {
        self.costs.view()
    }

    pub fn recursion_index(&self) -> &RecursionIndex {
        &self.rec
    }

    /// Continuous sample counts `N(θ)`.
    pub fn nsamples(&self, theta: &Theta) -> Array1<f64> {
        let weights = safe_softmax(theta.view());
        let extra = self.extra_samples(weights.view());
        Array1::from_shape_fn(self.costs.len(), |k| {
            self.min_counts[k] + self.rec.path_to_root(k).iter().map(|&a| extra[a]).sum::<f64>()
        })
    }

    /// nsamples_vjp — pull `∂f/∂N` back to `∂f/∂θ`.
    ///
    /// With `∂N_k/∂e_a = 1` for every ancestor-or-self `a` of `k`:
    ///
    /// `∂f/∂e_a = Σ_{k ∈ subtree(a)} ∂f/∂N_k`, `∂f/∂w_a = (R / C_a) ∂f/∂e_a`,
    ///
    /// followed by the softmax vector–Jacobian product.
    pub fn nsamples_vjp(&self, theta: &Theta, upstream: ArrayView1<f64>) -> Array1<f64> {
        let weights = safe_softmax(theta.view());
        let dweights = Array1::from_shape_fn(self.costs.len(), |a| {
            let de: f64 = self.rec.subtree(a).iter().map(|&k| upstream[k]).sum();
            self.excess / self.subtree_costs[a] * de
        });
        safe_softmax_deriv(weights.view(), dweights.view())
    }

    /// theta_from_ratios — parameter whose counts best match `ratios`.
    ///
    /// Counts implied by the ratios at this budget are converted into extra
    /// samples per node (clamped at zero where the nesting is violated) and
    /// renormalized onto the budget simplex, so the result is always
    /// feasible even when the ratios are not.
    pub fn theta_from_ratios(&self, ratios: ArrayView1<f64>) -> Theta {
        let nsamples = nsamples_per_model(self.target_cost, self.costs.view(), ratios, false);
        let mut weights = Array1::from_shape_fn(self.costs.len(), |k| {
            let below = if k == 0 { 0.0 } else { nsamples[self.rec.parent(k)] };
            let extra = (nsamples[k] - below - 1.0).max(0.0);
            (extra * self.subtree_costs[k]).max(MIN_SIMPLEX_WEIGHT)
        });
        let total = weights.sum();
        weights /= total;
        softmax_logits(weights.view())
    }

    fn extra_samples(&self, weights: ArrayView1<f64>) -> Array1<f64> {
        Array1::from_shape_fn(self.costs.len(), |a| self.excess * weights[a] / self.subtree_costs[a])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Budget equality and nesting of `nsamples` for arbitrary θ.
    // - The vector–Jacobian product against finite differences.
    // - Recovery of counts through `theta_from_ratios`.
    // - Rejection of budgets below the minimal tree cost.
    // -------------------------------------------------------------------------

    fn tree() -> BudgetTree {
        let rec = RecursionIndex::new(vec![0, 1, 1]).unwrap();
        BudgetTree::new(array![4.0, 1.0, 0.5, 0.1].view(), rec, 100.0).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Every θ yields counts that spend the budget exactly and respect
    // parent + 1 nesting.
    //
    // Given
    // -----
    // - Tree [0, 1, 1] and several θ including extreme logits.
    //
    // Expect
    // ------
    // - Σ c N = T; N_0 ≥ 1; N_k ≥ N_parent + 1.
    fn nsamples_are_budget_exact_and_nested() {
        let tree = tree();
        for theta in [array![0.0, 0.0, 0.0], array![3.0, -2.0, 1.0], array![-40.0, 40.0, 0.0]] {
            let n = tree.nsamples(&theta);
            let cost = tree.costs().dot(&n);
            assert!((cost - 100.0).abs() < 1e-9, "cost {cost}");
            assert!(n[0] >= 1.0);
            for k in 1..4 {
                assert!(n[k] >= n[tree.recursion_index().parent(k)] + 1.0 - 1e-12);
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // The analytic pull-back matches central differences.
    //
    // Given
    // -----
    // - f(N) = Σ_k k·N_k² at θ = (0.3, −0.7, 1.1).
    //
    // Expect
    // ------
    // - Agreement to 1e-5 relative.
    fn vjp_matches_finite_differences() {
        let tree = tree();
        let theta = array![0.3, -0.7, 1.1];
        let f = |t: &Theta| {
            let n = tree.nsamples(t);
            n.iter().enumerate().map(|(k, v)| k as f64 * v * v).sum::<f64>()
        };
        let n = tree.nsamples(&theta);
        let upstream = Array1::from_shape_fn(4, |k| 2.0 * k as f64 * n[k]);
        let analytic = tree.nsamples_vjp(&theta, upstream.view());
        let h = 1e-6;
        for j in 0..3 {
            let mut up = theta.clone();
            let mut dn = theta.clone();
            up[j] += h;
            dn[j] -= h;
            let fd = (f(&up) - f(&dn)) / (2.0 * h);
            assert!((fd - analytic[j]).abs() <= 1e-5 * fd.abs().max(1.0), "{j}: {fd} vs {}", analytic[j]);
        }
    }

    #[test]
    // Purpose
    // -------
    // `theta_from_ratios` inverts `nsamples` for feasible counts.
    //
    // Given
    // -----
    // - Counts from θ = (1, 0.5, −0.5) and their ratios.
    //
    // Expect
    // ------
    // - The recovered θ reproduces the counts.
    fn theta_from_ratios_round_trips_counts() {
        let tree = tree();
        let n = tree.nsamples(&array![1.0, 0.5, -0.5]);
        let ratios = n.slice(ndarray::s![1..]).mapv(|v| v / n[0]);
        let recovered = tree.nsamples(&tree.theta_from_ratios(ratios.view()));
        for (a, b) in n.iter().zip(recovered.iter()) {
            assert!((a - b).abs() < 1e-8 * a.max(1.0));
        }
    }

    #[test]
    // Purpose
    // -------
    // A budget below the minimal nested allocation is infeasible.
    //
    // Given
    // -----
    // - Chain of three models with costs [1, 1, 1]: minimum 1 + 2 + 3 = 6.
    //
    // Expect
    // ------
    // - T = 5 → InfeasibleBudget { required_cost: 6 }.
    fn budget_below_tree_minimum_is_infeasible() {
        let err = BudgetTree::new(array![1.0, 1.0, 1.0].view(), RecursionIndex::chain(3), 5.0).unwrap_err();
        assert_eq!(err, MfError::InfeasibleBudget { target_cost: 5.0, required_cost: 6.0 });
    }
}
