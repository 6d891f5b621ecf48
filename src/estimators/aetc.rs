//! estimators::aetc — adaptive explore-then-commit BLUE (AETCBLUE).
//!
//! Purpose
//! -------
//! Estimate the high-fidelity mean without known model statistics. A pilot
//! ("explore") phase evaluates every model on shared samples and fits, for
//! each candidate subset `S` of low-fidelity models, the linear regression
//! `Q_0 ≈ β_0 + β_Sᵀ Q_S`. The exploit phase spends the remaining budget on
//! an MLBLUE estimate of `μ_S` and returns `β_0 + β_Sᵀ μ̂_S`.
//!
//! Key behaviors
//! -------------
//! - Explore starts with `max |S| + 2` samples. On the pilot data, each
//!   subset is scored by
//!   - `k1 = α σ²`, with `σ²` the OLS residual variance;
//!   - `k2`, the MLBLUE unit-budget variance of `β_Sᵀ μ_S`;
//!   - explore rate `N* = B √k1 / (c √k1 + √(k2 c))` and loss
//!     `(√(k1 c) + √k2)² / B`, with `c` the cost of evaluating every model.
//! - The pilot grows to `2n` if `N* > 2n`, to `⌈(n + N*)/2⌉` if `N* > n`,
//!   capped at `⌊B / c⌋`; exploring stops when it no longer grows.
//! - Exploit spends `B − n c` on the subset groups of the winning subset,
//!   `⌊budget · x_g / cost_g⌋` samples per group.
//!
//! Invariants & assumptions
//! ------------------------
//! - Candidate subsets index the low-fidelity models from 0 (model `s + 1`).
//! - The pilot always has at least two more rows than regression columns,
//!   so the residual variance has a positive number of degrees of freedom.
use crate::{
    allocation::model_subsets,
    errors::{MfError, MfResult},
    optimization::minimizer::AllocationOptions,
    sample_allocation::{allocate_samples_mlblue, subset_costs},
    sampling::{ModelRef, SampleGenerator, evaluate_first_qoi},
    utils::{cholesky_solve, floor_count, sample_covariance},
    variance::BlueSystem,
};
use ndarray::{Array1, Array2, Axis, concatenate, s};
use tracing::{debug, info};

/// Regularization of the exploit-phase BLUE system.
pub const AETC_DEFAULT_REG: f64 = 1e-15;
/// Default weight `α` of the regression error in the loss.
pub const AETC_DEFAULT_ALPHA: f64 = 4.0;

/// Outcome of the explore phase.
#[derive(Debug, Clone, PartialEq)]
pub struct ExploreResult {
    /// Pilot samples evaluated by every model.
    pub nexplore_samples: usize,
    /// Winning low-fidelity subset (0-based among low-fidelity models).
    pub subset: Vec<usize>,
    /// Cost of one sample of every model in `subset`.
    pub subset_cost: f64,
    /// Regression coefficients, intercept first.
    pub beta: Array1<f64>,
    /// Pilot covariance of the subset models.
    pub sigma_s: Array2<f64>,
    /// Model groups of the exploit phase (indices into `subset`).
    pub groups: Vec<Vec<usize>>,
    pub group_costs: Array1<f64>,
    pub nsamples_per_group: Array1<usize>,
    pub loss: f64,
    /// MLBLUE unit-budget variance `k2` of the winning subset.
    pub blue_variance: f64,
    pub exploit_budget: f64,
}

/// Result of [`AetcBlue::estimate`].
#[derive(Debug, Clone, PartialEq)]
pub struct AetcEstimate {
    pub mean: f64,
    /// Pilot values, `nexplore_samples × M`.
    pub pilot_values: Array2<f64>,
    pub explore: ExploreResult,
}

#[derive(Debug, Clone)]
struct SubsetScore {
    subset: Vec<usize>,
    beta: Array1<f64>,
    sigma_s: Array2<f64>,
    groups: Vec<Vec<usize>>,
    group_costs: Array1<f64>,
    fractions: Array1<f64>,
    k2: f64,
    rate: f64,
    loss: f64,
}

pub struct AetcBlue<'a> {
    models: Vec<ModelRef<'a>>,
    costs: Array1<f64>,
    reg_blue: f64,
    alpha: f64,
    allocation_options: AllocationOptions,
}

impl<'a> AetcBlue<'a> {
    /// # Errors
    /// - `TooFewModels` for fewer than two models.
    /// - `DimensionMismatch` when `costs` does not have one entry per model.
    /// - `InvalidCost` for non-finite or non-positive costs.
    pub fn new(models: Vec<ModelRef<'a>>, costs: Array1<f64>) -> MfResult<Self> {
        if models.len() < 2 {
            return Err(MfError::TooFewModels { nmodels: models.len(), required: 2 });
        }
        if costs.len() != models.len() {
            return Err(MfError::DimensionMismatch { what: "costs", expected: models.len(), found: costs.len() });
        }
        if let Some((index, &value)) = costs.iter().enumerate().find(|(_, c)| !c.is_finite() || **c <= 0.0) {
            return Err(MfError::InvalidCost { index, value });
        }
        Ok(Self {
            models,
            costs,
            reg_blue: AETC_DEFAULT_REG,
            alpha: AETC_DEFAULT_ALPHA,
            allocation_options: AllocationOptions::default(),
        })
    }

    /// # Errors
    /// - `InvalidOption` for non-finite or non-positive `alpha`.
    pub fn with_alpha(mut self, alpha: f64) -> MfResult<Self> {
        if !alpha.is_finite() || alpha <= 0.0 {
            return Err(MfError::InvalidOption { name: "alpha", reason: "Alpha must be finite and positive." });
        }
        self.alpha = alpha;
        Ok(self)
    }

    /// # Errors
    /// - `InvalidOption` for negative or non-finite regularization.
    pub fn with_reg_blue(mut self, reg: f64) -> MfResult<Self> {
        if !reg.is_finite() || reg < 0.0 {
            return Err(MfError::InvalidOption {
                name: "reg_blue",
                reason: "Regularization must be finite and non-negative.",
            });
        }
        self.reg_blue = reg;
        Ok(self)
    }

    pub fn with_allocation_options(mut self, opts: AllocationOptions) -> Self {
        self.allocation_options = opts;
        self
    }

    pub fn nmodels(&self) -> usize {
        self.models.len()
    }

    fn validate_subsets(&self, subsets: Option<Vec<Vec<usize>>>) -> MfResult<Vec<Vec<usize>>> {
        let nlf = self.nmodels() - 1;
        let subsets = subsets.unwrap_or_else(|| model_subsets(nlf));
        if subsets.is_empty() {
            return Err(MfError::InvalidOption { name: "subsets", reason: "At least one subset is required." });
        }
        for subset in &subsets {
            let mut sorted = subset.clone();
            sorted.sort_unstable();
            sorted.dedup();
            if subset.is_empty() || sorted.len() != subset.len() || sorted.iter().any(|&i| i >= nlf) {
                return Err(MfError::InvalidSubset {
                    subset: subset.clone(),
                    reason: "Low-fidelity subsets must be non-empty, unique and in range.",
                });
            }
        }
        Ok(subsets)
    }

    /// Evaluate every model on `n` new samples; `n × M`.
    fn evaluate_all<G: SampleGenerator + ?Sized>(&self, n: usize, sampler: &mut G) -> MfResult<Array2<f64>> {
        let samples = sampler.generate(n)?;
        let mut values = Array2::<f64>::zeros((n, self.nmodels()));
        for (model, handle) in self.models.iter().enumerate() {
            values.column_mut(model).assign(&evaluate_first_qoi(*handle, model, &samples)?);
        }
        Ok(values)
    }

    /// Score one low-fidelity subset on the pilot values.
    fn score_subset(&self, budget: f64, subset: &[usize], values: &Array2<f64>) -> MfResult<SubsetScore> {
        let n = values.nrows();
        let cols: Vec<usize> = subset.iter().map(|&s| s + 1).collect();
        let covariates = values.select(Axis(1), &cols);
        let design = concatenate(Axis(1), &[Array2::<f64>::ones((n, 1)).view(), covariates.view()]).map_err(|_| {
            MfError::DimensionMismatch { what: "regression design rows", expected: n, found: covariates.nrows() }
        })?;
        let y = values.column(0);

        let gram = design.t().dot(&design);
        let beta = cholesky_solve(gram.view(), design.t().dot(&y).view(), "AETC least squares")?;
        let residuals = &y - &design.dot(&beta);
        let dof = (n - cols.len() - 1) as f64;
        let sigma2 = (residuals.dot(&residuals) / dof).max(0.0);
        let k1 = self.alpha * sigma2;

        let sigma_s = sample_covariance(covariates.view());
        let costs_s = Array1::from_iter(cols.iter().map(|&m| self.costs[m]));
        let groups = model_subsets(cols.len());
        let group_costs = subset_costs(costs_s.view(), &groups);
        let sketch = beta.slice(s![1..]).to_owned();
        let (fractions, k2) = if sketch.iter().all(|b| *b == 0.0) {
            (Array1::from_elem(groups.len(), 1.0 / groups.len() as f64), 0.0)
        } else {
            let system = BlueSystem::new(sigma_s.view(), groups.clone(), self.reg_blue)?;
            let opt = allocate_samples_mlblue(&system, sketch.view(), costs_s.view(), &self.allocation_options)?;
            (opt.fractions, opt.unit_variance)
        };

        let explore_cost = self.costs.sum();
        let denom = explore_cost * k1.sqrt() + (k2 * explore_cost).sqrt();
        let rate = if denom > 0.0 { budget * k1.sqrt() / denom } else { 0.0 };
        let loss = ((k1 * explore_cost).sqrt() + k2.sqrt()).powi(2) / budget;
        Ok(SubsetScore { subset: subset.to_vec(), beta, sigma_s, groups, group_costs, fractions, k2, rate, loss })
    }

    /// Pick the minimal-loss subset and the next pilot size.
    fn explore_step(&self, budget: f64, subsets: &[Vec<usize>], values: &Array2<f64>) -> MfResult<(usize, SubsetScore)> {
        let mut best: Option<SubsetScore> = None;
        for subset in subsets {
            let score = self.score_subset(budget, subset, values)?;
            debug!("AETC subset {:?}: loss = {:.6e}, explore rate = {:.3}", subset, score.loss, score.rate);
            if best.as_ref().map_or(true, |b| score.loss < b.loss) {
                best = Some(score);
            }
        }
        let best = best.ok_or(MfError::InvalidOption { name: "subsets", reason: "At least one subset is required." })?;

        let n = values.nrows();
        let rate = best.rate;
        let mut next = if rate > 2.0 * n as f64 {
            2 * n
        } else if rate > n as f64 {
            ((n as f64 + rate) / 2.0).ceil() as usize
        } else {
            n
        };
        let explore_cost = self.costs.sum();
        if budget - next as f64 * explore_cost < 0.0 {
            next = floor_count(budget / explore_cost) as usize;
        }
        Ok((next, best))
    }

    /// explore — run the pilot phase.
    ///
    /// Parameters
    /// ----------
    /// - `budget`: total budget `B`.
    /// - `subsets`: candidate low-fidelity subsets; `None` means all of them.
    /// - `sampler`: source of input samples.
    ///
    /// Returns
    /// -------
    /// The pilot values (`n × M`) and the [`ExploreResult`] of the final
    /// step.
    ///
    /// Errors
    /// ------
    /// - `InvalidTargetCost` for a non-positive budget.
    /// - `InvalidSubset` for malformed subsets.
    /// - `NegativeExploitBudget` when the pilot costs more than `B`.
    /// - `SingularSystem` when a regression or subset covariance is singular.
    pub fn explore<G: SampleGenerator + ?Sized>(
        &self, budget: f64, subsets: Option<Vec<Vec<usize>>>, sampler: &mut G,
    ) -> MfResult<(Array2<f64>, ExploreResult)> {
        if !budget.is_finite() || budget <= 0.0 {
            return Err(MfError::InvalidTargetCost { value: budget });
        }
        let subsets = self.validate_subsets(subsets)?;
        let max_ncovariates = subsets.iter().map(Vec::len).max().unwrap_or(1);

        let mut values = self.evaluate_all(max_ncovariates + 2, sampler)?;
        let (next, best) = loop {
            let (next, best) = self.explore_step(budget, &subsets, &values)?;
            if next <= values.nrows() {
                break (next, best);
            }
            let new_values = self.evaluate_all(next - values.nrows(), sampler)?;
            values = concatenate(Axis(0), &[values.view(), new_values.view()]).map_err(|_| {
                MfError::DimensionMismatch { what: "pilot value columns", expected: self.nmodels(), found: new_values.ncols() }
            })?;
            debug!("AETC explore grew to {} samples", next);
        };

        let nexplore = values.nrows();
        let exploit_budget = budget - nexplore as f64 * self.costs.sum();
        if exploit_budget < 0.0 {
            return Err(MfError::NegativeExploitBudget { budget: exploit_budget });
        }
        let nsamples_per_group = Array1::from_shape_fn(best.groups.len(), |g| {
            floor_count(exploit_budget * best.fractions[g] / best.group_costs[g]) as usize
        });
        info!(
            "AETC explore finished: {} pilot samples (next = {}), subset = {:?}, loss = {:.6e}, exploit budget = {:.4}",
            nexplore, next, best.subset, best.loss, exploit_budget
        );
        let subset_cost = best.subset.iter().map(|&s| self.costs[s + 1]).sum();
        Ok((
            values,
            ExploreResult {
                nexplore_samples: nexplore,
                subset: best.subset,
                subset_cost,
                beta: best.beta,
                sigma_s: best.sigma_s,
                groups: best.groups,
                group_costs: best.group_costs,
                nsamples_per_group,
                loss: best.loss,
                blue_variance: best.k2,
                exploit_budget,
            },
        ))
    }

    /// exploit — MLBLUE estimate of `μ_S` plugged into the regression.
    ///
    /// # Errors
    /// - `SingularSystem` when the pilot covariance of the subset is
    ///   singular.
    /// - Model and sampler errors.
    pub fn exploit<G: SampleGenerator + ?Sized>(&self, result: &ExploreResult, sampler: &mut G) -> MfResult<f64> {
        let mut blocks = Vec::with_capacity(result.groups.len());
        for (group, &n) in result.groups.iter().zip(result.nsamples_per_group.iter()) {
            let mut block = Array2::<f64>::zeros((n, group.len()));
            if n > 0 {
                let samples = sampler.generate(n)?;
                for (j, &local) in group.iter().enumerate() {
                    let model = result.subset[local] + 1;
                    block.column_mut(j).assign(&evaluate_first_qoi(self.models[model], model, &samples)?);
                }
            }
            blocks.push(block);
        }
        let system = BlueSystem::new(result.sigma_s.view(), result.groups.clone(), self.reg_blue)?;
        let sketch = result.beta.slice(s![1..]).to_owned();
        Ok(system.estimate(sketch.view(), &blocks)? + result.beta[0])
    }

    /// Explore, then exploit.
    pub fn estimate<G: SampleGenerator + ?Sized>(
        &self, budget: f64, subsets: Option<Vec<Vec<usize>>>, sampler: &mut G,
    ) -> MfResult<AetcEstimate> {
        let (pilot_values, explore) = self.explore(budget, subsets, sampler)?;
        let mean = self.exploit(&explore, sampler)?;
        Ok(AetcEstimate { mean, pilot_values, explore })
    }
}
