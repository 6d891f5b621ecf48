//! errors — crate-level error surface for multi-fidelity estimation.
//!
//! Purpose
//! -------
//! Define [`MfError`], the single error type returned by allocation,
//! estimation, sampling and data-generation routines, together with the
//! [`ErrorClass`] taxonomy callers use to decide how to react.
//!
//! Key behaviors
//! -------------
//! - Every variant carries the parameters that triggered it so that error
//!   messages are self-describing.
//! - [`MfError::class`] folds the variants into four categories:
//!   validation, infeasible budget, singular system and optimizer
//!   convergence.
//! - Optimizer-internal errors ([`OptError`]) convert into `MfError` at the
//!   module boundary; errors raised inside objective evaluations travel the
//!   other way via `From<MfError> for OptError` and are unwrapped again.
//!
//! Conventions
//! -----------
//! - Model and partition indices are 0-based; model 0 is high fidelity.
//! - Errors are never retried by the library. The only place an error is
//!   downgraded is the recursion-tree candidate loop, which scores a failed
//!   candidate as infinite variance.
use crate::optimization::errors::OptError;

/// Crate-wide result alias for estimator operations.
pub type MfResult<T> = Result<T, MfError>;

/// Coarse error taxonomy.
///
/// - `Validation`: malformed inputs, raised at construction.
/// - `InfeasibleBudget`: the budget cannot fund the minimum samples.
/// - `SingularSystem`: a discrepancy or BLUE system is not invertible.
/// - `OptimizerConvergence`: the nonlinear solver failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    InfeasibleBudget,
    SingularSystem,
    OptimizerConvergence,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MfError {
    // ---- Model statistics ----
    /// Covariance matrix must be square.
    CovarianceNotSquare { rows: usize, cols: usize },

    /// Covariance entries must be finite; diagonal entries non-negative.
    InvalidCovariance { row: usize, col: usize, value: f64, reason: &'static str },

    /// Covariance must be symmetric up to a relative tolerance.
    CovarianceNotSymmetric { row: usize, col: usize },

    /// Costs must be finite and strictly positive.
    InvalidCost { index: usize, value: f64 },

    /// Two inputs disagree on the number of models or entries.
    DimensionMismatch { what: &'static str, expected: usize, found: usize },

    /// The estimator needs more models than were supplied.
    TooFewModels { nmodels: usize, required: usize },

    // ---- Allocation structure ----
    /// Recursion index is not a valid tree rooted at model 0.
    InvalidRecursionIndex { index: Vec<usize>, reason: &'static str },

    /// A disjoint partition would have a non-positive size.
    NonPositivePartition { index: usize, value: f64 },

    /// Sample ratios must be finite and at least one.
    InvalidRatio { index: usize, value: f64, reason: &'static str },

    /// Model subset is empty, out of range or repeats an index.
    InvalidSubset { subset: Vec<usize>, reason: &'static str },

    /// Correlations and costs admit no MFMC variance reduction.
    UnacceptableMfmcModels { model: usize, reason: &'static str },

    // ---- Configuration ----
    /// Unknown estimator family name.
    UnsupportedEstimator { name: String },

    /// Unknown sampling method name.
    UnsupportedSamplingMethod { name: String },

    /// A named option is out of range.
    InvalidOption { name: &'static str, reason: &'static str },

    /// Target cost must be finite and strictly positive.
    InvalidTargetCost { value: f64 },

    /// Marginal distribution could not be constructed.
    InvalidDistribution { reason: String },

    /// Low-discrepancy sequence does not support this many dimensions.
    TooManyDimensions { nvars: usize, max: usize },

    // ---- Model evaluation / data ----
    /// A model returned an array with the wrong number of rows or no columns.
    ModelOutputShape { model: usize, expected_rows: usize, found: (usize, usize) },

    /// Per-model values do not match the allocation that produced them.
    ValueCountMismatch { model: usize, expected: usize, found: usize },

    /// The estimator has no allocation of the requested kind.
    AllocationKindMismatch { expected: &'static str },

    // ---- Budget ----
    /// Budget cannot afford even the minimum number of samples.
    InfeasibleBudget { target_cost: f64, required_cost: f64 },

    /// Exploration consumed more than the total budget.
    NegativeExploitBudget { budget: f64 },

    // ---- Linear algebra ----
    /// A system matrix could not be factorized.
    SingularSystem { what: &'static str },

    // ---- Optimizer ----
    /// Solver stopped without reporting termination.
    OptimizerConvergence { status: String },

    /// Solver or configuration error surfaced by the optimization layer.
    Optimizer(OptError),
}

impl MfError {
    /// Map the variant onto the four-way taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            MfError::InfeasibleBudget { .. } | MfError::NegativeExploitBudget { .. } => {
                ErrorClass::InfeasibleBudget
            }
            MfError::SingularSystem { .. } => ErrorClass::SingularSystem,
            MfError::OptimizerConvergence { .. } => ErrorClass::OptimizerConvergence,
            MfError::Optimizer(err) => {
                if err.is_configuration() {
                    ErrorClass::Validation
                } else {
                    ErrorClass::OptimizerConvergence
                }
            }
            _ => ErrorClass::Validation,
        }
    }
}

impl std::error::Error for MfError {}

impl std::fmt::Display for MfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Model statistics ----
            MfError::CovarianceNotSquare { rows, cols } => {
                write!(f, "Covariance must be square, found shape ({rows}, {cols})")
            }
            MfError::InvalidCovariance { row, col, value, reason } => {
                write!(f, "Invalid covariance entry ({row}, {col}) = {value}: {reason}")
            }
            MfError::CovarianceNotSymmetric { row, col } => {
                write!(f, "Covariance is not symmetric at ({row}, {col})")
            }
            MfError::InvalidCost { index, value } => {
                write!(f, "Invalid cost for model {index}: {value}, must be finite and > 0")
            }
            MfError::DimensionMismatch { what, expected, found } => {
                write!(f, "Dimension mismatch for {what}: expected {expected}, found {found}")
            }
            MfError::TooFewModels { nmodels, required } => {
                write!(f, "At least {required} models are required, found {nmodels}")
            }

            // ---- Allocation structure ----
            MfError::InvalidRecursionIndex { index, reason } => {
                write!(f, "Invalid recursion index {index:?}: {reason}")
            }
            MfError::NonPositivePartition { index, value } => {
                write!(f, "Partition {index} has non-positive size {value}")
            }
            MfError::InvalidRatio { index, value, reason } => {
                write!(f, "Invalid sample ratio at index {index}: {value}: {reason}")
            }
            MfError::InvalidSubset { subset, reason } => {
                write!(f, "Invalid model subset {subset:?}: {reason}")
            }
            MfError::UnacceptableMfmcModels { model, reason } => {
                write!(f, "Model correlations and costs cannot be used with MFMC (model {model}): {reason}")
            }

            // ---- Configuration ----
            MfError::UnsupportedEstimator { name } => {
                write!(
                    f,
                    "Estimator '{name}' not supported. Must be one of mc, mlmc, mfmc, acvmf, acvis, acvgmf, acvgmfb, mlblue"
                )
            }
            MfError::UnsupportedSamplingMethod { name } => {
                write!(f, "Sampling method '{name}' not supported. Must be one of random, sobol, halton")
            }
            MfError::InvalidOption { name, reason } => {
                write!(f, "Invalid option '{name}': {reason}")
            }
            MfError::InvalidTargetCost { value } => {
                write!(f, "Invalid target cost {value}, must be finite and > 0")
            }
            MfError::InvalidDistribution { reason } => {
                write!(f, "Invalid marginal distribution: {reason}")
            }
            MfError::TooManyDimensions { nvars, max } => {
                write!(f, "Sequence supports at most {max} dimensions, requested {nvars}")
            }

            // ---- Model evaluation / data ----
            MfError::ModelOutputShape { model, expected_rows, found } => {
                write!(
                    f,
                    "Model {model} returned shape {found:?}, expected {expected_rows} rows and at least one column"
                )
            }
            MfError::ValueCountMismatch { model, expected, found } => {
                write!(f, "Model {model} has {found} values, allocation expects {expected}")
            }
            MfError::AllocationKindMismatch { expected } => {
                write!(f, "Allocation does not match estimator: expected {expected} allocation")
            }

            // ---- Budget ----
            MfError::InfeasibleBudget { target_cost, required_cost } => {
                write!(
                    f,
                    "Target cost {target_cost} is too small, at least {required_cost} is required"
                )
            }
            MfError::NegativeExploitBudget { budget } => {
                write!(f, "Exploitation budget is negative: {budget}")
            }

            // ---- Linear algebra ----
            MfError::SingularSystem { what } => {
                write!(f, "Singular system: {what} is not invertible")
            }

            // ---- Optimizer ----
            MfError::OptimizerConvergence { status } => {
                write!(f, "Optimizer failed to converge: {status}")
            }
            MfError::Optimizer(err) => {
                write!(f, "Optimizer error: {err}")
            }
        }
    }
}

impl From<OptError> for MfError {
    fn from(err: OptError) -> Self {
        match err {
            OptError::Estimator(inner) => *inner,
            other => MfError::Optimizer(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The variant → ErrorClass mapping.
    // - Round-tripping an estimator error through the optimizer error type.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Check that each taxonomy bucket is reachable from a representative
    // variant.
    //
    // Given
    // -----
    // - One variant per category.
    //
    // Expect
    // ------
    // - `class()` returns the matching `ErrorClass`.
    fn class_maps_variants_to_taxonomy() {
        // Arrange
        let validation = MfError::InvalidCost { index: 1, value: -1.0 };
        let budget = MfError::InfeasibleBudget { target_cost: 1.0, required_cost: 2.0 };
        let singular = MfError::SingularSystem { what: "CF" };
        let convergence = MfError::OptimizerConvergence { status: "Not terminated".into() };

        // Act / Assert
        assert_eq!(validation.class(), ErrorClass::Validation);
        assert_eq!(budget.class(), ErrorClass::InfeasibleBudget);
        assert_eq!(singular.class(), ErrorClass::SingularSystem);
        assert_eq!(convergence.class(), ErrorClass::OptimizerConvergence);
    }

    #[test]
    // Purpose
    // -------
    // Ensure an estimator error raised inside an objective survives the trip
    // through `OptError` unchanged.
    //
    // Given
    // -----
    // - `MfError::SingularSystem` wrapped into `OptError`.
    //
    // Expect
    // ------
    // - Converting back yields the original variant.
    fn estimator_error_round_trips_through_opt_error() {
        // Arrange
        let original = MfError::SingularSystem { what: "CF" };

        // Act
        let opt: OptError = original.clone().into();
        let back: MfError = opt.into();

        // Assert
        assert_eq!(back, original);
    }

    #[test]
    // Purpose
    // -------
    // Optimizer configuration errors count as validation problems, runtime
    // solver errors as convergence problems.
    //
    // Given
    // -----
    // - `OptError::InvalidTolGrad` and `OptError::ConditionViolated`.
    //
    // Expect
    // ------
    // - Validation and OptimizerConvergence respectively.
    fn optimizer_errors_split_by_configuration() {
        // Arrange
        let config = MfError::from(OptError::InvalidTolGrad { tol: -1.0, reason: "neg" });
        let runtime = MfError::from(OptError::ConditionViolated { text: "line search".into() });

        // Act / Assert
        assert_eq!(config.class(), ErrorClass::Validation);
        assert_eq!(runtime.class(), ErrorClass::OptimizerConvergence);
    }
}
