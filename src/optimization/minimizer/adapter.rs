//! Adapter that exposes an [`AllocationObjective`] as an `argmin` problem.
//!
//! The objective is minimized as is. Analytic gradients are validated and
//! passed through; otherwise the cost is finite-differenced, central first
//! and forward as a fallback when the central stencil hits an evaluation
//! error or produces a non-finite gradient.
use std::cell::RefCell;

use crate::optimization::{
    errors::OptError,
    minimizer::{
        finite_diff::{Stencil, run_fd_diff},
        traits::AllocationObjective,
        types::{Cost, Grad, Theta},
        validation::validate_grad,
    },
};
use argmin::core::{CostFunction, Error, Gradient};

/// Bridges an [`AllocationObjective`] to `argmin`'s `CostFunction` and
/// `Gradient`.
#[derive(Debug, Clone)]
pub struct ArgMinAdapter<'a, F: AllocationObjective> {
    pub f: &'a F,
    pub data: &'a F::Data,
}

impl<'a, F: AllocationObjective> ArgMinAdapter<'a, F> {
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        Self { f, data }
    }
}

impl<'a, F: AllocationObjective> CostFunction for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Output = Cost;

    /// Evaluate the objective and reject non-finite values.
    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        let output = self.f.value(theta, self.data)?;
        if !output.is_finite() {
            return Err((OptError::NonFiniteCost { value: output }).into());
        }
        Ok(output)
    }
}

impl<'a, F: AllocationObjective> Gradient for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Gradient = Grad;

    /// Analytic gradient if implemented, finite differences otherwise.
    ///
    /// # Errors
    /// - Any non-`GradientNotImplemented` error from the objective's `grad`.
    /// - Errors raised by cost evaluations inside the forward stencil.
    /// - Validation errors for wrong dimension or non-finite entries.
    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        match self.f.grad(theta, self.data) {
            Ok(g) => {
                validate_grad(&g, theta.len())?;
                Ok(g)
            }
            Err(OptError::GradientNotImplemented) => {
                let closure_err: RefCell<Option<Error>> = RefCell::new(None);
                let cost_func = |theta: &Theta| -> f64 {
                    match self.cost(theta) {
                        Ok(val) => val,
                        Err(e) => {
                            let mut slot = closure_err.borrow_mut();
                            if slot.is_none() {
                                *slot = Some(e);
                            }
                            f64::NAN
                        }
                    }
                };
                match run_fd_diff(theta, &cost_func, &closure_err, Stencil::Central) {
                    Ok(g) => Ok(g),
                    Err(_) => Ok(run_fd_diff(theta, &cost_func, &closure_err, Stencil::Forward)?),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
