//! sampling::models — the model evaluation interface.
//!
//! A model maps an `nvars × n` sample matrix to an `n × nqoi` value matrix.
//! Estimators use the first quantity of interest only.
use crate::errors::{MfError, MfResult};
use ndarray::{Array1, Array2, s};

pub trait Model {
    fn evaluate(&self, samples: &Array2<f64>) -> MfResult<Array2<f64>>;
}

/// Shared model handle; `Sync` so variance trials can evaluate models from
/// several threads.
pub type ModelRef<'a> = &'a (dyn Model + Sync);

impl<F> Model for F
where
    F: Fn(&Array2<f64>) -> MfResult<Array2<f64>>,
{
    fn evaluate(&self, samples: &Array2<f64>) -> MfResult<Array2<f64>> {
        self(samples)
    }
}

/// evaluate_first_qoi — evaluate `model` and keep its first column.
///
/// # Errors
/// - `ModelOutputShape` when the output does not have one row per sample or
///   has no columns. `index` names the model in the error.
/// - Any error raised by the model itself.
pub fn evaluate_first_qoi<M: Model + ?Sized>(model: &M, index: usize, samples: &Array2<f64>) -> MfResult<Array1<f64>> {
    let nsamples = samples.ncols();
    let values = model.evaluate(samples)?;
    if values.nrows() != nsamples || values.ncols() == 0 {
        return Err(MfError::ModelOutputShape { model: index, expected_rows: nsamples, found: values.dim() });
    }
    Ok(values.slice(s![.., 0]).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Axis, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Closures as models and first-QoI extraction.
    // - Shape validation of model outputs.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // A closure is a model; the first output column is kept.
    //
    // Given
    // -----
    // - f(x) = (Σ x, 2 Σ x) on three samples.
    //
    // Expect
    // ------
    // - Column sums of the samples.
    fn closure_models_return_first_qoi() {
        let model = |x: &Array2<f64>| -> MfResult<Array2<f64>> {
            let sums = x.sum_axis(Axis(0));
            Ok(ndarray::stack![Axis(1), sums, sums.mapv(|v| 2.0 * v)])
        };
        let samples = array![[1.0, 2.0, 3.0], [0.5, 0.5, 0.5]];
        let values = evaluate_first_qoi(&model, 0, &samples).unwrap();
        assert_eq!(values, array![1.5, 2.5, 3.5]);
    }

    #[test]
    // Purpose
    // -------
    // Outputs with the wrong number of rows are rejected.
    //
    // Given
    // -----
    // - A model returning a single row for two samples.
    //
    // Expect
    // ------
    // - `ModelOutputShape { model: 3, expected_rows: 2, found: (1, 1) }`.
    fn wrong_row_count_is_rejected() {
        let model = |_: &Array2<f64>| -> MfResult<Array2<f64>> { Ok(Array2::zeros((1, 1))) };
        let err = evaluate_first_qoi(&model, 3, &Array2::zeros((1, 2))).unwrap_err();
        assert_eq!(err, MfError::ModelOutputShape { model: 3, expected_rows: 2, found: (1, 1) });
    }
}
