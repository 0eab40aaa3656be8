//! Numeric endpoint: `GET /end1/{value}`.
//!
//! ```text
//! end1
//!  ├── square   input.value → output.value
//!  └── root     input.value → output.value  (400 unless value > 0)
//! ```

use axum::extract::rejection::PathRejection;
use axum::extract::Path;
use axum::Json;
use opentelemetry::KeyValue;
use serde::Serialize;

use crate::error::AppError;
use crate::observability::context::TraceContext;
use crate::observability::instrument::{Operation, SpanOutput};

/// Failure category for arithmetic that overflowed to infinity.
pub const NON_FINITE_RESULT: &str = "NonFiniteResult";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericResponse {
    pub value: f64,
    pub square: f64,
    pub root: f64,
    #[serde(flatten)]
    pub trace: TraceContext,
}

impl SpanOutput for NumericResponse {
    fn output_attributes(&self) -> Vec<KeyValue> {
        vec![
            KeyValue::new("output.square", self.square),
            KeyValue::new("output.root", self.root),
        ]
    }
}

pub async fn end1(value: Result<Path<f64>, PathRejection>) -> Result<Json<NumericResponse>, AppError> {
    let Path(value) = value?;

    Operation::new("end1")
        .input("input.value", value)
        .run(async move {
            let square = Operation::new("square")
                .input("input.value", value)
                .run(async move { square(value) })
                .await?;
            let root = Operation::new("root")
                .input("input.value", value)
                .run(async move { root(value) })
                .await?;

            Ok(NumericResponse {
                value,
                square,
                root,
                trace: TraceContext::current(),
            })
        })
        .await
        .map(Json)
}

fn square(value: f64) -> Result<f64, AppError> {
    let result = value * value;
    if result.is_infinite() {
        return Err(AppError::internal(
            NON_FINITE_RESULT,
            format!("square of {} is not finite", value),
        ));
    }
    Ok(result)
}

fn root(value: f64) -> Result<f64, AppError> {
    if value.is_nan() || value <= 0.0 {
        return Err(AppError::bad_request("value must be strictly positive"));
    }
    Ok(value.sqrt())
}
