//! Text endpoint: `GET /end2/?text=...`.
//!
//! Three slow stages, each its own span under `end2`:
//!
//! ```text
//! end2
//!  ├── normalize  trim + lowercase
//!  ├── validate   400 if empty
//!  └── reverse
//! ```

use std::time::Duration;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::http::server::AppState;
use crate::observability::context::TraceContext;
use crate::observability::instrument::{Operation, SpanOutput};

#[derive(Debug, Clone, Deserialize)]
pub struct TextQuery {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextResponse {
    pub input: String,
    pub normalized: String,
    pub reversed: String,
    #[serde(flatten)]
    pub trace: TraceContext,
}

impl SpanOutput for TextResponse {
    fn output_attributes(&self) -> Vec<KeyValue> {
        vec![
            KeyValue::new("output.normalized", self.normalized.clone()),
            KeyValue::new("output.reversed", self.reversed.clone()),
        ]
    }
}

pub async fn end2(
    State(state): State<AppState>,
    query: Result<Query<TextQuery>, QueryRejection>,
) -> Result<Json<TextResponse>, AppError> {
    let Query(TextQuery { text }) = query?;
    if text.is_empty() {
        return Err(AppError::unprocessable(
            "Failed to deserialize query string: text must be at least 1 character long",
        ));
    }

    let delay = state.stage_delay;
    Operation::new("end2")
        .input("input.text", text.clone())
        .run(async move {
            let normalized = Operation::new("normalize")
                .input("input.text", text.clone())
                .run(normalize(&text, delay))
                .await?;
            let validated = Operation::new("validate")
                .input("input.text", normalized.clone())
                .run(validate(&normalized, delay))
                .await?;
            let reversed = Operation::new("reverse")
                .input("input.text", validated.clone())
                .run(reverse(&validated, delay))
                .await?;

            Ok(TextResponse {
                input: text,
                normalized,
                reversed,
                trace: TraceContext::current(),
            })
        })
        .await
        .map(Json)
}

async fn normalize(text: &str, delay: Duration) -> Result<String, AppError> {
    tokio::time::sleep(delay).await;
    Ok(text.trim().to_lowercase())
}

async fn validate(text: &str, delay: Duration) -> Result<String, AppError> {
    tokio::time::sleep(delay).await;
    if text.is_empty() {
        return Err(AppError::bad_request("text must not be empty"));
    }
    Ok(text.to_owned())
}

async fn reverse(text: &str, delay: Duration) -> Result<String, AppError> {
    tokio::time::sleep(delay).await;
    Ok(text.chars().rev().collect())
}
