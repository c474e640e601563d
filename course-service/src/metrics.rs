use anyhow::Result;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::AppState;

#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    http_errors: IntCounterVec,
    enrollments: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_errors = IntCounterVec::new(
            Opts::new(
                "http_errors_total",
                "Count of error responses grouped by error code and status",
            ),
            &["code", "status"],
        )?;
        registry.register(Box::new(http_errors.clone()))?;

        let enrollments = IntCounterVec::new(
            Opts::new(
                "enrollments_total",
                "Count of enrollment attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(enrollments.clone()))?;

        Ok(Self {
            registry,
            http_errors,
            enrollments,
        })
    }

    pub fn http_error(&self, code: &str, status: StatusCode) {
        self.http_errors
            .with_label_values(&[code, status.as_str()])
            .inc();
    }

    pub fn enrollment(&self, outcome: &str) {
        self.enrollments.with_label_values(&[outcome]).inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}

/// Counts every error response by the `X-Error-Code` header `ApiError` sets.
pub async fn http_error_metrics(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        let code = response
            .headers()
            .get("X-Error-Code")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("unlabelled");
        state.metrics.http_error(code, status);
    }
    response
}
