//! HTTP trigger: each GET runs one fetch → normalize → store pass and
//! answers with a JSON envelope.

use std::{any::Any, sync::Arc};

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Json, Router,
};
use seismic_client::domain::SeismicRecord;
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{self, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::{
    pipeline::{Pipeline, PipelineError, PipelineOutput, Sink, Source},
    sources::RawAttributes,
};

pub const SOURCE_NAME: &str = "IGP ArcGIS SismosReportados";
const SAMPLE_SIZE: usize = 2;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const ALLOWED_METHODS: &str = "GET,OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token";

pub type SeismicPipeline<S, K> = Pipeline<S, RawAttributes, SeismicRecord, K>;

pub struct IngestState<S, K> {
    pub pipeline: SeismicPipeline<S, K>,
    pub table: String,
}

pub fn router<S, K>(state: Arc<IngestState<S, K>>) -> Router
where
    S: Source<RawAttributes> + 'static,
    K: Sink<SeismicRecord> + 'static,
{
    Router::new()
        .route("/", trigger::<S, K>())
        .route("/*path", trigger::<S, K>())
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors_layer())
        // The CORS layer only lists methods and headers on preflights.
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(TraceLayer::new_for_http())
}

/// GET runs a pass; HEAD never does.
fn trigger<S, K>() -> MethodRouter<Arc<IngestState<S, K>>>
where
    S: Source<RawAttributes> + 'static,
    K: Sink<SeismicRecord> + 'static,
{
    get(ingest::<S, K>).head(head).fallback(method_not_allowed)
}

/// Wildcard origin; answers every `OPTIONS` request as a preflight.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-amz-date"),
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-amz-security-token"),
        ])
}

#[derive(Serialize)]
struct SuccessBody<'a> {
    ok: bool,
    saved: usize,
    table: &'a str,
    sample: &'a [SeismicRecord],
    source: &'static str,
}

/// Status plus JSON body, rendered with the JSON content type.
#[derive(Debug)]
pub struct IngestResponse {
    status: StatusCode,
    body: Value,
}

impl IngestResponse {
    pub fn success(table: &str, output: &PipelineOutput<SeismicRecord>) -> Self {
        let sample = &output.records[..output.records.len().min(SAMPLE_SIZE)];
        let body = SuccessBody {
            ok: true,
            saved: output.summary.written,
            table,
            sample,
            source: SOURCE_NAME,
        };

        match serde_json::to_value(&body) {
            Ok(body) => Self {
                status: StatusCode::OK,
                body,
            },
            Err(e) => Self::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("failed to encode response: {e}"),
            ),
        }
    }

    pub fn failure(err: &PipelineError) -> Self {
        let status = match err {
            PipelineError::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::error(status, &err.to_string())
    }

    fn error(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: json!({ "ok": false, "error": message }),
        }
    }
}

impl IntoResponse for IngestResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        response
    }
}

async fn ingest<S, K>(State(state): State<Arc<IngestState<S, K>>>) -> IngestResponse
where
    S: Source<RawAttributes> + 'static,
    K: Sink<SeismicRecord> + 'static,
{
    metrics::counter!("ingest_invocations_total").increment(1);

    match state.pipeline.run().await {
        Ok(output) => {
            tracing::info!(
                fetched = output.fetched,
                accepted = output.records.len(),
                rejected = output.rejected,
                written = output.summary.written,
                already_exists = output.summary.already_exists,
                failed = output.summary.failed,
                "ingest completed"
            );
            IngestResponse::success(&state.table, &output)
        }
        Err(e) => {
            tracing::error!(error = %e, "ingest failed");
            IngestResponse::failure(&e)
        }
    }
}

async fn head() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed(method: Method) -> IngestResponse {
    IngestResponse::error(
        StatusCode::METHOD_NOT_ALLOWED,
        &format!("method {method} not allowed"),
    )
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "ingest handler panicked");

    IngestResponse::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        &format!("internal error: {detail}"),
    )
    .into_response()
}
