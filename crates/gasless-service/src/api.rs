//! HTTP API for the relay.

use anyhow::Context;
use axum::{
	body::Bytes,
	extract::{Query, State},
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Json, Response},
	routing::{get, post},
	Router,
};
use chrono::Utc;
use gasless_core::submission::{SubmissionError, SubmissionService};
use gasless_core::RelayEngine;
use gasless_types::{
	ErrorResponse, HealthResponse, IngestResponse, PendingDepositsResponse, SubmitResponse,
};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument};
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// API server for submissions, broker push deliveries and pending reads.
pub struct ApiServer {
	host: String,
	port: u16,
	engine: Arc<RelayEngine>,
}

impl ApiServer {
	pub fn new(host: String, port: u16, engine: Arc<RelayEngine>) -> Self {
		Self { host, port, engine }
	}

	/// Serves until `shutdown` resolves, then drains in-flight requests.
	#[instrument(skip(self, shutdown))]
	pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
	where
		F: Future<Output = ()> + Send + 'static,
	{
		let address = format!("{}:{}", self.host, self.port);
		let listener = tokio::net::TcpListener::bind(&address)
			.await
			.with_context(|| format!("Failed to bind {}", address))?;

		info!("API server listening on {}", address);

		axum::serve(listener, router(self.engine))
			.with_graceful_shutdown(shutdown)
			.await?;

		Ok(())
	}
}

#[derive(Clone)]
struct AppState {
	engine: Arc<RelayEngine>,
}

pub fn router(engine: Arc<RelayEngine>) -> Router {
	Router::new()
		.route("/health", get(health_check))
		.route("/api/gasless/submit", post(submit_deposit))
		.route("/api/gasless/ingest", post(ingest_push))
		.route("/api/gasless/deposits", get(list_deposits))
		.with_state(AppState { engine })
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
}

async fn health_check() -> Json<HealthResponse> {
	Json(HealthResponse {
		status: "ok".to_string(),
	})
}

/// Submission failure rendered as `{error, message}`.
pub struct ApiError(SubmissionError);

impl From<SubmissionError> for ApiError {
	fn from(error: SubmissionError) -> Self {
		ApiError(error)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = match &self.0 {
			SubmissionError::InvalidRequest(_)
			| SubmissionError::TargetAddressInvalid { .. }
			| SubmissionError::DepositorMismatch { .. } => StatusCode::BAD_REQUEST,
			SubmissionError::SignatureInvalid(_) => StatusCode::UNAUTHORIZED,
			SubmissionError::Publish(_) | SubmissionError::Serialization(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		};

		let message = if self.0.is_client_error() {
			self.0.to_string()
		} else {
			error!(error = %self.0, "submission failed");
			"An internal error occurred".to_string()
		};

		let body = ErrorResponse {
			error: self.0.kind().to_string(),
			message,
		};
		(status, Json(body)).into_response()
	}
}

async fn submit_deposit(
	State(state): State<AppState>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
	let request_id = headers
		.get(REQUEST_ID_HEADER)
		.and_then(|value| value.to_str().ok())
		.map(str::trim)
		.filter(|value| !value.is_empty())
		.map(str::to_string)
		.unwrap_or_else(|| Uuid::new_v4().to_string());

	let intent = SubmissionService::parse_intent(&body)?;
	let response = state.engine.submission().submit(intent, request_id).await?;
	Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct IngestQuery {
	token: Option<String>,
}

async fn ingest_push(
	State(state): State<AppState>,
	Query(query): Query<IngestQuery>,
	body: Bytes,
) -> (StatusCode, Json<IngestResponse>) {
	let ingestion = state.engine.ingestion();
	if !ingestion.authorize(query.token.as_deref()) {
		return (
			StatusCode::UNAUTHORIZED,
			Json(IngestResponse {
				status: "rejected".to_string(),
				reason: "unauthorized".to_string(),
				deposit_id: None,
			}),
		);
	}

	match ingestion.handle_push(&body, Utc::now()).await {
		Ok(outcome) => {
			let status = if outcome.acked() {
				StatusCode::OK
			} else {
				StatusCode::SERVICE_UNAVAILABLE
			};
			(status, Json(outcome.to_response()))
		}
		Err(e) => {
			error!(error = %e, "push delivery failed");
			(
				StatusCode::INTERNAL_SERVER_ERROR,
				Json(IngestResponse {
					status: "retry".to_string(),
					reason: "internal_error".to_string(),
					deposit_id: None,
				}),
			)
		}
	}
}

#[derive(Debug, Deserialize)]
struct DepositsQuery {
	status: Option<String>,
}

async fn list_deposits(State(state): State<AppState>, Query(query): Query<DepositsQuery>) -> Response {
	if query.status.as_deref() != Some("pending") {
		return (
			StatusCode::BAD_REQUEST,
			Json(ErrorResponse {
				error: "invalid-request".to_string(),
				message: "status must be 'pending'".to_string(),
			}),
		)
			.into_response();
	}

	let reader = state.engine.reader();
	match reader.list_pending().await {
		Ok(deposits) => {
			reader.schedule_cleanup();
			Json(PendingDepositsResponse { deposits }).into_response()
		}
		Err(e) => {
			error!(error = %e, "failed to read pending deposits");
			(
				StatusCode::INTERNAL_SERVER_ERROR,
				Json(ErrorResponse {
					error: "cache-unavailable".to_string(),
					message: "An internal error occurred".to_string(),
				}),
			)
				.into_response()
		}
	}
}
