use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use chinchilla_service::{AgentRequest, AgentResponse, Error};

use crate::state::AppState;

pub const MAX_QUERY_CHARS: usize = 1_000;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/", get(info))
		.route("/health", get(info))
		.route("/v1/agent/query", post(query))
		.with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
	pub status: &'static str,
	pub version: &'static str,
	pub categories: Vec<String>,
	pub web_search_configured: bool,
}

async fn info(State(state): State<AppState>) -> Json<ServiceInfo> {
	Json(ServiceInfo {
		status: "ok",
		version: chinchilla_cli::VERSION,
		categories: state.service.categories(),
		web_search_configured: state.service.web_search_configured(),
	})
}

async fn query(
	State(state): State<AppState>,
	Json(payload): Json<AgentRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
	validate_query(&payload.query)?;

	let response = state.service.query(payload).await?;

	Ok(Json(response))
}

fn validate_query(query: &str) -> Result<(), ApiError> {
	if query.trim().is_empty() {
		return Err(json_error(
			StatusCode::BAD_REQUEST,
			"INVALID_REQUEST",
			"query must be non-empty.",
			Some(vec!["$.query".to_string()]),
		));
	}
	if query.chars().count() > MAX_QUERY_CHARS {
		return Err(json_error(
			StatusCode::BAD_REQUEST,
			"INVALID_REQUEST",
			format!("query must be at most {MAX_QUERY_CHARS} characters."),
			Some(vec!["$.query".to_string()]),
		));
	}

	Ok(())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::CategoryNotFound { category } => json_error(
				StatusCode::BAD_REQUEST,
				"CATEGORY_NOT_FOUND",
				format!("Unknown category: {category}."),
				Some(vec!["$.category".to_string()]),
			),
			Error::InvalidRequest { message } => {
				json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message, None)
			},
			Error::DeadlineExceeded { elapsed_ms } => json_error(
				StatusCode::GATEWAY_TIMEOUT,
				"DEADLINE_EXCEEDED",
				format!("The request did not finish in time ({elapsed_ms} ms)."),
				None,
			),
			err => {
				tracing::error!(error = %err, "Agent request failed.");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"INTERNAL_ERROR",
					"An internal error occurred.",
					None,
				)
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}
