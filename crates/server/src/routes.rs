//! The session lifecycle over HTTP.
//!
//! Every route answers with an [`Envelope`](quill_protocol::Envelope); the
//! status code follows the envelope's error code. Failures are never retried
//! here.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use quill::{AutomationService, QuillError};
use quill_protocol::{
	CloseOutcome, ErrorCode, Health, LoginRequest, PostRequest, RefreshOutcome, VerifyRequest, WaitVerificationRequest,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::output::ResultBuilder;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<AutomationService>,
}

pub fn router(service: Arc<AutomationService>) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/api/sessions", post(create_session).get(list_sessions))
		.route("/api/sessions/{id}", get(session_status).delete(close_session))
		.route("/api/sessions/{id}/login", post(initiate_login))
		.route("/api/sessions/{id}/verify", post(submit_code))
		.route("/api/sessions/{id}/wait-verification", post(wait_verification))
		.route("/api/sessions/{id}/reconnect", post(reconnect))
		.route("/api/sessions/{id}/refresh", post(refresh))
		.route("/api/sessions/{id}/posts", post(create_post))
		.layer(TraceLayer::new_for_http())
		.with_state(AppState { service })
}

pub fn status_for(code: ErrorCode) -> StatusCode {
	match code {
		ErrorCode::SessionNotFound => StatusCode::NOT_FOUND,
		ErrorCode::InvalidState => StatusCode::CONFLICT,
		ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
		ErrorCode::VerificationTimeout => StatusCode::REQUEST_TIMEOUT,
		ErrorCode::NoPublication => StatusCode::UNPROCESSABLE_ENTITY,
		ErrorCode::ElementNotFound | ErrorCode::BrowserFailed => StatusCode::BAD_GATEWAY,
		ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
	}
}

fn respond<T: Serialize>(op: &'static str, started: Instant, result: quill::Result<T>) -> Response {
	match result {
		Ok(data) => (StatusCode::OK, Json(ResultBuilder::started_at(op, started).data(data).build())).into_response(),
		Err(err) => {
			let status = status_for(err.code());
			if status.is_server_error() {
				warn!(target = "quill.server", op, code = %err.code(), error = %err, "request failed");
			} else {
				debug!(target = "quill.server", op, code = %err.code(), error = %err, "request rejected");
			}
			(status, Json(ResultBuilder::<T>::started_at(op, started).failure(&err).build())).into_response()
		}
	}
}

fn body<T>(op: &'static str, started: Instant, body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
	body.map(|Json(value)| value).map_err(|rejection| {
		let envelope = ResultBuilder::<()>::started_at(op, started)
			.error(ErrorCode::InvalidInput, rejection.body_text())
			.build();
		(StatusCode::BAD_REQUEST, Json(envelope)).into_response()
	})
}

async fn health(State(state): State<AppState>) -> Response {
	let health = Health {
		status: "ok".into(),
		active_sessions: state.service.registry().len(),
	};
	respond("health", Instant::now(), Ok(health))
}

async fn create_session(State(state): State<AppState>) -> Response {
	let started = Instant::now();
	respond("session.create", started, state.service.create_session().await)
}

async fn list_sessions(State(state): State<AppState>) -> Response {
	respond("session.list", Instant::now(), Ok(state.service.list_sessions()))
}

async fn session_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
	respond("session.status", Instant::now(), Ok(state.service.session_status(&id)))
}

async fn initiate_login(
	State(state): State<AppState>,
	Path(id): Path<String>,
	request: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
	let started = Instant::now();
	let request = match body("session.login", started, request) {
		Ok(request) => request,
		Err(response) => return response,
	};
	respond("session.login", started, state.service.initiate_login(&id, &request.email).await)
}

async fn submit_code(State(state): State<AppState>, Path(id): Path<String>, request: Result<Json<VerifyRequest>, JsonRejection>) -> Response {
	let started = Instant::now();
	let request = match body("session.verify", started, request) {
		Ok(request) => request,
		Err(response) => return response,
	};
	respond("session.verify", started, state.service.submit_verification_code(&id, &request.code).await)
}

/// The body is optional; an empty one waits for the configured default.
async fn wait_verification(State(state): State<AppState>, Path(id): Path<String>, raw: Bytes) -> Response {
	let started = Instant::now();
	let request = if raw.iter().all(u8::is_ascii_whitespace) {
		WaitVerificationRequest::default()
	} else {
		match serde_json::from_slice::<WaitVerificationRequest>(&raw) {
			Ok(request) => request,
			Err(err) => {
				let invalid = QuillError::InvalidInput(format!("invalid body: {err}"));
				return respond::<()>("session.wait_verification", started, Err(invalid));
			}
		}
	};
	let timeout = request.timeout_ms.map(Duration::from_millis);
	respond(
		"session.wait_verification",
		started,
		state.service.wait_for_email_verification(&id, timeout).await,
	)
}

async fn reconnect(State(state): State<AppState>, Path(id): Path<String>) -> Response {
	let started = Instant::now();
	respond("session.reconnect", started, state.service.reconnect_session(&id).await)
}

async fn refresh(State(state): State<AppState>, Path(id): Path<String>) -> Response {
	let started = Instant::now();
	let result = state.service.refresh_session_auth(&id).await.map(|success| RefreshOutcome { success });
	respond("session.refresh", started, result)
}

async fn close_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
	let started = Instant::now();
	let result = state.service.close_session(&id).await.map(|closed| CloseOutcome { closed });
	respond("session.close", started, result)
}

async fn create_post(State(state): State<AppState>, Path(id): Path<String>, request: Result<Json<PostRequest>, JsonRejection>) -> Response {
	let started = Instant::now();
	let request = match body("post.create", started, request) {
		Ok(request) => request,
		Err(response) => return response,
	};
	respond("post.create", started, state.service.create_post(&id, &request).await)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_error_code_has_a_distinct_client_or_gateway_status() {
		assert_eq!(status_for(ErrorCode::SessionNotFound), StatusCode::NOT_FOUND);
		assert_eq!(status_for(ErrorCode::InvalidState), StatusCode::CONFLICT);
		assert_eq!(status_for(ErrorCode::InvalidInput), StatusCode::BAD_REQUEST);
		assert_eq!(status_for(ErrorCode::VerificationTimeout), StatusCode::REQUEST_TIMEOUT);
		assert_eq!(status_for(ErrorCode::NoPublication), StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(status_for(ErrorCode::ElementNotFound), StatusCode::BAD_GATEWAY);
		assert_eq!(status_for(ErrorCode::BrowserFailed), StatusCode::BAD_GATEWAY);
		assert_eq!(status_for(ErrorCode::InternalError), StatusCode::INTERNAL_SERVER_ERROR);
	}
}
