use std::time::Instant;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use parkbook_store::{FieldMap, MutationError, Record};
use serde::Serialize;
use tracing::Instrument;

use super::{ApiError, AppState, extract_request_id, json_error, mutation_error_response, observed};

#[derive(Debug, Serialize)]
pub(super) struct UserResponse {
    user: Record,
}

#[derive(Debug, Serialize)]
pub(super) struct ReviewResponse {
    review: Record,
}

pub(super) async fn patch_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let started = Instant::now();
    let span = tracing::info_span!(
        "http.patch_user",
        request_id = %extract_request_id(&headers),
        username = %username,
    );

    let result = async {
        let fields = field_map(body)?;
        let outcome = state.mutations.update_user(&username, fields).await;
        record_mutation("user", &outcome);
        outcome
            .map(|user| Json(UserResponse { user }))
            .map_err(|err| mutation_error_response(&err))
    }
    .instrument(span)
    .await;

    observed("/v1/users/{username}", "PATCH", started, result)
}

pub(super) async fn patch_review(
    State(state): State<AppState>,
    review_id: Result<Path<i64>, PathRejection>,
    headers: HeaderMap,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let started = Instant::now();

    let result = async {
        let Path(review_id) = review_id.map_err(|_| {
            json_error(
                StatusCode::BAD_REQUEST,
                "ERR_INVALID_PARAMS",
                "review id must be an integer",
                false,
            )
        })?;
        let fields = field_map(body)?;

        let span = tracing::info_span!(
            "http.patch_review",
            request_id = %extract_request_id(&headers),
            review_id,
        );
        let outcome = state
            .mutations
            .update_review(review_id, fields)
            .instrument(span)
            .await;
        record_mutation("review", &outcome);
        outcome
            .map(|review| Json(ReviewResponse { review }))
            .map_err(|err| mutation_error_response(&err))
    }
    .await;

    observed("/v1/reviews/{review_id}", "PATCH", started, result)
}

/// Request bodies are sparse field maps; anything but a JSON object is
/// rejected before storage is touched.
fn field_map(body: Result<Json<serde_json::Value>, JsonRejection>) -> Result<FieldMap, ApiError> {
    match body {
        Ok(Json(serde_json::Value::Object(fields))) => Ok(fields),
        Ok(Json(_)) => Err(json_error(
            StatusCode::BAD_REQUEST,
            "ERR_INVALID_PARAMS",
            "request body must be a JSON object",
            false,
        )),
        Err(_) => Err(json_error(
            StatusCode::BAD_REQUEST,
            "ERR_INVALID_PARAMS",
            "invalid JSON body",
            false,
        )),
    }
}

fn record_mutation(entity: &str, outcome: &Result<Record, MutationError>) {
    let label = match outcome {
        Ok(_) => "ok",
        Err(err) => err.kind(),
    };
    crate::metrics::observe_mutation(entity, label);
}
