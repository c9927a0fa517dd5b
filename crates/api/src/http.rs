use std::collections::BTreeMap;
use std::time::Instant;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};
use parkbook_catalog::{CatalogClient, CatalogError, RetryPolicy};
use parkbook_store::{EntityMutationService, MutationError, PgEntityStore, Sha256SecretHasher};
use serde::Serialize;
use ulid::Ulid;

use crate::config::{ApiConfig, StartupError};

mod catalog;
mod entities;

type ApiError = (StatusCode, Json<ErrorResponse>);

pub type MutationService = EntityMutationService<PgEntityStore, Sha256SecretHasher>;

#[derive(Clone)]
pub struct AppState {
    catalog: CatalogClient,
    retry: RetryPolicy,
    mutations: MutationService,
}

impl AppState {
    pub fn new(config: &ApiConfig, store: PgEntityStore) -> Result<Self, StartupError> {
        let catalog =
            CatalogClient::from_config(&config.catalog_client_config()).map_err(|err| {
                StartupError {
                    code: "ERR_CATALOG_CLIENT",
                    message: format!("failed to initialize catalog client: {}", err),
                }
            })?;

        Ok(Self {
            catalog,
            retry: config.retry_policy(),
            mutations: EntityMutationService::new(
                store,
                Sha256SecretHasher::new(config.secret_hash_rounds),
            ),
        })
    }
}

/// Connects and migrates storage, then builds the full router.
pub async fn router(config: ApiConfig) -> Result<Router, StartupError> {
    let store = PgEntityStore::connect_and_migrate(&config.db_url, config.store_timeout())
        .await
        .map_err(|err| StartupError {
            code: "ERR_STORE_UNAVAILABLE",
            message: format!("failed to initialize store: {}", err),
        })?;

    Ok(router_with_state(AppState::new(&config, store)?))
}

pub fn router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/v1/parks", get(catalog::list_parks))
        .route("/v1/parks/codes", get(catalog::park_codes))
        .route("/v1/parks/names", get(catalog::park_names))
        .route("/v1/parks/states", get(catalog::park_states))
        .route("/v1/parks/state/{state_code}", get(catalog::parks_by_state))
        .route("/v1/parks/code/{park_code}", get(catalog::park_by_code))
        .route("/v1/activities", get(catalog::list_activities))
        .route("/v1/activities/{park_code}", get(catalog::park_activities))
        .route("/v1/amenities", get(catalog::list_amenities))
        .route("/v1/amenities/{park_code}", get(catalog::park_amenities))
        .route("/v1/alerts/{park_code}", get(catalog::park_alerts))
        .route("/v1/events/park/{park_code}", get(catalog::park_events))
        .route("/v1/events/state/{state_code}", get(catalog::state_events))
        .route("/v1/visitorcenters/{park_code}", get(catalog::park_visitor_centers))
        .route("/v1/thingstodo/{park_code}", get(catalog::park_things_to_do))
        .route("/v1/parkinglots/{park_code}", get(catalog::park_parking_lots))
        .route("/v1/newsreleases/{park_code}", get(catalog::park_news_releases))
        .route("/v1/users/{username}", patch(entities::patch_user))
        .route("/v1/reviews/{review_id}", patch(entities::patch_review))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ReadyzResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, bool>,
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();

    let store_ready = state.mutations.store().ping().await.is_ok();
    checks.insert("store", store_ready);

    let all_ready = checks.values().all(|ok| *ok);
    let status = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyzResponse {
            status: if all_ready { "ready" } else { "not_ready" },
            checks,
        }),
    )
}

async fn metrics() -> impl IntoResponse {
    match crate::metrics::render() {
        Ok((body, content_type)) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(content_type.as_str()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            (headers, body).into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Records the request metric for `route` and hands the result back.
fn observed<T>(
    route: &'static str,
    method: &'static str,
    started: Instant,
    result: Result<T, ApiError>,
) -> Result<T, ApiError> {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err((status, _)) => *status,
    };
    crate::metrics::observe_http_request(route, method, status.as_u16(), started.elapsed());
    result
}

fn extract_request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .and_then(sanitize_request_id)
        .unwrap_or_else(|| Ulid::new().to_string())
}

fn sanitize_request_id(raw: &str) -> Option<String> {
    const MAX_LEN: usize = 64;
    let out = raw
        .trim()
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
        .take(MAX_LEN)
        .collect::<String>();

    (!out.is_empty()).then_some(out)
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
    retryable: bool,
}

fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
    retryable: bool,
) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            code: code.into(),
            message: message.into(),
            retryable,
        }),
    )
}

fn catalog_error_response(err: &CatalogError) -> ApiError {
    match err {
        CatalogError::Transport(_) if err.is_timeout() => json_error(
            StatusCode::GATEWAY_TIMEOUT,
            "ERR_UPSTREAM_TIMEOUT",
            "catalog upstream timed out",
            true,
        ),
        CatalogError::Transport(_) => json_error(
            StatusCode::BAD_GATEWAY,
            "ERR_UPSTREAM_UNREACHABLE",
            "catalog upstream unreachable",
            true,
        ),
        CatalogError::Upstream(upstream) => json_error(
            StatusCode::BAD_GATEWAY,
            "ERR_UPSTREAM_INVALID",
            format!("catalog upstream returned an invalid response: {}", upstream),
            false,
        ),
        CatalogError::InconsistentTotal { .. } => json_error(
            StatusCode::BAD_GATEWAY,
            "ERR_UPSTREAM_INCONSISTENT",
            err.to_string(),
            false,
        ),
    }
}

fn mutation_error_response(err: &MutationError) -> ApiError {
    match err {
        MutationError::EmptyMutation => json_error(
            StatusCode::BAD_REQUEST,
            "ERR_EMPTY_MUTATION",
            "request contains no updatable fields",
            false,
        ),
        MutationError::InvalidField(field) => json_error(
            StatusCode::BAD_REQUEST,
            "ERR_INVALID_FIELD",
            format!("invalid value for {}", field),
            false,
        ),
        MutationError::DuplicateIdentifier(id) => json_error(
            StatusCode::CONFLICT,
            "ERR_DUPLICATE_IDENTIFIER",
            format!("identifier {} is already taken", id),
            false,
        ),
        MutationError::NotFound(id) => json_error(
            StatusCode::NOT_FOUND,
            "ERR_NOT_FOUND",
            format!("no record for {}", id),
            false,
        ),
        // storage detail stays in the logs
        MutationError::Store(_) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "ERR_STORE_UNAVAILABLE",
            "store unavailable",
            true,
        ),
    }
}
