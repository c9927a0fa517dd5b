use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use parkbook_catalog::{CatalogQuery, CatalogResource};
use parkbook_contracts::AggregateResult;
use serde::Serialize;
use tracing::Instrument;

use super::{ApiError, AppState, catalog_error_response, extract_request_id, observed};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ParksResponse {
    parks: Vec<parkbook_contracts::CatalogItem>,
    park_codes: Vec<String>,
    park_names: Vec<String>,
}

impl From<AggregateResult> for ParksResponse {
    fn from(value: AggregateResult) -> Self {
        Self {
            parks: value.items,
            park_codes: value.codes,
            park_names: value.names,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ParkCodesResponse {
    park_codes: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ParkNamesResponse {
    park_names: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StateCodesResponse {
    state_codes: Vec<String>,
}

pub(super) async fn list_parks(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ParksResponse>, ApiError> {
    let started = Instant::now();
    let result = walk(&state, &headers, CatalogQuery::new(CatalogResource::PARKS))
        .await
        .map(|agg| Json(agg.into()));
    observed("/v1/parks", "GET", started, result)
}

pub(super) async fn park_codes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ParkCodesResponse>, ApiError> {
    let started = Instant::now();
    let result = walk(&state, &headers, CatalogQuery::new(CatalogResource::PARKS))
        .await
        .map(|agg| Json(ParkCodesResponse { park_codes: agg.codes }));
    observed("/v1/parks/codes", "GET", started, result)
}

pub(super) async fn park_names(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ParkNamesResponse>, ApiError> {
    let started = Instant::now();
    let result = walk(&state, &headers, CatalogQuery::new(CatalogResource::PARKS))
        .await
        .map(|agg| Json(ParkNamesResponse { park_names: agg.names }));
    observed("/v1/parks/names", "GET", started, result)
}

pub(super) async fn park_states(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StateCodesResponse>, ApiError> {
    let started = Instant::now();
    let result = walk(&state, &headers, CatalogQuery::new(CatalogResource::PARKS))
        .await
        .map(|agg| {
            Json(StateCodesResponse {
                state_codes: agg.state_codes(),
            })
        });
    observed("/v1/parks/states", "GET", started, result)
}

pub(super) async fn parks_by_state(
    State(state): State<AppState>,
    Path(state_code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ParksResponse>, ApiError> {
    let started = Instant::now();
    let query = CatalogQuery::new(CatalogResource::PARKS).filter("stateCode", state_code);
    let result = walk(&state, &headers, query)
        .await
        .map(|agg| Json(agg.into()));
    observed("/v1/parks/state/{state_code}", "GET", started, result)
}

pub(super) async fn park_by_code(
    State(state): State<AppState>,
    Path(park_code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ParksResponse>, ApiError> {
    let started = Instant::now();
    let query = CatalogQuery::new(CatalogResource::PARKS).filter("parkCode", park_code);
    let result = walk(&state, &headers, query)
        .await
        .map(|agg| Json(agg.into()));
    observed("/v1/parks/code/{park_code}", "GET", started, result)
}

pub(super) async fn list_activities(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AggregateResult>, ApiError> {
    let started = Instant::now();
    let result = walk(&state, &headers, CatalogQuery::new(CatalogResource::ACTIVITIES))
        .await
        .map(Json);
    observed("/v1/activities", "GET", started, result)
}

pub(super) async fn list_amenities(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AggregateResult>, ApiError> {
    let started = Instant::now();
    let result = walk(&state, &headers, CatalogQuery::new(CatalogResource::AMENITIES))
        .await
        .map(Json);
    observed("/v1/amenities", "GET", started, result)
}

pub(super) async fn park_activities(
    State(state): State<AppState>,
    Path(park_code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AggregateResult>, ApiError> {
    let started = Instant::now();
    // activities are only published nested inside each park record
    let query = CatalogQuery::new(CatalogResource::PARKS)
        .filter("parkCode", park_code)
        .nested("activities", CatalogResource::ACTIVITIES);
    let result = walk(&state, &headers, query).await.map(Json);
    observed("/v1/activities/{park_code}", "GET", started, result)
}

pub(super) async fn park_amenities(
    State(state): State<AppState>,
    Path(park_code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AggregateResult>, ApiError> {
    let started = Instant::now();
    let result = park_scoped(&state, &headers, CatalogResource::AMENITIES, park_code).await;
    observed("/v1/amenities/{park_code}", "GET", started, result)
}

pub(super) async fn park_alerts(
    State(state): State<AppState>,
    Path(park_code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AggregateResult>, ApiError> {
    let started = Instant::now();
    let result = park_scoped(&state, &headers, CatalogResource::ALERTS, park_code).await;
    observed("/v1/alerts/{park_code}", "GET", started, result)
}

pub(super) async fn park_events(
    State(state): State<AppState>,
    Path(park_code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AggregateResult>, ApiError> {
    let started = Instant::now();
    let result = park_scoped(&state, &headers, CatalogResource::EVENTS, park_code).await;
    observed("/v1/events/park/{park_code}", "GET", started, result)
}

pub(super) async fn state_events(
    State(state): State<AppState>,
    Path(state_code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AggregateResult>, ApiError> {
    let started = Instant::now();
    let query = CatalogQuery::new(CatalogResource::EVENTS).filter("stateCode", state_code);
    let result = walk(&state, &headers, query).await.map(Json);
    observed("/v1/events/state/{state_code}", "GET", started, result)
}

pub(super) async fn park_visitor_centers(
    State(state): State<AppState>,
    Path(park_code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AggregateResult>, ApiError> {
    let started = Instant::now();
    let result = park_scoped(&state, &headers, CatalogResource::VISITOR_CENTERS, park_code).await;
    observed("/v1/visitorcenters/{park_code}", "GET", started, result)
}

pub(super) async fn park_things_to_do(
    State(state): State<AppState>,
    Path(park_code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AggregateResult>, ApiError> {
    let started = Instant::now();
    let result = park_scoped(&state, &headers, CatalogResource::THINGS_TO_DO, park_code).await;
    observed("/v1/thingstodo/{park_code}", "GET", started, result)
}

pub(super) async fn park_parking_lots(
    State(state): State<AppState>,
    Path(park_code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AggregateResult>, ApiError> {
    let started = Instant::now();
    let result = park_scoped(&state, &headers, CatalogResource::PARKING_LOTS, park_code).await;
    observed("/v1/parkinglots/{park_code}", "GET", started, result)
}

pub(super) async fn park_news_releases(
    State(state): State<AppState>,
    Path(park_code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AggregateResult>, ApiError> {
    let started = Instant::now();
    let result = park_scoped(&state, &headers, CatalogResource::NEWS_RELEASES, park_code).await;
    observed("/v1/newsreleases/{park_code}", "GET", started, result)
}

async fn park_scoped(
    state: &AppState,
    headers: &HeaderMap,
    resource: CatalogResource,
    park_code: String,
) -> Result<Json<AggregateResult>, ApiError> {
    let query = CatalogQuery::new(resource).filter("parkCode", park_code);
    walk(state, headers, query).await.map(Json)
}

/// Runs one complete catalog walk under the configured retry policy.
async fn walk(
    state: &AppState,
    headers: &HeaderMap,
    query: CatalogQuery,
) -> Result<AggregateResult, ApiError> {
    let resource = query.resource.path;
    let span = tracing::info_span!(
        "http.catalog",
        request_id = %extract_request_id(headers),
        resource,
        items = tracing::field::Empty,
        pages = tracing::field::Empty,
    );

    let catalog = &state.catalog;
    let query = &query;
    let result = state
        .retry
        .run(move || catalog.fetch_walk(query))
        .instrument(span.clone())
        .await;

    match result {
        Ok(walk) => {
            span.record("items", walk.result.len());
            span.record("pages", walk.pages);
            crate::metrics::observe_catalog_walk(resource, "ok");
            crate::metrics::observe_catalog_pages(resource, u64::from(walk.pages));
            Ok(walk.result)
        }
        Err(err) => {
            crate::metrics::observe_catalog_walk(resource, err.kind());
            Err(catalog_error_response(&err))
        }
    }
}
