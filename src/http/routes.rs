//! Thin HTTP adapters: decode path/query/body parameters, call the
//! Search Engine or Link Store, encode responses. No policy or storage
//! logic lives here.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::guard::RequestContext;
use crate::http::dto::{decode_aas_identifier, decode_asset_id, LookupResult, PagingMetadata, SpecificAssetId};
use crate::http::state::AppState;
use crate::store::link_store::Link;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/lookup/shells", get(search_shells))
        .route(
            "/lookup/shells/:aas_identifier",
            get(get_links).post(create_links).delete(delete_links),
        )
        .route("/description", get(description))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default, rename = "assetIds")]
    asset_ids: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    cursor: Option<String>,
}

async fn search_shells(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
    context: Option<Extension<RequestContext>>,
) -> AppResult<Json<LookupResult>> {
    let links: Vec<Link> = query
        .asset_ids
        .as_deref()
        .unwrap_or("")
        .split(',')
        .filter(|s| !s.is_empty())
        .map(decode_asset_id)
        .collect::<Result<Vec<SpecificAssetId>, AppError>>()?
        .iter()
        .map(Link::from)
        .collect();

    let filter = context.and_then(|Extension(ctx)| ctx.filter);
    let (ids, next_cursor) = state
        .search_engine
        .search_aas_ids_by_links(&links, query.limit.unwrap_or(0), query.cursor.as_deref().unwrap_or(""), filter.as_ref())
        .await?;

    Ok(Json(LookupResult {
        paging_metadata: PagingMetadata {
            cursor: (!next_cursor.is_empty()).then_some(next_cursor),
        },
        result: ids,
    }))
}

async fn get_links(
    State(state): State<Arc<AppState>>,
    Path(aas_identifier): Path<String>,
) -> AppResult<Json<Vec<SpecificAssetId>>> {
    let aas_id = decode_aas_identifier(&aas_identifier)?;
    let links = state.link_store.get_links(&aas_id).await?;
    Ok(Json(links.into_iter().map(SpecificAssetId::from).collect()))
}

async fn create_links(
    State(state): State<Arc<AppState>>,
    Path(aas_identifier): Path<String>,
    Json(body): Json<Vec<SpecificAssetId>>,
) -> AppResult<(StatusCode, Json<Vec<SpecificAssetId>>)> {
    let aas_id = decode_aas_identifier(&aas_identifier)?;
    let links: Vec<Link> = body.iter().map(Link::from).collect();
    state.link_store.create_links(&aas_id, &links).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

async fn delete_links(
    State(state): State<Arc<AppState>>,
    Path(aas_identifier): Path<String>,
) -> AppResult<StatusCode> {
    let aas_id = decode_aas_identifier(&aas_identifier)?;
    state.link_store.delete_links(&aas_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn description() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "profiles": ["https://admin-shell.io/aas/API/3/0/DiscoveryServiceSpecification/SSP-001"]
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "UP"}))
}

