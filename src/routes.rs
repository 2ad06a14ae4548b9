use std::{sync::Arc, time::Duration};

use axum::{
    extract::{FromRequest, FromRequestParts, Path, State},
    http::{header::CONTENT_TYPE, Method, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::backend::ListBackend;
use crate::error::AppError;
use crate::metadata::{MetadataOutcome, UrlMetadata};
use crate::model::{normalize_url_input, List, ListDetails, ListSummary, NewList, UrlChange};
use crate::state::AppState;

/// JSON body whose rejections answer in the API's error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlChangeRequest {
    #[serde(default)]
    pub expected_version: Option<i64>,
    pub change: UrlChange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRequest {
    pub is_public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessBody {
    pub success: bool,
}

const SUCCESS: SuccessBody = SuccessBody { success: true };

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/metadata", get(metadata_handler))
        .route("/api/lists", get(lists_handler).post(create_list_handler))
        .route("/api/lists/slug/{slug}", get(list_by_slug_handler))
        .route(
            "/api/lists/{id}",
            put(update_details_handler).delete(delete_list_handler),
        )
        .route("/api/lists/{id}/urls", patch(change_urls_handler))
        .route("/api/lists/{id}/collaborators", post(collaborators_handler))
        .route("/api/lists/{id}/visibility", post(visibility_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn metadata_handler(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<MetadataQuery>,
) -> Result<Json<UrlMetadata>, AppError> {
    let raw = query
        .url
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("URL is required".to_string()))?;
    let target = normalize_url_input(&raw).map_err(AppError::BadRequest)?;

    match state.fetcher.fetch(&target).await {
        MetadataOutcome::Extracted(metadata) | MetadataOutcome::Fallback(metadata) => {
            Ok(Json(metadata))
        }
        MetadataOutcome::Failed(message) => {
            let detail = if state.config.expose_errors {
                format!("Failed to fetch metadata: {}", message)
            } else {
                "Failed to fetch metadata".to_string()
            };
            Err(AppError::MetadataUnavailable(detail))
        }
    }
}

pub async fn lists_handler(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<OwnerQuery>,
) -> Result<Json<Vec<ListSummary>>, AppError> {
    let lists = state.database.lists_for_owner(query.owner.as_deref()).await?;
    Ok(Json(lists))
}

pub async fn create_list_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(new_list): JsonBody<NewList>,
) -> Result<impl IntoResponse, AppError> {
    let list = state.database.insert(new_list).await?;
    Ok((StatusCode::CREATED, Json(list)))
}

pub async fn list_by_slug_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<List>, AppError> {
    let list = state.database.fetch_by_slug(&slug).await?;
    Ok(Json(list))
}

pub async fn update_details_handler(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
    JsonBody(details): JsonBody<ListDetails>,
) -> Result<Json<List>, AppError> {
    let list = state.database.update_details(&list_id, details).await?;
    Ok(Json(list))
}

pub async fn delete_list_handler(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
) -> Result<Json<SuccessBody>, AppError> {
    state.database.delete(&list_id).await?;
    Ok(Json(SUCCESS))
}

pub async fn change_urls_handler(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
    JsonBody(request): JsonBody<UrlChangeRequest>,
) -> Result<Json<List>, AppError> {
    debug!("url change on list {}: {:?}", list_id, request.change);
    let list = state
        .database
        .apply_change(&list_id, request.expected_version, request.change)
        .await?;
    Ok(Json(list))
}

pub async fn collaborators_handler(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
    JsonBody(request): JsonBody<CollaboratorRequest>,
) -> Result<Json<SuccessBody>, AppError> {
    state
        .database
        .add_collaborator(&list_id, &request.email)
        .await?;
    info!("collaborator added to list {}", list_id);
    Ok(Json(SUCCESS))
}

pub async fn visibility_handler(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
    JsonBody(request): JsonBody<VisibilityRequest>,
) -> Result<Json<SuccessBody>, AppError> {
    state
        .database
        .set_visibility(&list_id, request.is_public)
        .await?;
    Ok(Json(SUCCESS))
}
