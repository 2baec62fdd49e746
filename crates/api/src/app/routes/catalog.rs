use std::sync::Arc;

use axum::{Json, extract::Extension};

use crate::app::dto::CatalogItemResponse;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

/// Public listing; an empty catalog is `[]`, never an error.
pub async fn list_catalog(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Vec<CatalogItemResponse>>, ApiError> {
    let items = services.catalog.list().await?;
    Ok(Json(items.into_iter().map(CatalogItemResponse::from).collect()))
}
