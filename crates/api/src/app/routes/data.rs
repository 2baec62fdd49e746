use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode};

use sessiongate_core::DataEntry;

use crate::app::dto::DataRequest;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub async fn post_data(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<DataRequest>,
) -> Result<StatusCode, ApiError> {
    services
        .data
        .save_data(&DataEntry::new(body.key, body.value))
        .await?;
    Ok(StatusCode::CREATED)
}
