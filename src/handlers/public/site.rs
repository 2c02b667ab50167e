// handlers/public/site.rs - Published content pages

use axum::extract::Path;

use crate::database::Document;
use crate::middleware::{ApiResponse, ApiResult, TenantScope};
use crate::services::page_service;

/// GET /api/site/pages/:slug - Published page by slug
pub async fn page_by_slug(scope: TenantScope, Path(slug): Path<String>) -> ApiResult<Document> {
    let store = scope.store().await?;
    let page = page_service::published(store.as_ref(), &slug).await?;
    Ok(ApiResponse::success(page))
}
