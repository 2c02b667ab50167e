// handlers/protected/dropdown.rs - `{label, value}` options for form selects

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query};
use serde::Deserialize;

use crate::auth::LabelValue;
use crate::database::validate_collection;
use crate::error::ApiError;
use crate::filter::SortDirection;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, TenantScope};
use crate::services::dropdown_service::{self, DropdownQuery};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropdownParams {
    pub label_field: Option<String>,
    pub value_field: Option<String>,
    pub filter_query: Option<String>,
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
    pub limit: Option<u64>,
    pub custom_label: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl DropdownParams {
    fn into_query(self) -> Result<DropdownQuery, ApiError> {
        let defaults = DropdownQuery::default();
        let filter = match non_empty(self.filter_query) {
            Some(raw) => dropdown_service::parse_filter_query(&raw)?,
            None => defaults.filter,
        };
        let sort_order = self.sort_order;
        Ok(DropdownQuery {
            label_field: non_empty(self.label_field).unwrap_or(defaults.label_field),
            value_field: non_empty(self.value_field).unwrap_or(defaults.value_field),
            filter,
            sort: non_empty(self.sort_field).map(|field| {
                let direction = sort_order
                    .as_deref()
                    .map(SortDirection::parse)
                    .unwrap_or(SortDirection::Asc);
                (field, direction)
            }),
            limit: self.limit.filter(|l| *l > 0),
            custom_label: non_empty(self.custom_label),
        })
    }
}

/// GET /api/dropdown-options/:collection
pub async fn options(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    Path(collection): Path<String>,
    params: Result<Query<DropdownParams>, QueryRejection>,
) -> ApiResult<Vec<LabelValue>> {
    let Query(params) = params?;
    scope.authorize(&user)?;
    validate_collection(&collection)?;
    let query = params.into_query()?;

    let store = scope.store().await?;
    let options = dropdown_service::options(store.as_ref(), &collection, &query).await?;
    Ok(ApiResponse::success(options))
}
