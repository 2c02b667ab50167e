//! Data-access layer. Every function takes the tenant's `DocumentStore`,
//! performs at most one mutating store call, and reports failures as
//! `ServiceError` for the web layer to map onto status codes.

pub mod account_service;
pub mod class_service;
pub mod course_service;
pub mod crud_service;
pub mod dropdown_service;
pub mod error;
pub mod exam_service;
pub mod feedback_service;
pub mod form_service;
pub mod message_service;
pub mod page_service;

pub use error::{ServiceError, ServiceResult};

use serde::Serialize;

/// Page window echoed back by list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let limit = limit.max(1);
        Self {
            page: page.max(1),
            limit,
            total,
            total_pages: total.div_ceil(limit),
        }
    }
}

/// One page of results plus its window
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}
