use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::document::{DataMap, Document};
use crate::filter::{Filter, FilterError, FindQuery};

/// Errors from document operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid collection name: {0}")]
    InvalidCollection(String),

    #[error("Invalid ID format")]
    InvalidId(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Failed to decode document: {0}")]
    Decode(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    /// Caused by the request rather than the backend
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidCollection(_) | StoreError::InvalidId(_) | StoreError::Filter(_)
        )
    }
}

/// Per-tenant document database. Every method is a single atomic operation
/// on one collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend label for logs and health output
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert(&self, collection: &str, data: DataMap) -> Result<Document, StoreError>;

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Replace `data` of the document with `id`; `None` when missing
    async fn replace(
        &self,
        collection: &str,
        id: Uuid,
        data: DataMap,
    ) -> Result<Option<Document>, StoreError>;

    /// Set top-level keys of the first document matching `filter`
    async fn merge(
        &self,
        collection: &str,
        filter: &Filter,
        patch: DataMap,
    ) -> Result<Option<Document>, StoreError>;

    /// Delete the first document matching `filter`; returns the deleted count
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    async fn close(&self);

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let query = FindQuery::new(filter.clone()).limit(1);
        Ok(self.find(collection, &query).await?.into_iter().next())
    }

    async fn find_by_id(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError> {
        self.find_one(collection, &Filter::Id(id)).await
    }

    async fn exists(&self, collection: &str, filter: &Filter) -> Result<bool, StoreError> {
        Ok(self.find_one(collection, filter).await?.is_some())
    }
}

/// Collection names: a letter followed by up to 62 letters, digits or `_`
pub fn validate_collection(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_collection_names() {
        assert!(validate_collection("classes").is_ok());
        assert!(validate_collection("form_submissions2").is_ok());
        assert!(validate_collection("").is_err());
        assert!(validate_collection("1abc").is_err());
        assert!(validate_collection("bad-name").is_err());
        assert!(validate_collection("a\"; drop table x").is_err());
        assert!(validate_collection(&"a".repeat(64)).is_err());
        assert!(validate_collection(&"a".repeat(63)).is_ok());
    }
}
