use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::document::{DataMap, Document};
use super::router::{Connector, DatabaseError};
use super::store::{validate_collection, DocumentStore, StoreError};
use crate::config::TenantTarget;
use crate::filter::{matcher, Filter, FilterWhere, FindQuery};

/// Process-local document store.
///
/// Backs `STORE_BACKEND=memory` and the test suite. `set_offline(true)` makes
/// every operation fail before touching data.
pub struct MemoryDocumentStore {
    database: String,
    collections: RwLock<HashMap<String, Vec<Document>>>,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collections: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Total documents across collections
    pub async fn len(&self) -> usize {
        self.collections.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check(&self, collection: &str) -> Result<(), StoreError> {
        validate_collection(collection)?;
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "database {} is offline",
                self.database
            )));
        }
        Ok(())
    }

    /// Reject filters the SQL backend would reject
    fn check_filter(filter: &Filter) -> Result<(), StoreError> {
        FilterWhere::generate(filter, 0)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "database {} is offline",
                self.database
            )));
        }
        Ok(())
    }

    async fn insert(&self, collection: &str, data: DataMap) -> Result<Document, StoreError> {
        self.check(collection)?;
        let mut doc = Document::new(data);
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        // Keep creation order strict so newest-first listings are stable
        if let Some(last) = docs.last() {
            if doc.created_at <= last.created_at {
                doc.created_at = last.created_at + chrono::Duration::microseconds(1);
                doc.updated_at = doc.created_at;
            }
        }
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        self.check(collection)?;
        Self::check_filter(&query.filter)?;

        let collections = self.collections.read().await;
        let mut docs: Vec<Document> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| matcher::matches(&query.filter, d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(collections);

        if !query.sort.is_empty() {
            docs.sort_by(|a, b| matcher::compare(&query.sort, a, b));
        }

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(docs.into_iter().skip(skip).take(limit).collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.check(collection)?;
        Self::check_filter(filter)?;
        let collections = self.collections.read().await;
        let count = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| matcher::matches(filter, d)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn replace(
        &self,
        collection: &str,
        id: Uuid,
        data: DataMap,
    ) -> Result<Option<Document>, StoreError> {
        self.check(collection)?;
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id));
        Ok(doc.map(|doc| {
            doc.data = data;
            doc.updated_at = Utc::now();
            doc.clone()
        }))
    }

    async fn merge(
        &self,
        collection: &str,
        filter: &Filter,
        patch: DataMap,
    ) -> Result<Option<Document>, StoreError> {
        self.check(collection)?;
        Self::check_filter(filter)?;
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| matcher::matches(filter, d)));
        Ok(doc.map(|doc| {
            doc.data.extend(patch);
            doc.updated_at = Utc::now();
            doc.clone()
        }))
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.check(collection)?;
        Self::check_filter(filter)?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match docs.iter().position(|d| matcher::matches(filter, d)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn close(&self) {}
}

/// Hands out one `MemoryDocumentStore` per database name.
///
/// Stores outlive router eviction so data survives a reconnect. The connect
/// counter and `fail_connects` switch exist for outage and caching checks.
#[derive(Default)]
pub struct MemoryConnector {
    stores: std::sync::Mutex<HashMap<String, Arc<MemoryDocumentStore>>>,
    connects: AtomicUsize,
    fail_connects: AtomicBool,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `connect` calls made so far
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn set_fail_connects(&self, fail: bool) {
        self.fail_connects.store(fail, Ordering::SeqCst);
    }

    /// The store backing `database`, created on first use
    pub fn store(&self, database: &str) -> Arc<MemoryDocumentStore> {
        let mut stores = match self.stores.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        stores
            .entry(database.to_string())
            .or_insert_with(|| Arc::new(MemoryDocumentStore::new(database)))
            .clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, target: &TenantTarget) -> Result<Arc<dyn DocumentStore>, DatabaseError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connects.load(Ordering::SeqCst) {
            return Err(DatabaseError::Connection(format!(
                "memory database {} refused connection",
                target.database
            )));
        }
        info!("Opened in-memory database for {}: {}", target.domain, target.database);
        Ok(self.store(&target.database))
    }
}
