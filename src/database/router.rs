use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::store::DocumentStore;
use crate::config::{ConfigError, TenantDirectory, TenantTarget};

/// Errors from tenant connection routing
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid tenant domain: {0}")]
    InvalidTenantName(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Opens a store for a tenant target
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &TenantTarget) -> Result<Arc<dyn DocumentStore>, DatabaseError>;
}

/// Cached tenant handle
pub struct TenantConnection {
    pub domain: String,
    pub target: TenantTarget,
    pub handle: Arc<dyn DocumentStore>,
    pub created_at: DateTime<Utc>,
    last_used_ms: AtomicI64,
}

impl TenantConnection {
    fn new(target: TenantTarget, handle: Arc<dyn DocumentStore>) -> Self {
        let now = Utc::now();
        Self {
            domain: target.domain.clone(),
            target,
            handle,
            created_at: now,
            last_used_ms: AtomicI64::new(now.timestamp_millis()),
        }
    }

    pub fn last_used(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_used_ms.load(Ordering::Relaxed))
            .unwrap_or(self.created_at)
    }

    fn touch(&self) {
        self.last_used_ms
            .fetch_max(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }
}

impl fmt::Debug for TenantConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantConnection")
            .field("domain", &self.domain)
            .field("database", &self.target.database)
            .field("created_at", &self.created_at)
            .field("last_used", &self.last_used())
            .finish_non_exhaustive()
    }
}

/// Snapshot of a cache entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub domain: String,
    pub database: String,
    pub backend: &'static str,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

/// Process-scoped registry mapping tenant domains to live store handles.
///
/// At most one entry per domain. Failed connects are not cached, so the next
/// request for that domain tries again.
pub struct ConnectionRouter {
    directory: TenantDirectory,
    connector: Arc<dyn Connector>,
    master_domain: String,
    connections: Arc<RwLock<HashMap<String, Arc<TenantConnection>>>>,
}

impl ConnectionRouter {
    pub fn new(
        directory: TenantDirectory,
        connector: Arc<dyn Connector>,
        master_domain: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            connector,
            master_domain: master_domain.into(),
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn directory(&self) -> &TenantDirectory {
        &self.directory
    }

    /// Get the cached connection for `domain` or open a new one
    pub async fn resolve(&self, domain: &str) -> Result<Arc<TenantConnection>, DatabaseError> {
        let domain = TenantDirectory::normalize_domain(domain)
            .ok_or_else(|| DatabaseError::InvalidTenantName(domain.to_string()))?;

        // Fast path: try read lock
        {
            let connections = self.connections.read().await;
            if let Some(conn) = connections.get(&domain) {
                conn.touch();
                return Ok(conn.clone());
            }
        }

        let target = self.directory.target_for(&domain)?;
        let handle = self.connector.connect(&target).await.map_err(|e| {
            warn!("Failed to connect tenant {} ({}): {}", domain, target.database, e);
            e
        })?;

        // Another request may have connected meanwhile; first insert wins
        let mut connections = self.connections.write().await;
        if let Some(existing) = connections.get(&domain) {
            existing.touch();
            let existing = existing.clone();
            drop(connections);
            handle.close().await;
            return Ok(existing);
        }

        let conn = Arc::new(TenantConnection::new(target, handle));
        connections.insert(domain.clone(), conn.clone());
        info!(
            "Created {} connection for tenant {}: {}",
            conn.handle.backend(),
            domain,
            conn.target.database
        );
        Ok(conn)
    }

    /// Connection for the cross-tenant master database
    pub async fn resolve_master(&self) -> Result<Arc<TenantConnection>, DatabaseError> {
        self.resolve(&self.master_domain).await
    }

    /// Drop and close the cached connection for `domain`
    pub async fn evict(&self, domain: &str) -> bool {
        let Some(domain) = TenantDirectory::normalize_domain(domain) else {
            return false;
        };
        let removed = self.connections.write().await.remove(&domain);
        match removed {
            Some(conn) => {
                conn.handle.close().await;
                info!("Evicted connection for tenant {}", domain);
                true
            }
            None => false,
        }
    }

    /// Cached entries, sorted by domain
    pub async fn cached(&self) -> Vec<ConnectionInfo> {
        let connections = self.connections.read().await;
        let mut infos: Vec<ConnectionInfo> = connections
            .values()
            .map(|conn| ConnectionInfo {
                domain: conn.domain.clone(),
                database: conn.target.database.clone(),
                backend: conn.handle.backend(),
                created_at: conn.created_at,
                last_used: conn.last_used(),
            })
            .collect();
        infos.sort_by(|a, b| a.domain.cmp(&b.domain));
        infos
    }

    /// Close and remove all connections (e.g., on shutdown)
    pub async fn close_all(&self) {
        let drained: Vec<Arc<TenantConnection>> = {
            let mut connections = self.connections.write().await;
            connections.drain().map(|(_, conn)| conn).collect()
        };
        futures::future::join_all(drained.iter().map(|conn| async move {
            conn.handle.close().await;
            info!("Closed connection for tenant {}", conn.domain);
        }))
        .await;
    }
}
