use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::QueryAs;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use super::document::{DataMap, Document};
use super::router::{Connector, DatabaseError};
use super::store::{validate_collection, DocumentStore, StoreError};
use crate::config::{DatabaseConfig, TenantTarget};
use crate::filter::{Filter, FilterOrder, FilterWhere, FindQuery, SqlParam};

const COLUMNS: &str = "\"id\", \"data\", \"created_at\", \"updated_at\"";

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    data: Json<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        let data = match row.data.0 {
            Value::Object(map) => map,
            _ => DataMap::new(),
        };
        Document {
            id: row.id,
            data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Tenant database on Postgres: one table per collection holding JSONB documents
pub struct PgDocumentStore {
    pool: PgPool,
    database: String,
    tables: RwLock<HashSet<String>>,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
            tables: RwLock::new(HashSet::new()),
        }
    }

    /// Validate the collection name and create its table on first use
    async fn table(&self, collection: &str) -> Result<String, StoreError> {
        validate_collection(collection)?;
        let quoted = quote_identifier(collection);

        if self.tables.read().await.contains(collection) {
            return Ok(quoted);
        }

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {quoted} (
                \"id\" UUID PRIMARY KEY,
                \"data\" JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                \"created_at\" TIMESTAMPTZ NOT NULL DEFAULT now(),
                \"updated_at\" TIMESTAMPTZ NOT NULL DEFAULT now()
            )"
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        self.tables.write().await.insert(collection.to_string());
        info!("Ensured collection table {}.{}", self.database, collection);
        Ok(quoted)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn bind_params<'q>(
    mut query: QueryAs<'q, Postgres, DocumentRow, PgArguments>,
    params: Vec<SqlParam>,
) -> QueryAs<'q, Postgres, DocumentRow, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Text(s) => query.bind(s),
            SqlParam::Json(v) => query.bind(Json(v)),
            SqlParam::Uuid(u) => query.bind(u),
            SqlParam::TextArray(a) => query.bind(a),
        };
    }
    query
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert(&self, collection: &str, data: DataMap) -> Result<Document, StoreError> {
        let table = self.table(collection).await?;
        let doc = Document::new(data);
        let sql = format!(
            "INSERT INTO {table} ({COLUMNS}) VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
        );
        let row: DocumentRow = sqlx::query_as(&sql)
            .bind(doc.id)
            .bind(Json(Value::Object(doc.data)))
            .bind(doc.created_at)
            .bind(doc.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        let table = self.table(collection).await?;
        let (where_clause, mut params) = FilterWhere::generate(&query.filter, 0)?;
        let (order_clause, order_params) = FilterOrder::generate(&query.sort, params.len())?;
        params.extend(order_params);

        let mut sql = format!("SELECT {COLUMNS} FROM {table} WHERE {where_clause}");
        if !order_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&order_clause);
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit.min(i64::MAX as u64)));
        }
        if query.skip > 0 {
            sql.push_str(&format!(" OFFSET {}", query.skip.min(i64::MAX as u64)));
        }

        let rows = bind_params(sqlx::query_as(&sql), params)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let table = self.table(collection).await?;
        let (where_clause, params) = FilterWhere::generate(filter, 0)?;
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE {where_clause}");

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for param in params {
            query = match param {
                SqlParam::Text(s) => query.bind(s),
                SqlParam::Json(v) => query.bind(Json(v)),
                SqlParam::Uuid(u) => query.bind(u),
                SqlParam::TextArray(a) => query.bind(a),
            };
        }
        let count = query.fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn replace(
        &self,
        collection: &str,
        id: Uuid,
        data: DataMap,
    ) -> Result<Option<Document>, StoreError> {
        let table = self.table(collection).await?;
        let sql = format!(
            "UPDATE {table} SET \"data\" = $1, \"updated_at\" = now() WHERE \"id\" = $2 RETURNING {COLUMNS}"
        );
        let row: Option<DocumentRow> = sqlx::query_as(&sql)
            .bind(Json(Value::Object(data)))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Document::from))
    }

    async fn merge(
        &self,
        collection: &str,
        filter: &Filter,
        patch: DataMap,
    ) -> Result<Option<Document>, StoreError> {
        let table = self.table(collection).await?;
        let (where_clause, params) = FilterWhere::generate(filter, 1)?;
        let sql = format!(
            "UPDATE {table} SET \"data\" = \"data\" || $1::jsonb, \"updated_at\" = now() \
             WHERE \"id\" = (SELECT \"id\" FROM {table} WHERE {where_clause} LIMIT 1) \
             RETURNING {COLUMNS}"
        );
        let query = sqlx::query_as(&sql).bind(Json(Value::Object(patch)));
        let row = bind_params(query, params).fetch_optional(&self.pool).await?;
        Ok(row.map(Document::from))
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let table = self.table(collection).await?;
        let (where_clause, params) = FilterWhere::generate(filter, 0)?;
        let sql = format!(
            "DELETE FROM {table} WHERE \"id\" = (SELECT \"id\" FROM {table} WHERE {where_clause} LIMIT 1) \
             RETURNING {COLUMNS}"
        );
        let rows = bind_params(sqlx::query_as(&sql), params)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.len() as u64)
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool: {}", self.database);
    }
}

/// Opens a `PgPool` per tenant database, creating the database when missing
pub struct PgConnector {
    max_connections: u32,
    connect_timeout: Duration,
}

impl PgConnector {
    pub fn new(max_connections: u32, connect_timeout: Duration) -> Self {
        Self {
            max_connections,
            connect_timeout,
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(
            config.max_connections,
            Duration::from_secs(config.connection_timeout),
        )
    }

    async fn open(&self, connection_string: &str) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .connect(connection_string)
            .await
    }

    /// Create `database` through the server's `postgres` database
    async fn create_database(&self, connection_string: &str, database: &str) -> Result<(), DatabaseError> {
        let mut admin_url = url::Url::parse(connection_string)
            .map_err(|_| DatabaseError::Connection("invalid connection string".to_string()))?;
        admin_url.set_path("/postgres");

        let admin_pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(self.connect_timeout)
            .connect(admin_url.as_str())
            .await?;
        let result = sqlx::query(&format!("CREATE DATABASE {}", quote_identifier(database)))
            .execute(&admin_pool)
            .await;
        admin_pool.close().await;

        match result {
            Ok(_) => {
                info!("Created tenant database {}", database);
                Ok(())
            }
            // Lost a creation race with another process
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("42P04") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, target: &TenantTarget) -> Result<Arc<dyn DocumentStore>, DatabaseError> {
        let connection_string = target
            .connection_string
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = match self.open(connection_string).await {
            Ok(pool) => pool,
            // invalid_catalog_name: database does not exist yet
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("3D000") => {
                warn!("Tenant database {} missing, creating it", target.database);
                self.create_database(connection_string, &target.database).await?;
                self.open(connection_string).await?
            }
            Err(e) => return Err(e.into()),
        };

        info!("Created database pool for: {}", target.database);
        Ok(Arc::new(PgDocumentStore::new(pool, target.database.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_identifier("classes"), "\"classes\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[tokio::test]
    async fn connect_without_url_is_config_error() {
        let connector = PgConnector::new(1, Duration::from_secs(1));
        let target = TenantTarget {
            domain: "localhost".to_string(),
            database: "tenant_x".to_string(),
            connection_string: None,
            school_code: None,
            configured: false,
        };
        assert!(matches!(
            connector.connect(&target).await,
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        ));
    }
}
