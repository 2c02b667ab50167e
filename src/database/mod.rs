pub mod document;
pub mod memory;
pub mod postgres;
pub mod router;
pub mod store;

pub use document::{lookup, parse_id, to_data, value_text, DataMap, Document};
pub use memory::{MemoryConnector, MemoryDocumentStore};
pub use postgres::{PgConnector, PgDocumentStore};
pub use router::{ConnectionInfo, ConnectionRouter, Connector, DatabaseError, TenantConnection};
pub use store::{validate_collection, DocumentStore, StoreError};
