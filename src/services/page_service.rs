use tracing::{info, warn};

use crate::database::{parse_id, to_data, Document, DocumentStore};
use crate::filter::{Filter, FindQuery};
use crate::models::{collections, slugify, Page};

use super::{ServiceError, ServiceResult};

pub async fn list(store: &dyn DocumentStore) -> ServiceResult<Vec<Document>> {
    let query = FindQuery::new(Filter::All).newest_first();
    Ok(store.find(collections::PAGES, &query).await?)
}

pub async fn get(store: &dyn DocumentStore, id: &str) -> ServiceResult<Document> {
    let id = parse_id(id)?;
    store
        .find_by_id(collections::PAGES, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Page not found"))
}

async fn ensure_slug_free(store: &dyn DocumentStore, page: &Page, exclude: Option<uuid::Uuid>) -> ServiceResult<()> {
    let mut filter = Filter::eq("slug", page.slug.as_str());
    if let Some(id) = exclude {
        filter = filter.and(Filter::IdNot(id));
    }
    if store.exists(collections::PAGES, &filter).await? {
        warn!("Page slug {} already taken", page.slug);
        return Err(ServiceError::conflict("A page with this slug already exists"));
    }
    Ok(())
}

pub async fn create(store: &dyn DocumentStore, mut page: Page) -> ServiceResult<Document> {
    page.normalize().map_err(ServiceError::Invalid)?;
    ensure_slug_free(store, &page, None).await?;

    let doc = store.insert(collections::PAGES, to_data(&page)?).await?;
    info!("Created page {} ({})", page.slug, doc.id);
    Ok(doc)
}

pub async fn update(store: &dyn DocumentStore, id: &str, mut page: Page) -> ServiceResult<Document> {
    let existing = get(store, id).await?;
    page.normalize().map_err(ServiceError::Invalid)?;
    ensure_slug_free(store, &page, Some(existing.id)).await?;

    let doc = store
        .replace(collections::PAGES, existing.id, to_data(&page)?)
        .await?
        .ok_or_else(|| ServiceError::not_found("Page not found"))?;
    info!("Updated page {} ({})", page.slug, doc.id);
    Ok(doc)
}

pub async fn delete(store: &dyn DocumentStore, id: &str) -> ServiceResult<u64> {
    let id = parse_id(id)?;
    match store.delete_one(collections::PAGES, &Filter::Id(id)).await? {
        0 => Err(ServiceError::not_found("Page not found")),
        deleted => {
            info!("Deleted page {}", id);
            Ok(deleted)
        }
    }
}

/// Public lookup; drafts are invisible
pub async fn published(store: &dyn DocumentStore, slug: &str) -> ServiceResult<Document> {
    let slug = slugify(slug);
    if slug.is_empty() {
        return Err(ServiceError::not_found("Page not found"));
    }
    let filter = Filter::And(vec![
        Filter::eq("slug", slug),
        Filter::eq("isPublished", true),
    ]);
    store
        .find_one(collections::PAGES, &filter)
        .await?
        .ok_or_else(|| ServiceError::not_found("Page not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDocumentStore;
    use serde_json::{json, Value};

    fn page(value: Value) -> Page {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn slugs_are_unique() {
        let store = MemoryDocumentStore::new("t");
        let about = create(&store, page(json!({"title": "About Us"}))).await.unwrap();
        assert_eq!(about.data["slug"], "about-us");

        let err = create(&store, page(json!({"title": "About us!"}))).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        // Re-saving a page under its own slug is fine
        update(&store, &about.id.to_string(), page(json!({"title": "About Us", "content": "x"})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn public_lookup_skips_drafts() {
        let store = MemoryDocumentStore::new("t");
        create(&store, page(json!({"title": "News"}))).await.unwrap();
        create(&store, page(json!({"title": "Draft", "isPublished": false}))).await.unwrap();

        assert!(published(&store, "news").await.is_ok());
        assert!(matches!(published(&store, "draft").await, Err(ServiceError::NotFound(_))));
        assert!(matches!(published(&store, "!!").await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn invalid_ids_are_rejected() {
        let store = MemoryDocumentStore::new("t");
        let err = get(&store, "nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::Store(ref e) if e.is_client_error()));
    }
}
