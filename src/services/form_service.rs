use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{parse_id, to_data, DataMap, Document, DocumentStore};
use crate::filter::{Filter, FindQuery, SortDirection, SortKey};
use crate::models::{collections, Form, FormMetadata, FormStatus, Submission};

use super::{Paged, Pagination, ServiceError, ServiceResult};

/// Window and ordering for the form list
#[derive(Debug, Clone, PartialEq)]
pub struct FormListQuery {
    pub page: u64,
    pub limit: u64,
    pub search: Option<String>,
    pub sort: SortKey,
}

/// Archived forms stay stored for their submissions but are hidden
fn active_forms() -> Filter {
    Filter::ne("metadata.status", "archived")
}

pub async fn list(store: &dyn DocumentStore, params: &FormListQuery) -> ServiceResult<Paged<Document>> {
    let mut filter = active_forms();
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        filter = filter.and(Filter::contains("title", search));
    }

    let total = store.count(collections::FORMS, &filter).await?;
    let query = FindQuery::new(filter)
        .sort_key(params.sort.clone())
        .page(params.page, params.limit);
    let items = store.find(collections::FORMS, &query).await?;

    Ok(Paged {
        items,
        pagination: Pagination::new(params.page, params.limit, total),
    })
}

/// `form` comes from `Form::from_input`, already validated
pub async fn create(store: &dyn DocumentStore, username: &str, mut form: Form) -> ServiceResult<Document> {
    form.metadata = Some(FormMetadata::new(username));

    let doc = store.insert(collections::FORMS, to_data(&form)?).await?;
    info!("{} created form {} ({})", username, doc.id, form.title);
    Ok(doc)
}

pub async fn get(store: &dyn DocumentStore, id: &str) -> ServiceResult<Document> {
    let id = parse_id(id)?;
    store
        .find_by_id(collections::FORMS, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Form not found"))
}

fn metadata_of(doc: &Document) -> FormMetadata {
    doc.get("metadata")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_else(|| FormMetadata::new(""))
}

/// Replace title and fields, bumping `metadata.version`
pub async fn update(
    store: &dyn DocumentStore,
    username: &str,
    id: &str,
    mut form: Form,
) -> ServiceResult<Document> {
    let existing = get(store, id).await?;

    let mut metadata = metadata_of(&existing);
    if let Some(status) = form.metadata.as_ref().map(|m| m.status) {
        metadata.status = status;
    }
    metadata.version += 1;
    metadata.last_modified_by = Some(username.to_string());
    metadata.last_modified_at = Some(Utc::now());
    form.metadata = Some(metadata);

    let doc = store
        .replace(collections::FORMS, existing.id, to_data(&form)?)
        .await?
        .ok_or_else(|| ServiceError::not_found("Form not found"))?;
    info!("{} updated form {}", username, doc.id);
    Ok(doc)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDeletion {
    pub archived: bool,
    pub submission_count: u64,
}

/// Forms with submissions are archived, others removed
pub async fn delete(store: &dyn DocumentStore, username: &str, id: &str) -> ServiceResult<FormDeletion> {
    let existing = get(store, id).await?;
    let submission_count = store
        .count(
            collections::FORM_SUBMISSIONS,
            &Filter::eq("formId", existing.id.to_string()),
        )
        .await?;

    if submission_count > 0 {
        let mut metadata = metadata_of(&existing);
        metadata.status = FormStatus::Archived;
        metadata.deleted_at = Some(Utc::now());
        metadata.deleted_by = Some(username.to_string());

        let mut patch = DataMap::new();
        patch.insert(
            "metadata".to_string(),
            serde_json::to_value(&metadata).map_err(|e| ServiceError::invalid(e.to_string()))?,
        );
        store
            .merge(collections::FORMS, &Filter::Id(existing.id), patch)
            .await?
            .ok_or_else(|| ServiceError::not_found("Form not found"))?;
        info!("{} archived form {} with {} submissions", username, existing.id, submission_count);
        return Ok(FormDeletion {
            archived: true,
            submission_count,
        });
    }

    if store.delete_one(collections::FORMS, &Filter::Id(existing.id)).await? == 0 {
        return Err(ServiceError::not_found("Form not found"));
    }
    info!("{} deleted form {}", username, existing.id);
    Ok(FormDeletion {
        archived: false,
        submission_count: 0,
    })
}

pub async fn list_submissions(
    store: &dyn DocumentStore,
    form_id: &str,
    user_id: Option<&str>,
    page: u64,
    limit: u64,
) -> ServiceResult<Paged<Document>> {
    let mut filter = Filter::eq("formId", form_id.trim());
    if let Some(user_id) = user_id.map(str::trim).filter(|u| !u.is_empty()) {
        filter = filter.and(Filter::eq("submittedBy", user_id));
    }

    let total = store.count(collections::FORM_SUBMISSIONS, &filter).await?;
    let query = FindQuery::new(filter)
        .sort("updatedAt", SortDirection::Desc)?
        .page(page, limit);
    let items = store.find(collections::FORM_SUBMISSIONS, &query).await?;

    Ok(Paged {
        items,
        pagination: Pagination::new(page, limit, total),
    })
}

/// Request details recorded with a submission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionContext {
    pub username: String,
    pub source: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

pub async fn submit(
    store: &dyn DocumentStore,
    form_id: &str,
    answers: Value,
    context: SubmissionContext,
) -> ServiceResult<Uuid> {
    let form_doc = get(store, form_id).await?;
    let form: Form = form_doc.decode()?;
    if form.is_archived() {
        warn!("Submission to archived form {} by {}", form_doc.id, context.username);
        return Err(ServiceError::not_found("Form not found"));
    }

    let submission = Submission {
        form_id: form_doc.id.to_string(),
        form_title: form.title,
        answers,
        submitted_by: context.username,
        submission_source: context.source.unwrap_or_else(|| "web".to_string()),
        user_agent: context.user_agent.unwrap_or_default(),
        ip_address: context.ip_address.unwrap_or_default(),
    };

    let doc = store
        .insert(collections::FORM_SUBMISSIONS, to_data(&submission)?)
        .await?;
    info!("{} submitted form {}", submission.submitted_by, submission.form_id);
    Ok(doc.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDocumentStore;
    use crate::filter::{FilterOrder, SortDirection};
    use serde_json::json;

    fn input(value: Value) -> Form {
        Form::from_input(value.as_object().cloned().unwrap()).unwrap()
    }

    fn list_query() -> FormListQuery {
        FormListQuery {
            page: 1,
            limit: 10,
            search: None,
            sort: FilterOrder::key("createdAt", SortDirection::Desc).unwrap(),
        }
    }

    fn context(username: &str) -> SubmissionContext {
        SubmissionContext {
            username: username.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_and_update_bump_version() {
        let store = MemoryDocumentStore::new("t");
        let doc = create(&store, "admin", input(json!({"title": "Survey", "fields": []})))
            .await
            .unwrap();
        assert_eq!(doc.data["metadata"]["version"], 1);
        assert_eq!(doc.data["metadata"]["status"], "draft");

        let updated = update(
            &store,
            "editor",
            &doc.id.to_string(),
            input(json!({"title": "Survey v2", "fields": [{"name": "q"}]})),
        )
        .await
        .unwrap();
        assert_eq!(updated.data["metadata"]["version"], 2);
        assert_eq!(updated.data["metadata"]["createdBy"], "admin");
        assert_eq!(updated.data["metadata"]["lastModifiedBy"], "editor");
        assert_eq!(updated.data["title"], "Survey v2");
    }

    #[tokio::test]
    async fn delete_archives_when_submissions_exist() {
        let store = MemoryDocumentStore::new("t");
        let kept = create(&store, "admin", input(json!({"title": "Kept", "fields": []})))
            .await
            .unwrap();
        let dropped = create(&store, "admin", input(json!({"title": "Dropped", "fields": []})))
            .await
            .unwrap();
        submit(&store, &kept.id.to_string(), json!({"q": "a"}), context("s1"))
            .await
            .unwrap();

        let outcome = delete(&store, "admin", &kept.id.to_string()).await.unwrap();
        assert_eq!(outcome, FormDeletion { archived: true, submission_count: 1 });
        let outcome = delete(&store, "admin", &dropped.id.to_string()).await.unwrap();
        assert!(!outcome.archived);

        // Archived forms are hidden and closed to new submissions
        let page = list(&store, &list_query()).await.unwrap();
        assert!(page.items.is_empty());
        let err = submit(&store, &kept.id.to_string(), json!({}), context("s2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn lists_submissions_per_user() {
        let store = MemoryDocumentStore::new("t");
        let form = create(&store, "admin", input(json!({"title": "Quiz", "fields": []})))
            .await
            .unwrap();
        let form_id = form.id.to_string();
        for user in ["s1", "s2", "s1"] {
            submit(&store, &form_id, json!({"q": user}), context(user)).await.unwrap();
        }

        let all = list_submissions(&store, &form_id, None, 1, 2).await.unwrap();
        assert_eq!(all.items.len(), 2);
        assert_eq!(all.pagination.total, 3);
        assert_eq!(all.pagination.total_pages, 2);

        let mine = list_submissions(&store, &form_id, Some("s1"), 1, 10).await.unwrap();
        assert_eq!(mine.pagination.total, 2);
        assert_eq!(mine.items[0].data["formTitle"], "Quiz");
    }

    #[tokio::test]
    async fn list_searches_titles() {
        let store = MemoryDocumentStore::new("t");
        for title in ["Entrance exam", "Parent survey"] {
            create(&store, "admin", input(json!({"title": title, "fields": []})))
                .await
                .unwrap();
        }
        let mut params = list_query();
        params.search = Some("SURVEY".into());
        let page = list(&store, &params).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.pagination.total, 1);
    }
}
