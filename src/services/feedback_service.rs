use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{to_data, Document, DocumentStore};
use crate::filter::{Filter, FindQuery};
use crate::middleware::SessionUser;
use crate::models::{collections, Feedback, FeedbackSubmitter};

use super::{ServiceError, ServiceResult};

/// Client-supplied part of a feedback entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackInput {
    pub kind: String,
    pub title: String,
    pub description: String,
    pub priority: Option<String>,
    pub phone: Option<String>,
}

/// Store feedback in the master database
pub async fn submit(
    master: &dyn DocumentStore,
    user: &SessionUser,
    domain: &str,
    input: FeedbackInput,
) -> ServiceResult<Uuid> {
    if !matches!(user.user_type.as_str(), "school" | "teacher") {
        warn!("{} ({}) tried to submit feedback", user.username, user.user_type);
        return Err(ServiceError::forbidden("Only school and teacher users can submit feedback"));
    }

    let feedback = Feedback {
        kind: input.kind,
        title: input.title,
        description: input.description,
        priority: input
            .priority
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| "medium".to_string()),
        status: "open".to_string(),
        phone: input.phone.filter(|p| !p.trim().is_empty()),
        submitted_by: FeedbackSubmitter::from_session(user, domain),
        images: vec![],
    };

    let doc = master.insert(collections::FEEDBACK, to_data(&feedback)?).await?;
    info!("Feedback {} ({}) submitted by {} from {}", doc.id, feedback.kind, user.username, domain);
    Ok(doc.id)
}

/// Newest feedback from the caller's domain
pub async fn list(
    master: &dyn DocumentStore,
    user: &SessionUser,
    status: Option<&str>,
    kind: Option<&str>,
    limit: u64,
) -> ServiceResult<Vec<Document>> {
    if user.user_type != "school" {
        return Err(ServiceError::forbidden("Only school users can view feedback"));
    }

    let mut filter = Filter::eq("submittedBy.domain", user.domain.as_str());
    if let Some(status) = status.map(str::trim).filter(|s| !s.is_empty()) {
        filter = filter.and(Filter::eq("status", status));
    }
    if let Some(kind) = kind.map(str::trim).filter(|k| !k.is_empty()) {
        filter = filter.and(Filter::eq("type", kind));
    }

    let query = FindQuery::new(filter).newest_first().limit(limit);
    Ok(master.find(collections::FEEDBACK, &query).await?)
}
