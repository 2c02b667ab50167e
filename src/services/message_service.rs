use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{parse_id, to_data, DataMap, Document, DocumentStore};
use crate::filter::{Filter, FindQuery};
use crate::middleware::SessionUser;
use crate::models::{collections, Message};

use super::{Paged, Pagination, ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Read,
    Unread,
}

impl ReadState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "read" => Some(ReadState::Read),
            "unread" => Some(ReadState::Unread),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboxQuery {
    pub page: u64,
    pub limit: u64,
    pub search: Option<String>,
    pub read: Option<ReadState>,
    pub starred: bool,
}

pub fn inbox_filter(username: &str, params: &InboxQuery) -> Filter {
    let mut filter = Filter::eq("receivercode", username);
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        filter = filter.and(Filter::Or(vec![
            Filter::contains("title", search),
            Filter::contains("message", search),
            Filter::contains("sendername", search),
        ]));
    }
    match params.read {
        Some(ReadState::Read) => filter = filter.and(Filter::eq("isRead", true)),
        Some(ReadState::Unread) => filter = filter.and(Filter::ne("isRead", true)),
        None => {}
    }
    if params.starred {
        filter = filter.and(Filter::eq("isFavorite", true));
    }
    filter
}

pub async fn inbox(
    store: &dyn DocumentStore,
    username: &str,
    params: &InboxQuery,
) -> ServiceResult<Paged<Document>> {
    let filter = inbox_filter(username, params);
    let total = store.count(collections::MESSAGES, &filter).await?;
    let query = FindQuery::new(filter).newest_first().page(params.page, params.limit);
    let items = store.find(collections::MESSAGES, &query).await?;
    Ok(Paged {
        items,
        pagination: Pagination::new(params.page, params.limit, total),
    })
}

/// Stamp sender fields and reset state the client must not choose
fn prepare(user: &SessionUser, mut message: Message) -> ServiceResult<Message> {
    message.validate().map_err(ServiceError::Invalid)?;
    message.receivercode = message.receivercode.trim().to_string();
    message.mail_id = Some(Uuid::new_v4().to_string());
    message.sendername = user.name.clone().unwrap_or_else(|| user.username.clone());
    message.sendercode = user.username.clone();
    message.is_read = false;
    message.read_time = None;
    message.is_favorite = false;
    Ok(message)
}

pub async fn send(store: &dyn DocumentStore, user: &SessionUser, message: Message) -> ServiceResult<Document> {
    if !matches!(user.user_type.as_str(), "school" | "teacher") {
        warn!("{} ({}) tried to send a message", user.username, user.user_type);
        return Err(ServiceError::forbidden("Only school and teacher users can send messages"));
    }
    let message = prepare(user, message)?;
    let doc = store.insert(collections::MESSAGES, to_data(&message)?).await?;
    info!("{} sent message {} to {}", user.username, doc.id, message.receivercode);
    Ok(doc)
}

/// Insert the reply, then mark the original read. The second step is
/// best-effort: its failure is logged and the reply still stands.
pub async fn reply(store: &dyn DocumentStore, user: &SessionUser, message: Message) -> ServiceResult<Document> {
    let message = prepare(user, message)?;
    let original = message.original_message_id.clone();
    let doc = store.insert(collections::MESSAGES, to_data(&message)?).await?;
    info!("{} replied to {} with message {}", user.username, message.receivercode, doc.id);

    if let Some(original) = original {
        match parse_id(&original) {
            Ok(id) => {
                let filter = Filter::Id(id)
                    .and(Filter::eq("receivercode", user.username.as_str()))
                    .and(Filter::ne("isRead", true));
                if let Err(e) = store.merge(collections::MESSAGES, &filter, read_patch()).await {
                    warn!("Could not mark message {} read after reply: {}", id, e);
                }
            }
            Err(_) => warn!("Reply references invalid message id {}", original),
        }
    }

    Ok(doc)
}

fn read_patch() -> DataMap {
    let mut patch = DataMap::new();
    patch.insert("isRead".to_string(), Value::Bool(true));
    patch.insert("readTime".to_string(), Value::String(Utc::now().to_rfc3339()));
    patch
}

/// Only the receiver can mark a message read
pub async fn mark_read(store: &dyn DocumentStore, username: &str, id: &str) -> ServiceResult<Document> {
    let id = parse_id(id)?;
    let filter = Filter::Id(id).and(Filter::eq("receivercode", username));
    store
        .merge(collections::MESSAGES, &filter, read_patch())
        .await?
        .ok_or_else(|| ServiceError::not_found("Message not found"))
}

/// Receiver or sender may delete
pub async fn delete(store: &dyn DocumentStore, username: &str, id: &str) -> ServiceResult<u64> {
    let id = parse_id(id)?;
    let filter = Filter::Id(id).and(Filter::Or(vec![
        Filter::eq("receivercode", username),
        Filter::eq("sendercode", username),
    ]));
    match store.delete_one(collections::MESSAGES, &filter).await? {
        0 => Err(ServiceError::not_found("Message not found")),
        deleted => {
            info!("{} deleted message {}", username, id);
            Ok(deleted)
        }
    }
}
