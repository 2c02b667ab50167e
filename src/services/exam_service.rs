use serde_json::Value;
use tracing::{info, warn};

use crate::database::{parse_id, to_data, Document, DocumentStore};
use crate::filter::{Filter, FindQuery};
use crate::middleware::SessionUser;
use crate::models::{collections, Exam};

use super::{ServiceError, ServiceResult};

fn visible(doc: &Document, user: &SessionUser) -> bool {
    match doc.decode::<Exam>() {
        Ok(exam) => exam.is_visible_to(user),
        Err(e) => {
            warn!("Skipping undecodable exam {}: {}", doc.id, e);
            false
        }
    }
}

/// Exams of the caller's school that the caller is a recipient of
pub async fn list(store: &dyn DocumentStore, user: &SessionUser) -> ServiceResult<Vec<Document>> {
    let query = FindQuery::new(Filter::eq("schoolCode", user.school_code.as_str())).newest_first();
    let docs = store.find(collections::EXAMS, &query).await?;
    if user.user_type == "school" {
        return Ok(docs);
    }
    Ok(docs.into_iter().filter(|doc| visible(doc, user)).collect())
}

pub async fn create(
    store: &dyn DocumentStore,
    user: &SessionUser,
    mut exam: Exam,
) -> ServiceResult<Document> {
    if !matches!(user.user_type.as_str(), "school" | "teacher") {
        return Err(ServiceError::forbidden("Only school or teacher users can create exams"));
    }
    exam.validate().map_err(ServiceError::Invalid)?;
    exam.exam_code = exam.exam_code.trim().to_string();
    exam.school_code = user.school_code.clone();

    let duplicate = Filter::And(vec![
        Filter::eq("examCode", exam.exam_code.as_str()),
        Filter::eq("schoolCode", user.school_code.as_str()),
    ]);
    if store.exists(collections::EXAMS, &duplicate).await? {
        warn!("Duplicate exam code {} in school {}", exam.exam_code, user.school_code);
        return Err(ServiceError::conflict("Exam code already exists"));
    }

    exam.extra
        .insert("createdBy".to_string(), Value::from(user.username.as_str()));
    let doc = store.insert(collections::EXAMS, to_data(&exam)?).await?;
    info!("{} created exam {}", user.username, exam.exam_code);
    Ok(doc)
}

/// Look up by document id or by exam code
pub async fn get(store: &dyn DocumentStore, user: &SessionUser, key: &str) -> ServiceResult<Document> {
    let filter = match parse_id(key) {
        Ok(id) => Filter::Id(id),
        Err(_) => Filter::And(vec![
            Filter::eq("examCode", key.trim()),
            Filter::eq("schoolCode", user.school_code.as_str()),
        ]),
    };
    let doc = store
        .find_one(collections::EXAMS, &filter)
        .await?
        .ok_or_else(|| ServiceError::not_found("Exam not found"))?;

    if doc.get_str("schoolCode") != Some(user.school_code.as_str()) {
        warn!("{} of school {} requested exam {} of another school", user.username, user.school_code, doc.id);
        return Err(ServiceError::forbidden("Access denied for this school"));
    }
    if !visible(&doc, user) {
        warn!("{} is not a recipient of exam {}", user.username, doc.id);
        return Err(ServiceError::forbidden("You do not have access to this exam"));
    }
    Ok(doc)
}

pub async fn delete(store: &dyn DocumentStore, school_code: &str, id: &str) -> ServiceResult<u64> {
    let id = parse_id(id)?;
    let filter = Filter::Id(id).and(Filter::eq("schoolCode", school_code));
    match store.delete_one(collections::EXAMS, &filter).await? {
        0 => Err(ServiceError::not_found("Exam not found")),
        deleted => {
            info!("Deleted exam {} in school {}", id, school_code);
            Ok(deleted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDocumentStore;
    use serde_json::json;

    fn user(user_type: &str, username: &str, school_code: &str) -> SessionUser {
        SessionUser {
            id: "1".into(),
            username: username.into(),
            role: user_type.into(),
            user_type: user_type.into(),
            school_code: school_code.into(),
            domain: "d".into(),
            name: None,
            class_codes: vec!["7A".into()],
            groups: vec![],
        }
    }

    fn exam(code: &str, recipients: Value) -> Exam {
        serde_json::from_value(json!({"examCode": code, "examName": "Quiz", "recipients": recipients}))
            .unwrap()
    }

    #[tokio::test]
    async fn create_checks_role_and_duplicates() {
        let store = MemoryDocumentStore::new("t");
        let teacher = user("teacher", "t1", "2001");
        let doc = create(&store, &teacher, exam("E1", json!({}))).await.unwrap();
        assert_eq!(doc.data["createdBy"], "t1");
        assert_eq!(doc.data["schoolCode"], "2001");

        let err = create(&store, &teacher, exam("E1", json!({}))).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err = create(&store, &user("student", "s1", "2001"), exam("E2", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn students_only_see_their_exams() {
        let store = MemoryDocumentStore::new("t");
        let school = user("school", "admin", "2001");
        create(&store, &school, exam("E1", json!({"classCode": ["7A"]}))).await.unwrap();
        create(&store, &school, exam("E2", json!({"classCode": ["8B"]}))).await.unwrap();

        assert_eq!(list(&store, &school).await.unwrap().len(), 2);
        let student = user("student", "s1", "2001");
        let visible = list(&store, &student).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].get_str("examCode"), Some("E1"));

        assert!(get(&store, &student, "E1").await.is_ok());
        let err = get(&store, &student, "E2").await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn other_school_is_forbidden() {
        let store = MemoryDocumentStore::new("t");
        let doc = create(&store, &user("school", "admin", "2001"), exam("E1", json!({})))
            .await
            .unwrap();
        let outsider = user("school", "other", "3003");
        let err = get(&store, &outsider, &doc.id.to_string()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(ref m) if m == "Access denied for this school"));

        let err = get(&store, &outsider, "missing").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
