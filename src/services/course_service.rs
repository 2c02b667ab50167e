use tracing::{info, warn};

use crate::database::{parse_id, to_data, Document, DocumentStore};
use crate::filter::{Filter, FindQuery, SortDirection};
use crate::models::{collections, Course};

use super::{ServiceError, ServiceResult};

pub async fn list(store: &dyn DocumentStore, school_code: &str) -> ServiceResult<Vec<Document>> {
    let query = FindQuery::new(Filter::eq("schoolCode", school_code))
        .sort("courseName", SortDirection::Asc)?;
    Ok(store.find(collections::COURSES, &query).await?)
}

/// Course codes are unique within a school
pub async fn create(
    store: &dyn DocumentStore,
    school_code: &str,
    mut course: Course,
) -> ServiceResult<Document> {
    course.validate().map_err(ServiceError::Invalid)?;
    course.course_code = course.course_code.trim().to_string();
    course.school_code = school_code.to_string();

    let duplicate = Filter::And(vec![
        Filter::eq("courseCode", course.course_code.as_str()),
        Filter::eq("schoolCode", school_code),
    ]);
    if store.exists(collections::COURSES, &duplicate).await? {
        warn!("Duplicate course code {} in school {}", course.course_code, school_code);
        return Err(ServiceError::conflict("Course code already exists"));
    }

    let doc = store.insert(collections::COURSES, to_data(&course)?).await?;
    info!("Created course {} in school {}", course.course_code, school_code);
    Ok(doc)
}

pub async fn delete(store: &dyn DocumentStore, school_code: &str, id: &str) -> ServiceResult<u64> {
    let id = parse_id(id)?;
    let filter = Filter::Id(id).and(Filter::eq("schoolCode", school_code));
    match store.delete_one(collections::COURSES, &filter).await? {
        0 => Err(ServiceError::not_found("Course not found")),
        deleted => {
            info!("Deleted course {} in school {}", id, school_code);
            Ok(deleted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDocumentStore;
    use serde_json::json;

    fn course(code: &str, name: &str) -> Course {
        serde_json::from_value(json!({"courseCode": code, "courseName": name})).unwrap()
    }

    #[tokio::test]
    async fn codes_are_unique_per_school() {
        let store = MemoryDocumentStore::new("t");
        create(&store, "2001", course("m1", "Math")).await.unwrap();
        create(&store, "3003", course("m1", "Math")).await.unwrap();
        let err = create(&store, "2001", course(" m1 ", "Algebra")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let listed = list(&store, "2001").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].get_str("schoolCode"), Some("2001"));
    }

    #[tokio::test]
    async fn delete_is_scoped_to_school() {
        let store = MemoryDocumentStore::new("t");
        let doc = create(&store, "2001", course("m1", "Math")).await.unwrap();
        let id = doc.id.to_string();

        assert!(matches!(delete(&store, "3003", &id).await, Err(ServiceError::NotFound(_))));
        assert_eq!(delete(&store, "2001", &id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejects_incomplete_course() {
        let store = MemoryDocumentStore::new("t");
        let err = create(&store, "2001", course("m1", "")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(ref m) if m == "courseName is required"));
        assert!(store.is_empty().await);
    }
}
