use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::database::{DataMap, Document, DocumentStore};
use crate::filter::{Filter, FindQuery};
use crate::middleware::SessionUser;
use crate::models::{collections, ClassRecord, ScheduleOperation};

use super::{ServiceError, ServiceResult};

/// Classes the caller may see: the whole school for school users, assigned
/// classes for teachers, enrolled classes for students
pub fn visibility_filter(user: &SessionUser) -> ServiceResult<Filter> {
    let school = Filter::eq("schoolCode", user.school_code.as_str());
    let scope = match user.user_type.as_str() {
        "school" => Filter::All,
        "teacher" => Filter::eq("teachers.teacherCode", user.username.as_str()),
        "student" => {
            let mut enrolled = vec![Filter::eq("students.studentCode", user.username.as_str())];
            if !user.class_codes.is_empty() {
                let codes = user.class_codes.iter().cloned().map(Value::from).collect();
                enrolled.push(Filter::is_in("classCode", codes));
            }
            Filter::Or(enrolled)
        }
        other => {
            warn!("User {} with type {} requested classes", user.username, other);
            return Err(ServiceError::forbidden("Access denied"));
        }
    };
    Ok(school.and(scope))
}

/// `visible` comes from `visibility_filter`
pub async fn list(store: &dyn DocumentStore, visible: Filter) -> ServiceResult<Vec<Document>> {
    let query = FindQuery::new(visible).newest_first();
    Ok(store.find(collections::CLASSES, &query).await?)
}

/// Validated schedule edit
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleChange {
    pub class_code: String,
    pub day: String,
    pub time_slot: String,
    pub operation: ScheduleOperation,
    pub teacher_code: Option<String>,
    pub course_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleOutcome {
    pub updated: bool,
    pub message: String,
}

impl ScheduleOutcome {
    fn new(updated: bool, message: &str) -> Self {
        Self {
            updated,
            message: message.to_string(),
        }
    }
}

/// Add or remove one weekly slot. The class is rewritten with a single
/// merge of its `teachers` array.
pub async fn update_schedule(
    store: &dyn DocumentStore,
    school_code: &str,
    change: &ScheduleChange,
) -> ServiceResult<ScheduleOutcome> {
    let filter = Filter::And(vec![
        Filter::eq("classCode", change.class_code.as_str()),
        Filter::eq("schoolCode", school_code),
    ]);
    let Some(doc) = store.find_one(collections::CLASSES, &filter).await? else {
        warn!("Schedule change for missing class {} in {}", change.class_code, school_code);
        return Err(ServiceError::not_found("Class not found"));
    };
    let mut class: ClassRecord = doc.decode()?;

    let (changed, outcome) = match change.operation {
        ScheduleOperation::Add => {
            let (Some(teacher_code), Some(course_code)) = (&change.teacher_code, &change.course_code) else {
                return Err(ServiceError::invalid(
                    "teacherCode and courseCode are required to add a slot",
                ));
            };
            if class.add_slot(teacher_code, course_code, &change.day, &change.time_slot) {
                (true, ScheduleOutcome::new(true, "Schedule slot added"))
            } else {
                (false, ScheduleOutcome::new(false, "Time slot already scheduled"))
            }
        }
        ScheduleOperation::Remove => {
            if class.remove_slot(&change.day, &change.time_slot) {
                (true, ScheduleOutcome::new(true, "Schedule slot removed"))
            } else {
                (false, ScheduleOutcome::new(false, "Time slot not found"))
            }
        }
    };

    if changed {
        let mut patch = DataMap::new();
        patch.insert(
            "teachers".to_string(),
            serde_json::to_value(&class.teachers).map_err(|e| ServiceError::invalid(e.to_string()))?,
        );
        store
            .merge(collections::CLASSES, &Filter::Id(doc.id), patch)
            .await?
            .ok_or_else(|| ServiceError::not_found("Class not found"))?;
        info!(
            "Schedule of class {} updated: {:?} {} {}",
            change.class_code, change.operation, change.day, change.time_slot
        );
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDocumentStore;
    use serde_json::json;

    fn user(user_type: &str, username: &str, class_codes: &[&str]) -> SessionUser {
        SessionUser {
            id: "1".into(),
            username: username.into(),
            role: user_type.into(),
            user_type: user_type.into(),
            school_code: "2001".into(),
            domain: "d".into(),
            name: None,
            class_codes: class_codes.iter().map(|c| c.to_string()).collect(),
            groups: vec![],
        }
    }

    async fn seeded() -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new("t");
        for class in [
            json!({"classCode": "7A", "schoolCode": "2001",
                   "students": [{"studentCode": "s1"}],
                   "teachers": [{"teacherCode": "t1", "courseCode": "math",
                                 "weeklySchedule": [{"day": "sat", "timeSlot": "8"}]}]}),
            json!({"classCode": "8B", "schoolCode": "2001", "teachers": []}),
            json!({"classCode": "9C", "schoolCode": "3003", "teachers": []}),
        ] {
            store
                .insert(collections::CLASSES, class.as_object().cloned().unwrap())
                .await
                .unwrap();
        }
        store
    }

    fn codes(docs: &[Document]) -> Vec<&str> {
        let mut codes: Vec<&str> = docs.iter().filter_map(|d| d.get_str("classCode")).collect();
        codes.sort_unstable();
        codes
    }

    #[tokio::test]
    async fn lists_by_user_type() {
        let store = seeded().await;
        let visible = |u: SessionUser| visibility_filter(&u).unwrap();
        assert_eq!(codes(&list(&store, visible(user("school", "admin", &[]))).await.unwrap()), vec!["7A", "8B"]);
        assert_eq!(codes(&list(&store, visible(user("teacher", "t1", &[]))).await.unwrap()), vec!["7A"]);
        assert_eq!(codes(&list(&store, visible(user("student", "s1", &[]))).await.unwrap()), vec!["7A"]);
        assert_eq!(codes(&list(&store, visible(user("student", "s9", &["8B"]))).await.unwrap()), vec!["8B"]);
        assert!(visibility_filter(&user("parent", "p", &[])).is_err());
    }

    fn change(operation: ScheduleOperation, day: &str, slot: &str) -> ScheduleChange {
        ScheduleChange {
            class_code: "7A".into(),
            day: day.into(),
            time_slot: slot.into(),
            operation,
            teacher_code: Some("t1".into()),
            course_code: Some("math".into()),
        }
    }

    #[tokio::test]
    async fn schedule_add_and_remove() {
        let store = seeded().await;

        let outcome = update_schedule(&store, "2001", &change(ScheduleOperation::Add, "sat", "8"))
            .await
            .unwrap();
        assert!(!outcome.updated);

        let outcome = update_schedule(&store, "2001", &change(ScheduleOperation::Add, "sun", "9"))
            .await
            .unwrap();
        assert!(outcome.updated);

        let outcome = update_schedule(&store, "2001", &change(ScheduleOperation::Remove, "sat", "8"))
            .await
            .unwrap();
        assert!(outcome.updated);

        let doc = store
            .find_one(collections::CLASSES, &Filter::eq("classCode", "7A"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.data["teachers"][0]["weeklySchedule"], json!([{"day": "sun", "timeSlot": "9"}]));
        // Untouched keys survive the merge
        assert_eq!(doc.data["students"][0]["studentCode"], "s1");
    }

    #[tokio::test]
    async fn schedule_for_missing_class_is_not_found() {
        let store = seeded().await;
        let err = update_schedule(&store, "3003", &change(ScheduleOperation::Remove, "sat", "8"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
