// handlers/protected/classes.rs - Class listing and weekly schedule edits

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Deserialize;

use super::require_role;
use crate::database::Document;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, TenantScope};
use crate::models::ScheduleOperation;
use crate::services::class_service::{self, ScheduleChange, ScheduleOutcome};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub class_code: Option<String>,
    pub day: Option<String>,
    pub time_slot: Option<String>,
    pub operation: Option<String>,
    pub teacher_code: Option<String>,
    pub course_code: Option<String>,
}

impl ScheduleRequest {
    fn into_change(self) -> Result<ScheduleChange, ApiError> {
        fn field(value: Option<String>, name: &str) -> Result<String, ApiError> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ApiError::missing(name))
        }
        fn optional(value: Option<String>) -> Option<String> {
            value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }

        let operation = field(self.operation, "operation")?;
        let operation = ScheduleOperation::parse(&operation).ok_or_else(|| {
            ApiError::bad_request(format!("Invalid operation: {} (expected add or remove)", operation))
        })?;

        let change = ScheduleChange {
            class_code: field(self.class_code, "classCode")?,
            day: field(self.day, "day")?,
            time_slot: field(self.time_slot, "timeSlot")?,
            operation,
            teacher_code: optional(self.teacher_code),
            course_code: optional(self.course_code),
        };
        if operation == ScheduleOperation::Add
            && (change.teacher_code.is_none() || change.course_code.is_none())
        {
            return Err(ApiError::bad_request(
                "teacherCode and courseCode are required to add a slot",
            ));
        }
        Ok(change)
    }
}

/// GET /api/classes - Classes visible to the caller
pub async fn list(AuthUser(user): AuthUser, scope: TenantScope) -> ApiResult<Vec<Document>> {
    scope.authorize(&user)?;
    let visible = class_service::visibility_filter(&user)?;

    let store = scope.store().await?;
    let classes = class_service::list(store.as_ref(), visible).await?;
    Ok(ApiResponse::success(classes))
}

/// PUT /api/classes/schedule - Add or remove one weekly slot
pub async fn update_schedule(
    AuthUser(user): AuthUser,
    scope: TenantScope,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> ApiResult<ScheduleOutcome> {
    let Json(body) = payload?;
    scope.authorize(&user)?;
    require_role(&user, "school")?;
    let change = body.into_change()?;

    let store = scope.store().await?;
    let outcome = class_service::update_schedule(store.as_ref(), &user.school_code, &change).await?;
    Ok(ApiResponse::success(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(operation: &str, teacher: Option<&str>, course: Option<&str>) -> ScheduleRequest {
        ScheduleRequest {
            class_code: Some("C1".into()),
            day: Some("saturday".into()),
            time_slot: Some("08:00".into()),
            operation: Some(operation.into()),
            teacher_code: teacher.map(String::from),
            course_code: course.map(String::from),
        }
    }

    #[test]
    fn add_needs_teacher_and_course() {
        assert!(request("add", Some("t1"), Some("c1")).into_change().is_ok());
        assert_eq!(request("add", None, Some("c1")).into_change().unwrap_err().status_code(), 400);
        assert_eq!(request("add", Some("t1"), Some("  ")).into_change().unwrap_err().status_code(), 400);
        assert!(request("remove", None, None).into_change().is_ok());
        assert_eq!(request("move", None, None).into_change().unwrap_err().status_code(), 400);
    }
}
