//! Typed records per collection.
//!
//! Each record keeps fields it does not model in `extra`, so documents written
//! by other clients round-trip unchanged.

pub mod account;
pub mod class;
pub mod course;
pub mod exam;
pub mod feedback;
pub mod form;
pub mod form_structure;
pub mod message;
pub mod page;

pub use account::{AccountRole, LoginUser};
pub use class::{ClassRecord, ClassTeacher, ScheduleOperation, ScheduleSlot};
pub use course::Course;
pub use exam::{Exam, Recipient, Recipients};
pub use feedback::{Feedback, FeedbackSubmitter};
pub use form::{Form, FormMetadata, FormStatus, Submission};
pub use form_structure::FormField;
pub use message::Message;
pub use page::{slugify, Page};

/// Collection names
pub mod collections {
    pub const STUDENTS: &str = "students";
    pub const TEACHERS: &str = "teachers";
    pub const SCHOOLS: &str = "schools";
    pub const CLASSES: &str = "classes";
    pub const COURSES: &str = "courses";
    pub const EXAMS: &str = "exam";
    pub const FORMS: &str = "forms";
    pub const FORM_SUBMISSIONS: &str = "formsInput";
    pub const MESSAGES: &str = "messagelist";
    pub const PAGES: &str = "website_pages";
    pub const FEEDBACK: &str = "feedback";
}

/// Trimmed, non-empty string field
pub(crate) fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(format!("{} is required", field)),
    }
}
