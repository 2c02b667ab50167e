use serde::{Deserialize, Serialize};

use crate::database::DataMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    pub day: String,
    pub time_slot: String,
    #[serde(flatten)]
    pub extra: DataMap,
}

impl ScheduleSlot {
    pub fn new(day: impl Into<String>, time_slot: impl Into<String>) -> Self {
        Self {
            day: day.into(),
            time_slot: time_slot.into(),
            extra: DataMap::new(),
        }
    }

    fn is(&self, day: &str, time_slot: &str) -> bool {
        self.day == day && self.time_slot == time_slot
    }
}

/// Teacher/course assignment inside a class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassTeacher {
    pub teacher_code: String,
    #[serde(default)]
    pub course_code: String,
    #[serde(default)]
    pub weekly_schedule: Vec<ScheduleSlot>,
    #[serde(flatten)]
    pub extra: DataMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    pub class_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default)]
    pub school_code: String,
    #[serde(default)]
    pub teachers: Vec<ClassTeacher>,
    #[serde(flatten)]
    pub extra: DataMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleOperation {
    Add,
    Remove,
}

impl ScheduleOperation {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "add" => Some(ScheduleOperation::Add),
            "remove" => Some(ScheduleOperation::Remove),
            _ => None,
        }
    }
}

impl ClassRecord {
    /// Add a weekly slot for a teacher/course pair, creating the assignment
    /// when missing. Returns false when the slot already exists.
    pub fn add_slot(&mut self, teacher_code: &str, course_code: &str, day: &str, time_slot: &str) -> bool {
        let existing = self
            .teachers
            .iter_mut()
            .find(|t| t.teacher_code == teacher_code && t.course_code == course_code);

        match existing {
            Some(teacher) => {
                if teacher.weekly_schedule.iter().any(|s| s.is(day, time_slot)) {
                    return false;
                }
                teacher.weekly_schedule.push(ScheduleSlot::new(day, time_slot));
            }
            None => self.teachers.push(ClassTeacher {
                teacher_code: teacher_code.to_string(),
                course_code: course_code.to_string(),
                weekly_schedule: vec![ScheduleSlot::new(day, time_slot)],
                extra: DataMap::new(),
            }),
        }
        true
    }

    /// Remove the slot from the first teacher that has it
    pub fn remove_slot(&mut self, day: &str, time_slot: &str) -> bool {
        for teacher in &mut self.teachers {
            let before = teacher.weekly_schedule.len();
            teacher.weekly_schedule.retain(|s| !s.is(day, time_slot));
            if teacher.weekly_schedule.len() != before {
                return true;
            }
        }
        false
    }
}
