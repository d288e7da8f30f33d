//! Domain entities and the summaries handed back to callers.
//!
//! Plain data only; stores and UI map to and from these.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reusable definition of a course, independent of the semester it is taught in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseTemplate {
    pub course_id: String,
    pub name: String,
    pub name_en: String,
}

/// One offering of a template in a given semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseInstance {
    pub id: i64,
    pub course_id: String,
    pub semester_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub ssn: String,
    pub name: String,
}

/// Role a person holds on a course instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeacherType {
    #[serde(rename = "main")]
    MainTeacher,
    #[serde(rename = "assistant")]
    AssistantTeacher,
}

impl TeacherType {
    /// Storage code used by the persistence adapters.
    pub fn as_str(self) -> &'static str {
        match self {
            TeacherType::MainTeacher => "main",
            TeacherType::AssistantTeacher => "assistant",
        }
    }
}

impl fmt::Display for TeacherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeacherType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" | "mainteacher" | "main_teacher" => Ok(TeacherType::MainTeacher),
            "assistant" | "assistantteacher" | "assistant_teacher" => {
                Ok(TeacherType::AssistantTeacher)
            }
            other => Err(format!("unknown teacher type: {}", other)),
        }
    }
}

/// A registration linking a person to a course instance.
///
/// `id` is the registration's own key, assigned by the store on commit.
/// Lookups by course instance always go through `course_instance_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherRegistration {
    pub id: i64,
    pub course_instance_id: i64,
    pub ssn: String,
    #[serde(rename = "type")]
    pub kind: TeacherType,
}

/// Registration staged in a unit of work, before the store assigns its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTeacherRegistration {
    pub course_instance_id: i64,
    pub ssn: String,
    pub kind: TeacherType,
}

/// Display language for course names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Local,
    English,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonSummary {
    pub name: String,
    pub ssn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseInstanceSummary {
    pub instance_id: i64,
    pub template_id: String,
    pub name: String,
    /// Empty when the instance has no main teacher.
    pub main_teacher_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page_number: u32,
    pub page_size: usize,
    pub page_count: usize,
    pub total_items: usize,
}

/// One page of course instances plus paging metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub items: Vec<CourseInstanceSummary>,
    pub page: PageInfo,
}

/// All four collections as one document. Seed format and JSON store layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub course_templates: Vec<CourseTemplate>,
    #[serde(default)]
    pub course_instances: Vec<CourseInstance>,
    #[serde(default)]
    pub persons: Vec<Person>,
    #[serde(default)]
    pub teacher_registrations: Vec<TeacherRegistration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teacher_type_parses_storage_codes_and_aliases() {
        assert_eq!("main".parse::<TeacherType>(), Ok(TeacherType::MainTeacher));
        assert_eq!(
            " Assistant ".parse::<TeacherType>(),
            Ok(TeacherType::AssistantTeacher)
        );
        assert_eq!(
            "MainTeacher".parse::<TeacherType>(),
            Ok(TeacherType::MainTeacher)
        );
        assert!("lecturer".parse::<TeacherType>().is_err());
    }

    #[test]
    fn snapshot_uses_storage_codes_for_registration_type() {
        let json = r#"{
            "teacher_registrations": [
                {"id": 1, "course_instance_id": 7, "ssn": "123", "type": "main"}
            ]
        }"#;
        let snapshot: CatalogSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.course_templates.is_empty());
        assert_eq!(
            snapshot.teacher_registrations[0].kind,
            TeacherType::MainTeacher
        );
    }
}
