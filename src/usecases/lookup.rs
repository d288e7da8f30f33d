//! Shared lookups over the entity collections and summary shaping.
//!
//! Every registration lookup is scoped by `course_instance_id`.

use crate::domain::{
    CourseInstance, CourseInstanceSummary, CourseTemplate, DomainError, Language, Person,
    TeacherRegistration, TeacherType,
};
use crate::ports::EntityStore;
use std::collections::HashMap;
use tracing::warn;

/// All four collections, read once per operation.
#[derive(Debug, Default)]
pub struct CatalogView {
    pub instances: Vec<CourseInstance>,
    pub templates: Vec<CourseTemplate>,
    pub registrations: Vec<TeacherRegistration>,
    pub persons: Vec<Person>,
}

impl CatalogView {
    pub async fn load(store: &dyn EntityStore) -> Result<Self, DomainError> {
        let (instances, templates, registrations, persons) = tokio::try_join!(
            store.course_instances(),
            store.course_templates(),
            store.teacher_registrations(),
            store.persons(),
        )?;
        Ok(Self {
            instances,
            templates,
            registrations,
            persons,
        })
    }

    pub fn templates_by_id(&self) -> HashMap<&str, &CourseTemplate> {
        self.templates
            .iter()
            .map(|t| (t.course_id.as_str(), t))
            .collect()
    }

    /// Summary of one instance. The main teacher is resolved from this
    /// instance's own registrations only.
    pub fn summarize(
        &self,
        instance: &CourseInstance,
        template: &CourseTemplate,
        language: Language,
    ) -> CourseInstanceSummary {
        CourseInstanceSummary {
            instance_id: instance.id,
            template_id: template.course_id.clone(),
            name: display_name(template, language).to_string(),
            main_teacher_name: main_teacher_name(&self.registrations, &self.persons, instance.id),
        }
    }
}

pub fn find_instance(instances: &[CourseInstance], id: i64) -> Option<&CourseInstance> {
    instances.iter().find(|i| i.id == id)
}

pub fn find_person<'a>(persons: &'a [Person], ssn: &str) -> Option<&'a Person> {
    persons.iter().find(|p| p.ssn == ssn)
}

/// The main-teacher registration of `course_instance_id`, if any.
///
/// If legacy data holds more than one, the oldest (lowest id) wins.
pub fn main_registration(
    registrations: &[TeacherRegistration],
    course_instance_id: i64,
) -> Option<&TeacherRegistration> {
    registrations
        .iter()
        .filter(|r| r.course_instance_id == course_instance_id)
        .filter(|r| r.kind == TeacherType::MainTeacher)
        .min_by_key(|r| r.id)
}

/// Name of the main teacher of `course_instance_id`, or an empty string.
pub fn main_teacher_name(
    registrations: &[TeacherRegistration],
    persons: &[Person],
    course_instance_id: i64,
) -> String {
    let Some(reg) = main_registration(registrations, course_instance_id) else {
        return String::new();
    };
    match find_person(persons, &reg.ssn) {
        Some(p) => p.name.clone(),
        None => {
            warn!(
                course_instance_id,
                ssn = %reg.ssn,
                registration_id = reg.id,
                "main teacher registration points at unknown person"
            );
            String::new()
        }
    }
}

pub fn display_name(template: &CourseTemplate, language: Language) -> &str {
    match language {
        Language::English => &template.name_en,
        Language::Local => &template.name,
    }
}
